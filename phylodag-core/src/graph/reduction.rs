//! Reduction Nodes
//!
//! A reduction node folds any number of dependencies of one type into a
//! single value: `reset` produces the initial accumulator, then
//! `reduce_first` folds in the first dependency and `reduce` each following
//! one, in dependency order. An empty reduction evaluates to the `reset`
//! value.
//!
//! The same template also covers arrays, reductions whose dependency count
//! is fixed when the node is built.

use std::any::Any;
use std::fmt;

use crate::error::{GraphError, GraphResult};
use super::node::{create_node, BuildNode, Node, NodeCore, NodeRef, NodeRefVec};
use super::pattern::DependencyPattern;
use super::value::{
    constant_zero, read_value, short_type_name, ValueCell, ValueRef, ValueType, ValueTypeInfo,
};

/// Descriptor of an accumulating operation.
pub trait ReductionOp: Default + Send + Sync + 'static {
    type Result: ValueType;
    type Element: ValueType;

    /// Initial accumulator.
    fn reset(&self) -> Self::Result;

    /// Fold one dependency value into the accumulator.
    fn reduce(&self, accumulator: &mut Self::Result, value: &Self::Element);

    /// Fold the first dependency value into the fresh accumulator.
    ///
    /// Operations whose identity depends on the operands' shape take the
    /// shape from here.
    fn reduce_first(&self, accumulator: &mut Self::Result, value: &Self::Element) {
        self.reduce(accumulator, value);
    }

    /// Build the derivative of `node` with respect to `variable`.
    ///
    /// Only called for nodes that are not constant.
    fn derive(&self, node: &ReductionNode<Self>, _variable: &dyn Node) -> GraphResult<NodeRef> {
        Err(GraphError::NotDerivable {
            node_type: node.node_type().name(),
        })
    }
}

/// Node computing a [`ReductionOp`].
pub struct ReductionNode<Op: ReductionOp> {
    core: NodeCore,
    cell: ValueCell<Op::Result>,
    op: Op,
    /// Fixed dependency count for array nodes.
    len: Option<usize>,
}

impl<Op: ReductionOp> ReductionNode<Op> {
    fn pattern_for(len: Option<usize>) -> DependencyPattern {
        let element = ValueTypeInfo::of::<Op::Element>();
        match len {
            Some(len) => DependencyPattern::Array { element, len },
            None => DependencyPattern::Reduction(element),
        }
    }

    /// Dependency shape of this node.
    pub fn pattern(&self) -> DependencyPattern {
        Self::pattern_for(self.len)
    }

    /// Build a reduction over any number of dependencies.
    pub fn create(dependencies: NodeRefVec) -> GraphResult<ValueRef<Op::Result>> {
        let node = create_node::<Self>(dependencies, None)?;
        Ok(ValueRef::new_unchecked(node))
    }

    /// Build a reduction over exactly `len` dependencies.
    pub fn create_array(dependencies: NodeRefVec, len: usize) -> GraphResult<ValueRef<Op::Result>> {
        let node = create_node::<Self>(dependencies, Some(len))?;
        Ok(ValueRef::new_unchecked(node))
    }

    /// Build an array from slots that may not all be bound yet.
    pub fn create_from_slots(slots: Vec<Option<NodeRef>>) -> GraphResult<ValueRef<Op::Result>> {
        let len = slots.len();
        let dependencies =
            Self::pattern_for(Some(len)).bind_slots(std::any::type_name::<Self>(), slots)?;
        Self::create_array(dependencies, len)
    }

    /// Dependency in slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn dependency(&self, index: usize) -> &NodeRef {
        &self.core.dependencies()[index]
    }
}

impl<Op: ReductionOp> BuildNode for ReductionNode<Op> {
    /// Fixed length for arrays, `None` for open reductions.
    type Args = Option<usize>;

    fn build(dependencies: NodeRefVec, len: Option<usize>) -> GraphResult<Self> {
        Self::pattern_for(len).check(std::any::type_name::<Self>(), &dependencies)?;
        Ok(Self {
            core: NodeCore::computed(dependencies),
            cell: ValueCell::empty(),
            op: Op::default(),
            len,
        })
    }
}

impl<Op: ReductionOp> Node for ReductionNode<Op> {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn value_type(&self) -> ValueTypeInfo {
        ValueTypeInfo::of::<Op::Result>()
    }

    fn value_cell(&self) -> &dyn Any {
        &self.cell
    }

    fn description(&self) -> String {
        short_type_name::<Op>()
    }

    fn debug_info(&self) -> String {
        self.cell.debug_string()
    }

    fn compute(&self) {
        let mut accumulator = self.op.reset();
        for (index, dependency) in self.dependencies().iter().enumerate() {
            let value = read_value::<Op::Element>(&**dependency);
            if index == 0 {
                self.op.reduce_first(&mut accumulator, &value);
            } else {
                self.op.reduce(&mut accumulator, &value);
            }
        }
        self.cell.store(accumulator);
    }

    fn derive(&self, variable: &dyn Node) -> GraphResult<NodeRef> {
        if self.is_constant() {
            return constant_zero::<Op::Result>(self);
        }
        self.op.derive(self, variable)
    }
}

impl<Op: ReductionOp> fmt::Debug for ReductionNode<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReductionNode")
            .field("op", &short_type_name::<Op>())
            .field("len", &self.len)
            .field("core", &self.core)
            .finish()
    }
}
