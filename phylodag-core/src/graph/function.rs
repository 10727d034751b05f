//! Function Nodes
//!
//! A function node computes one value from a fixed number of dependencies of
//! possibly different types. The computation itself is supplied by a
//! [`FunctionOp`] descriptor; the node template handles storage, shape
//! checking, evaluation and the constant short-circuit of differentiation.
//!
//! # Example
//!
//! ```rust,ignore
//! #[derive(Default)]
//! struct Scale;
//!
//! impl FunctionOp for Scale {
//!     type Result = Vec<f64>;
//!     type Args = (f64, Vec<f64>);
//!
//!     fn compute(&self, (factor, values): ArgRefs<'_, Self>) -> Vec<f64> {
//!         values.iter().map(|v| factor * v).collect()
//!     }
//! }
//!
//! let scaled = FunctionNode::<Scale>::create(vec![factor, values])?;
//! ```

use std::any::Any;
use std::fmt;

use crate::error::{GraphError, GraphResult};
use super::node::{create_node, BuildNode, Node, NodeCore, NodeRef, NodeRefVec};
use super::pattern::DependencyPattern;
use super::value::{
    constant_zero, read_value, short_type_name, ValueCell, ValueRef, ValueType, ValueTypeInfo,
};

/// Tuple of argument types of a [`FunctionOp`].
///
/// Implemented for tuples of one to six [`ValueType`]s.
pub trait ArgumentTypes: 'static {
    /// The argument tuple as borrowed values.
    type Refs<'a>;

    /// Declared type of each slot.
    fn value_types() -> Vec<ValueTypeInfo>;

    /// Run `op` on the values of `dependencies`.
    ///
    /// Every dependency must be valid and of the declared type.
    fn evaluate<Op: FunctionOp<Args = Self>>(op: &Op, dependencies: &[NodeRef]) -> Op::Result;
}

/// Borrowed arguments handed to [`FunctionOp::compute`].
pub type ArgRefs<'a, Op> = <<Op as FunctionOp>::Args as ArgumentTypes>::Refs<'a>;

macro_rules! impl_argument_types {
    ($($T:ident => $index:tt),+) => {
        impl<$($T: ValueType),+> ArgumentTypes for ($($T,)+) {
            type Refs<'a> = ($(&'a $T,)+);

            fn value_types() -> Vec<ValueTypeInfo> {
                vec![$(ValueTypeInfo::of::<$T>()),+]
            }

            fn evaluate<Op: FunctionOp<Args = Self>>(
                op: &Op,
                dependencies: &[NodeRef],
            ) -> Op::Result {
                op.compute(($(&*read_value::<$T>(&*dependencies[$index]),)+))
            }
        }
    };
}

impl_argument_types!(A => 0);
impl_argument_types!(A => 0, B => 1);
impl_argument_types!(A => 0, B => 1, C => 2);
impl_argument_types!(A => 0, B => 1, C => 2, D => 3);
impl_argument_types!(A => 0, B => 1, C => 2, D => 3, E => 4);
impl_argument_types!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5);

/// Descriptor of a fixed-arity operation.
pub trait FunctionOp: Default + Send + Sync + 'static {
    type Result: ValueType;
    type Args: ArgumentTypes;

    /// Compute the result from the dependency values.
    fn compute(&self, args: ArgRefs<'_, Self>) -> Self::Result;

    /// Build the derivative of `node` with respect to `variable`.
    ///
    /// Only called for nodes that are not constant.
    fn derive(&self, node: &FunctionNode<Self>, _variable: &dyn Node) -> GraphResult<NodeRef> {
        Err(GraphError::NotDerivable {
            node_type: node.node_type().name(),
        })
    }
}

/// Node computing a [`FunctionOp`].
pub struct FunctionNode<Op: FunctionOp> {
    core: NodeCore,
    cell: ValueCell<Op::Result>,
    op: Op,
}

impl<Op: FunctionOp> FunctionNode<Op> {
    /// Dependency shape shared by all nodes of this type.
    pub fn pattern() -> DependencyPattern {
        DependencyPattern::Function(<Op::Args as ArgumentTypes>::value_types())
    }

    /// Build a node over `dependencies`.
    pub fn create(dependencies: NodeRefVec) -> GraphResult<ValueRef<Op::Result>> {
        let node = create_node::<Self>(dependencies, ())?;
        Ok(ValueRef::new_unchecked(node))
    }

    /// Build a node from slots that may not all be bound yet.
    pub fn create_from_slots(slots: Vec<Option<NodeRef>>) -> GraphResult<ValueRef<Op::Result>> {
        let dependencies = Self::pattern().bind_slots(std::any::type_name::<Self>(), slots)?;
        Self::create(dependencies)
    }

    /// Dependency in slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range for the operation's arity.
    pub fn dependency(&self, index: usize) -> &NodeRef {
        &self.core.dependencies()[index]
    }
}

impl<Op: FunctionOp> BuildNode for FunctionNode<Op> {
    type Args = ();

    fn build(dependencies: NodeRefVec, _: ()) -> GraphResult<Self> {
        Self::pattern().check(std::any::type_name::<Self>(), &dependencies)?;
        Ok(Self {
            core: NodeCore::computed(dependencies),
            cell: ValueCell::empty(),
            op: Op::default(),
        })
    }
}

impl<Op: FunctionOp> Node for FunctionNode<Op> {
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
        let value = <Op::Args as ArgumentTypes>::evaluate(&self.op, self.dependencies());
        self.cell.store(value);
    }

    fn derive(&self, variable: &dyn Node) -> GraphResult<NodeRef> {
        if self.is_constant() {
            return constant_zero::<Op::Result>(self);
        }
        self.op.derive(self, variable)
    }
}

impl<Op: FunctionOp> fmt::Debug for FunctionNode<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionNode")
            .field("op", &short_type_name::<Op>())
            .field("core", &self.core)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::leaf::{Constant, Parameter};

    #[derive(Default)]
    struct Affine;

    impl FunctionOp for Affine {
        type Result = f64;
        type Args = (f64, f64, i32);

        fn compute(&self, (a, x, b): ArgRefs<'_, Self>) -> f64 {
            a * x + f64::from(*b)
        }
    }

    #[derive(Default)]
    struct Twice;

    impl FunctionOp for Twice {
        type Result = i32;
        type Args = (i32, i32);

        fn compute(&self, (a, b): ArgRefs<'_, Self>) -> i32 {
            a + b
        }
    }

    #[test]
    fn computes_from_heterogeneous_arguments() {
        let a = Parameter::create(2.0);
        let x = Parameter::create(3.0);
        let b = Constant::create(1i32);
        let y = FunctionNode::<Affine>::create(vec![a.to_node(), x.to_node(), b.to_node()]).unwrap();

        assert_eq!(y.get_value(), 7.0);
        assert_eq!(y.description(), "Affine");
        x.set_value(10.0);
        assert_eq!(y.get_value(), 21.0);
    }

    #[test]
    fn same_dependency_in_two_slots() {
        let p = Parameter::create(21);
        let doubled = FunctionNode::<Twice>::create(vec![p.to_node(), p.to_node()]).unwrap();
        assert_eq!(doubled.get_value(), 42);
    }

    #[test]
    fn rejects_malformed_dependencies() {
        let a = Parameter::create(2.0).to_node();
        let n = Constant::create(1i32).to_node();

        let err = FunctionNode::<Affine>::create(vec![a.clone(), a.clone()]).unwrap_err();
        assert!(matches!(err, GraphError::ArityMismatch { expected: 3, given: 2, .. }));

        let err = FunctionNode::<Affine>::create(vec![a.clone(), n.clone(), n.clone()]).unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { index: 1, .. }));

        let err =
            FunctionNode::<Affine>::create_from_slots(vec![Some(a.clone()), None, Some(n)]).unwrap_err();
        assert!(matches!(err, GraphError::NullDependency { index: 1, .. }));

        // A rejected node never links itself into the graph.
        assert!(a.dependent_nodes().is_empty());
    }

    #[test]
    fn operations_without_rule_are_not_derivable() {
        let a = Parameter::create(2.0);
        let x = Parameter::create(3.0);
        let b = Constant::create(1i32);
        let y = FunctionNode::<Affine>::create(vec![a.to_node(), x.to_node(), b.to_node()]).unwrap();
        assert!(matches!(y.derive(&*x), Err(GraphError::NotDerivable { .. })));
    }

    #[test]
    fn constant_nodes_derive_to_zero_without_a_rule() {
        let a = Constant::create(2.0);
        let x = Constant::create(3.0);
        let b = Constant::create(1i32);
        let y = FunctionNode::<Affine>::create(vec![a.to_node(), x.to_node(), b.to_node()]).unwrap();

        assert!(y.is_constant());
        let dy = y.derive(&*a).unwrap();
        assert!(dy.is_constant());
        assert_eq!(dy.get_value(), 0.0);
    }
}
