//! Leaf Nodes
//!
//! Leaves are the entry points of a graph: nodes with no dependencies whose
//! value is supplied from outside.
//!
//! - A [`Parameter`] holds a value that the application may change. Setting
//!   it invalidates everything computed from it.
//! - A [`Constant`] holds a value fixed at construction. It is always valid,
//!   and any node built only from constants is itself constant.
//!
//! # Example
//!
//! ```rust,ignore
//! let branch_length = Parameter::create(0.1);
//! let scaled = ScaleNode::create(vec![branch_length.to_node(), rates.to_node()])?;
//!
//! // Invalidates `scaled` and everything above it.
//! branch_length.set_value(0.2);
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::error::{GraphError, GraphResult};
use super::function::{ArgRefs, FunctionNode, FunctionOp};
use super::invalidation::invalidate_dependents;
use super::node::{link_node, same_node, BuildNode, Node, NodeCore, NodeRef, NodeRefVec};
use super::pattern::check_no_dependencies;
use super::value::{
    constant_zero, short_type_name, ValueCell, ValueRef, ValueType, ValueTypeInfo,
};

/// A leaf whose value can be set by its owner.
pub struct Parameter<T: ValueType> {
    core: NodeCore,
    cell: ValueCell<T>,
}

impl<T: ValueType> Parameter<T> {
    /// Create a parameter holding `value`.
    pub fn create(value: T) -> Arc<Self> {
        link_node(Self::new(value))
    }

    fn new(value: T) -> Self {
        Self {
            core: NodeCore::leaf(false),
            cell: ValueCell::new(value),
        }
    }

    /// Get a copy of the current value.
    pub fn value(&self) -> T
    where
        T: Clone,
    {
        self.cell
            .read()
            .map(|value| T::clone(&value))
            .expect("parameters always hold a value")
    }

    /// Replace the value and invalidate every transitive dependent.
    pub fn set_value(&self, value: T) {
        self.cell.store(value);
        self.changed();
    }

    /// Modify the value in place and invalidate every transitive dependent.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        self.cell.modify(f);
        self.changed();
    }

    fn changed(&self) {
        self.core.mark_valid();
        let invalidated = invalidate_dependents(self);
        debug!(node = %self.id(), invalidated, "parameter updated");
    }

    /// Typed handle to this parameter.
    pub fn as_value(self: &Arc<Self>) -> ValueRef<T> {
        ValueRef::new_unchecked(self.to_node())
    }

    /// Untyped handle to this parameter.
    pub fn to_node(self: &Arc<Self>) -> NodeRef {
        Arc::clone(self) as NodeRef
    }
}

impl<T: ValueType> BuildNode for Parameter<T> {
    type Args = T;

    fn build(dependencies: NodeRefVec, value: T) -> GraphResult<Self> {
        check_no_dependencies::<Self>(&dependencies)?;
        Ok(Self::new(value))
    }
}

impl<T: ValueType> Node for Parameter<T> {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn value_type(&self) -> ValueTypeInfo {
        ValueTypeInfo::of::<T>()
    }

    fn value_cell(&self) -> &dyn Any {
        &self.cell
    }

    fn description(&self) -> String {
        short_type_name::<Self>()
    }

    fn debug_info(&self) -> String {
        self.cell.debug_string()
    }

    fn compute(&self) {}

    fn derive(&self, variable: &dyn Node) -> GraphResult<NodeRef> {
        let is_variable = same_node(self, variable);
        if is_variable && T::SHAPED {
            return self.shaped_unit_seed();
        }
        let seed = self.cell.read().and_then(|value| {
            if is_variable {
                value.one_like()
            } else {
                value.zero_like()
            }
        });
        match seed {
            Some(seed) => Ok(Constant::create(seed).to_node()),
            None => Err(GraphError::NotDerivable {
                node_type: std::any::type_name::<Self>(),
            }),
        }
    }
}

impl<T: ValueType> Parameter<T> {
    /// Unit seed that follows the parameter's size across updates.
    fn shaped_unit_seed(&self) -> GraphResult<NodeRef> {
        let has_seed = self.cell.read().and_then(|value| value.one_like()).is_some();
        if !has_seed {
            return Err(GraphError::NotDerivable {
                node_type: std::any::type_name::<Self>(),
            });
        }
        let this = self.core.handle().expect("leaves are linked at creation");
        Ok(FunctionNode::<UnitSeed<T>>::create(vec![this])?.into_node())
    }
}

impl<T: ValueType> fmt::Debug for Parameter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("value", &self.cell.debug_string())
            .field("core", &self.core)
            .finish()
    }
}

/// `one_like` of its single argument.
struct UnitSeed<T>(PhantomData<fn() -> T>);

impl<T> Default for UnitSeed<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: ValueType> FunctionOp for UnitSeed<T> {
    type Result = T;
    type Args = (T,);

    fn compute(&self, (value,): ArgRefs<'_, Self>) -> T {
        value
            .one_like()
            .expect("seeded parameters keep a unit value")
    }

    fn derive(&self, node: &FunctionNode<Self>, _variable: &dyn Node) -> GraphResult<NodeRef> {
        constant_zero::<T>(node)
    }
}

/// A leaf whose value never changes.
pub struct Constant<T: ValueType> {
    core: NodeCore,
    cell: ValueCell<T>,
}

impl<T: ValueType> Constant<T> {
    /// Create a constant holding `value`.
    pub fn create(value: T) -> Arc<Self> {
        link_node(Self::new(value))
    }

    fn new(value: T) -> Self {
        Self {
            core: NodeCore::leaf(true),
            cell: ValueCell::new(value),
        }
    }

    /// Typed handle to this constant.
    pub fn as_value(self: &Arc<Self>) -> ValueRef<T> {
        ValueRef::new_unchecked(self.to_node())
    }

    /// Untyped handle to this constant.
    pub fn to_node(self: &Arc<Self>) -> NodeRef {
        Arc::clone(self) as NodeRef
    }
}

impl<T: ValueType> BuildNode for Constant<T> {
    type Args = T;

    fn build(dependencies: NodeRefVec, value: T) -> GraphResult<Self> {
        check_no_dependencies::<Self>(&dependencies)?;
        Ok(Self::new(value))
    }
}

impl<T: ValueType> Node for Constant<T> {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn value_type(&self) -> ValueTypeInfo {
        ValueTypeInfo::of::<T>()
    }

    fn value_cell(&self) -> &dyn Any {
        &self.cell
    }

    fn description(&self) -> String {
        short_type_name::<Self>()
    }

    fn debug_info(&self) -> String {
        self.cell.debug_string()
    }

    fn compute(&self) {}

    fn derive(&self, _variable: &dyn Node) -> GraphResult<NodeRef> {
        constant_zero::<T>(self)
    }
}

impl<T: ValueType> fmt::Debug for Constant<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constant")
            .field("value", &self.cell.debug_string())
            .field("core", &self.core)
            .finish()
    }
}
