//! Typed Values
//!
//! Every node produces a value of exactly one type. The value lives in a
//! [`ValueCell`] owned by the node, and is read through a typed
//! [`ValueRef`] handle which evaluates the node on demand.
//!
//! # Lazy Evaluation
//!
//! Reading a value never recomputes more than necessary:
//!
//! 1. If the node is valid, the cached value is returned as is.
//!
//! 2. Otherwise every invalid dependency is brought up to date first, in
//!    dependency order, and the node's `compute` runs once.
//!
//! Evaluation walks the graph with an explicit stack, so deep dependency
//! chains do not grow the call stack.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use tracing::trace;

use crate::error::{GraphError, GraphResult};
use super::leaf::Constant;
use super::node::{Node, NodeRef};

/// A type that can be produced by a node.
///
/// The seeds are the derivatives handed out by leaves: `zero_like` for
/// "does not depend on the variable" and `one_like` for "is the variable".
/// They take `self` so that shaped values can match its size.
pub trait ValueType: Any + Send + Sync + fmt::Debug + Sized {
    /// Whether `one_like` depends on the size of the value. The unit seed of
    /// a shaped parameter is recomputed whenever the parameter changes.
    const SHAPED: bool = false;

    /// Additive identity for values like `self`.
    fn zero_like(&self) -> Option<Self> {
        None
    }

    /// Multiplicative identity with the same shape as `self`.
    fn one_like(&self) -> Option<Self> {
        None
    }
}

macro_rules! impl_scalar_value_type {
    ($($t:ty => $zero:expr, $one:expr);+ $(;)?) => {
        $(
            impl ValueType for $t {
                fn zero_like(&self) -> Option<Self> {
                    Some($zero)
                }

                fn one_like(&self) -> Option<Self> {
                    Some($one)
                }
            }
        )+
    };
}

impl_scalar_value_type! {
    f32 => 0.0, 1.0;
    f64 => 0.0, 1.0;
    i8 => 0, 1;
    i16 => 0, 1;
    i32 => 0, 1;
    i64 => 0, 1;
    isize => 0, 1;
    u8 => 0, 1;
    u16 => 0, 1;
    u32 => 0, 1;
    u64 => 0, 1;
    usize => 0, 1;
}

impl ValueType for bool {}

impl ValueType for String {}

/// The empty vector is the zero of every length.
impl ValueType for Vec<f64> {
    const SHAPED: bool = true;

    fn zero_like(&self) -> Option<Self> {
        Some(Vec::new())
    }

    fn one_like(&self) -> Option<Self> {
        Some(vec![1.0; self.len()])
    }
}

/// Runtime description of a value type.
#[derive(Clone, Copy)]
pub struct ValueTypeInfo {
    id: TypeId,
    name: &'static str,
}

impl ValueTypeInfo {
    pub fn of<T: ValueType>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: ValueType>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for ValueTypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ValueTypeInfo {}

impl fmt::Debug for ValueTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Storage for a node's value.
///
/// Empty until a computed node is first evaluated. Only the owning node
/// writes to it.
pub struct ValueCell<T> {
    value: RwLock<Option<T>>,
}

impl<T: ValueType> ValueCell<T> {
    /// A cell with no value yet.
    pub fn empty() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }

    /// A cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(Some(value)),
        }
    }

    /// Replace the stored value.
    pub fn store(&self, value: T) {
        *self.value.write() = Some(value);
    }

    /// Modify the stored value in place. Does nothing on an empty cell.
    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        if let Some(value) = self.value.write().as_mut() {
            f(value);
        }
    }

    /// Borrow the stored value.
    ///
    /// Uses a recursive read so that a node reading the same dependency
    /// through two slots cannot deadlock.
    pub fn read(&self) -> Option<MappedRwLockReadGuard<'_, T>> {
        RwLockReadGuard::try_map(self.value.read_recursive(), Option::as_ref).ok()
    }

    /// `Debug` rendering of the stored value, for exports.
    pub fn debug_string(&self) -> String {
        match self.read() {
            Some(value) => format!("{:?}", &*value),
            None => "<empty>".to_string(),
        }
    }
}

/// Typed view of the value cell of `node`, if it produces a `T`.
pub fn value_cell_of<T: ValueType>(node: &dyn Node) -> Option<&ValueCell<T>> {
    node.value_cell().downcast_ref::<ValueCell<T>>()
}

/// Borrow the value of a dependency that the caller knows to be valid and of
/// type `T`.
pub(crate) fn read_value<T: ValueType>(node: &dyn Node) -> MappedRwLockReadGuard<'_, T> {
    value_cell_of::<T>(node)
        .expect("dependency value type checked at construction")
        .read()
        .expect("dependency evaluated before its dependents")
}

/// Bring `root` and every dependency it transitively reads up to date.
pub fn make_valid(root: &dyn Node) {
    if root.is_valid() {
        return;
    }

    // (node, index of the next dependency to visit)
    let mut stack: Vec<(&dyn Node, usize)> = vec![(root, 0)];
    while let Some((node, index)) = stack.pop() {
        match node.dependencies().get(index) {
            Some(dependency) => {
                stack.push((node, index + 1));
                if !dependency.is_valid() {
                    stack.push((&**dependency, 0));
                }
            }
            None => {
                if !node.is_valid() {
                    trace!(node = %node.id(), "computing {}", node.description());
                    node.compute();
                    node.core().mark_valid();
                }
            }
        }
    }
}

/// Constant zero shaped like the current value of `node`.
///
/// Used as the derivative of any node whose value cannot change.
pub(crate) fn constant_zero<T: ValueType>(node: &dyn Node) -> GraphResult<NodeRef> {
    make_valid(node);
    let zero = read_value::<T>(node).zero_like();
    match zero {
        Some(zero) => Ok(Constant::create(zero).to_node()),
        None => Err(GraphError::NotDerivable {
            node_type: node.node_type().name(),
        }),
    }
}

/// Shared handle to a node known to produce a `T`.
///
/// Dereferences to the untyped node, so every [`Node`] method is available.
pub struct ValueRef<T> {
    node: NodeRef,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ValueType> ValueRef<T> {
    /// Checked conversion from an untyped handle.
    pub fn from_node(node: NodeRef) -> GraphResult<Self> {
        let produced = node.value_type();
        if !produced.is::<T>() {
            return Err(GraphError::ValueTypeMismatch {
                expected: std::any::type_name::<T>(),
                given: produced.name(),
            });
        }
        Ok(Self::new_unchecked(node))
    }

    pub(crate) fn new_unchecked(node: NodeRef) -> Self {
        Self {
            node,
            _marker: PhantomData,
        }
    }

    /// Run `f` on the up-to-date value, evaluating the node first if needed.
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        make_valid(&*self.node);
        f(&read_value::<T>(&*self.node))
    }

    /// Get the up-to-date value, evaluating the node first if needed.
    pub fn get_value(&self) -> T
    where
        T: Clone,
    {
        self.with_value(T::clone)
    }

    /// The cached value, without evaluating anything.
    ///
    /// Returns `None` while the node is invalid.
    pub fn cached_value(&self) -> Option<T>
    where
        T: Clone,
    {
        if !self.node.is_valid() {
            return None;
        }
        value_cell_of::<T>(&*self.node)
            .and_then(ValueCell::read)
            .map(|value| T::clone(&value))
    }

    /// Node computing the partial derivative of this value with respect to
    /// `variable`.
    pub fn derive(&self, variable: &dyn Node) -> GraphResult<ValueRef<T>> {
        ValueRef::from_node(self.node.derive(variable)?)
    }

    pub fn as_node(&self) -> &NodeRef {
        &self.node
    }

    pub fn to_node(&self) -> NodeRef {
        Arc::clone(&self.node)
    }

    pub fn into_node(self) -> NodeRef {
        self.node
    }
}

impl<T> Clone for ValueRef<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
            _marker: PhantomData,
        }
    }
}

impl<T> Deref for ValueRef<T> {
    type Target = dyn Node;

    fn deref(&self) -> &Self::Target {
        &*self.node
    }
}

impl<T> fmt::Debug for ValueRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.node, f)
    }
}

impl<T> From<ValueRef<T>> for NodeRef {
    fn from(value: ValueRef<T>) -> Self {
        value.node
    }
}

/// Last path segment of a type name, generics included: `numeric::Add` becomes
/// `Add`, `leaf::Parameter<f64>` becomes `Parameter<f64>`.
pub fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for c in full.chars() {
        match c {
            ':' => segment.clear(),
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                out.push_str(&segment);
                segment.clear();
                out.push(c);
            }
            _ => segment.push(c),
        }
    }
    out.push_str(&segment);
    out
}
