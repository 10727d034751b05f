//! Dependency pruning helpers for derivative rules.
//!
//! Derivative rules produce many terms that are constant zeros. These helpers
//! let a rule drop such terms before building its result node.

use super::node::{Node, NodeRefVec};
use super::value::{make_valid, value_cell_of, ValueType};

/// Remove every dependency matching `predicate`, keeping the order of the rest.
pub fn remove_dependencies_if<P>(mut dependencies: NodeRefVec, predicate: P) -> NodeRefVec
where
    P: Fn(&dyn Node) -> bool,
{
    dependencies.retain(|dependency| !predicate(&**dependency));
    dependencies
}

/// Predicate matching constant nodes of type `T` whose value satisfies `test`.
///
/// Non-constant nodes never match, so the predicate never evaluates a node
/// whose value could still change.
pub fn is_constant_value_matching<T, F>(test: F) -> impl Fn(&dyn Node) -> bool
where
    T: ValueType,
    F: Fn(&T) -> bool,
{
    move |node: &dyn Node| {
        if !node.is_constant() {
            return false;
        }
        let Some(cell) = value_cell_of::<T>(node) else {
            return false;
        };
        make_valid(node);
        cell.read().map_or(false, |value| test(&*value))
    }
}

/// Predicate matching constant nodes of type `T` equal to zero.
pub fn is_constant_zero<T>() -> impl Fn(&dyn Node) -> bool
where
    T: ValueType + PartialEq,
{
    is_constant_value_matching::<T, _>(|value: &T| value.zero_like().as_ref() == Some(value))
}
