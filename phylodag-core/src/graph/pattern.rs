//! Dependency Patterns
//!
//! Each generic node template declares the shape of its dependency vector.
//! The shape is checked once, when the node is built; a vector that does not
//! fit is rejected with an error naming the node type and the slot at fault,
//! and no node is created.
//!
//! Checks run in a fixed order: arity first, then unbound slots, then the
//! value type of each slot. The first violation found is reported.

use crate::error::{GraphError, GraphResult};
use super::node::{NodeRef, NodeRefVec};
use super::value::ValueTypeInfo;

/// Declared shape of a node's dependency vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyPattern {
    /// Exactly one dependency per listed type, in order.
    Function(Vec<ValueTypeInfo>),

    /// Any number of dependencies, all of the same type.
    Reduction(ValueTypeInfo),

    /// Exactly `len` dependencies, all of the same type.
    Array {
        element: ValueTypeInfo,
        len: usize,
    },
}

impl DependencyPattern {
    /// Expected number of dependencies, if fixed.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Self::Function(types) => Some(types.len()),
            Self::Reduction(_) => None,
            Self::Array { len, .. } => Some(*len),
        }
    }

    /// Value type expected in slot `index`.
    pub fn slot_type(&self, index: usize) -> Option<ValueTypeInfo> {
        match self {
            Self::Function(types) => types.get(index).copied(),
            Self::Reduction(element) => Some(*element),
            Self::Array { element, len } => (index < *len).then_some(*element),
        }
    }

    /// Check a complete dependency vector.
    pub fn check(&self, node_type: &'static str, dependencies: &[NodeRef]) -> GraphResult<()> {
        self.check_arity(node_type, dependencies.len())?;
        self.check_types(node_type, dependencies)
    }

    /// Turn a vector of possibly unbound slots into a dependency vector.
    ///
    /// Fails on an arity mismatch or on the first unbound slot. Slot types
    /// are left for [`DependencyPattern::check`].
    pub fn bind_slots(
        &self,
        node_type: &'static str,
        slots: Vec<Option<NodeRef>>,
    ) -> GraphResult<NodeRefVec> {
        self.check_arity(node_type, slots.len())?;
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(GraphError::NullDependency { node_type, index }))
            .collect()
    }

    fn check_arity(&self, node_type: &'static str, given: usize) -> GraphResult<()> {
        match self.arity() {
            Some(expected) if expected != given => Err(GraphError::ArityMismatch {
                node_type,
                expected,
                given,
            }),
            _ => Ok(()),
        }
    }

    fn check_types(&self, node_type: &'static str, dependencies: &[NodeRef]) -> GraphResult<()> {
        for (index, dependency) in dependencies.iter().enumerate() {
            let given = dependency.value_type();
            if let Some(expected) = self.slot_type(index) {
                if expected != given {
                    return Err(GraphError::TypeMismatch {
                        node_type,
                        index,
                        expected: expected.name(),
                        given: given.name(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Leaves take no dependencies.
pub(crate) fn check_no_dependencies<N: 'static>(dependencies: &[NodeRef]) -> GraphResult<()> {
    if dependencies.is_empty() {
        Ok(())
    } else {
        Err(GraphError::ArityMismatch {
            node_type: std::any::type_name::<N>(),
            expected: 0,
            given: dependencies.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::leaf::{Constant, Parameter};

    fn scalar_pair() -> DependencyPattern {
        DependencyPattern::Function(vec![ValueTypeInfo::of::<f64>(), ValueTypeInfo::of::<i32>()])
    }

    #[test]
    fn function_pattern_checks_arity_then_types() {
        let x = Parameter::create(1.0).to_node();
        let n = Constant::create(2i32).to_node();

        assert!(scalar_pair().check("Pair", &[x.clone(), n.clone()]).is_ok());
        assert_eq!(
            scalar_pair().check("Pair", &[x.clone()]),
            Err(GraphError::ArityMismatch {
                node_type: "Pair",
                expected: 2,
                given: 1
            })
        );
        assert_eq!(
            scalar_pair().check("Pair", &[n.clone(), x.clone()]),
            Err(GraphError::TypeMismatch {
                node_type: "Pair",
                index: 0,
                expected: "f64",
                given: "i32"
            })
        );
    }

    #[test]
    fn null_slot_is_reported_before_types() {
        let n = Constant::create(2i32).to_node();
        let err = scalar_pair().bind_slots("Pair", vec![Some(n), None]).unwrap_err();
        assert_eq!(
            err,
            GraphError::NullDependency {
                node_type: "Pair",
                index: 1
            }
        );
    }

    #[test]
    fn reduction_accepts_any_count() {
        let pattern = DependencyPattern::Reduction(ValueTypeInfo::of::<f64>());
        assert!(pattern.check("Sum", &[]).is_ok());

        let deps: Vec<_> = (0..5).map(|i| Constant::create(i as f64).to_node()).collect();
        assert!(pattern.check("Sum", &deps).is_ok());

        let bad = vec![deps[0].clone(), Constant::create(1u8).to_node()];
        assert!(matches!(
            pattern.check("Sum", &bad),
            Err(GraphError::TypeMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn array_fixes_the_count() {
        let pattern = DependencyPattern::Array {
            element: ValueTypeInfo::of::<f64>(),
            len: 2,
        };
        let deps: Vec<_> = (0..3).map(|i| Constant::create(i as f64).to_node()).collect();
        assert!(pattern.check("Pair", &deps[..2]).is_ok());
        assert!(matches!(
            pattern.check("Pair", &deps),
            Err(GraphError::ArityMismatch {
                expected: 2,
                given: 3,
                ..
            })
        ));
    }
}
