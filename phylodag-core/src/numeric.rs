//! Numeric Operations
//!
//! Operation descriptors for the scalar and per-site vector arithmetic a
//! likelihood graph is assembled from, each with its derivative rule.
//!
//! # Scalars
//!
//! | Node | Value | Derivative |
//! |------|-------|------------|
//! | [`AddNode`] | `a + b + ...` | sum of derivatives |
//! | [`MulNode`] | `a * b * ...` | product rule |
//! | [`NegNode`] | `-x` | `-dx` |
//! | [`SquareNode`] | `x²` | [`DSquareNode`] |
//! | [`LogNode`] | `ln x` | `dx / x` |
//! | [`QuotientNode`] | `a / b` | quotient rule |
//!
//! # Per-site vectors
//!
//! Vectors hold one entry per alignment site. An empty vector stands for a
//! zero of any length, which is what derivative rules produce once every
//! non-zero term has been pruned: it is skipped by sums and absorbs
//! products. Any other pair of operands must agree in length; a mismatch
//! panics during evaluation.
//!
//! | Node | Value |
//! |------|-------|
//! | [`CWiseAddNode`] | component-wise sum |
//! | [`CWiseMulNode`] | component-wise product |
//! | [`ScaleNode`] | `f64 × vector` |
//! | [`SumOfLogarithmsNode`] | `Σ ln vᵢ`, the shape of a total log-likelihood |
//! | [`SumOfRatiosNode`] | `Σ nᵢ / dᵢ` |

use crate::error::GraphResult;
use crate::graph::{
    is_constant_zero, remove_dependencies_if, ArgRefs, FunctionNode, FunctionOp, Node, NodeRef,
    NodeRefVec, ReductionNode, ReductionOp, ValueRef,
};

fn derivatives(dependencies: &[NodeRef], variable: &dyn Node) -> GraphResult<NodeRefVec> {
    dependencies
        .iter()
        .map(|dependency| dependency.derive(variable))
        .collect()
}

// ----------------------------------------------------------------------------
// Scalar operations
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Add;

impl ReductionOp for Add {
    type Result = f64;
    type Element = f64;

    fn reset(&self) -> f64 {
        0.0
    }

    fn reduce(&self, accumulator: &mut f64, value: &f64) {
        *accumulator += value;
    }

    fn derive(&self, node: &AddNode, variable: &dyn Node) -> GraphResult<NodeRef> {
        let terms = remove_dependencies_if(
            derivatives(node.dependencies(), variable)?,
            is_constant_zero::<f64>(),
        );
        AddNode::create(terms).map(ValueRef::into_node)
    }
}

pub type AddNode = ReductionNode<Add>;

#[derive(Debug, Default)]
pub struct Mul;

impl ReductionOp for Mul {
    type Result = f64;
    type Element = f64;

    fn reset(&self) -> f64 {
        1.0
    }

    fn reduce(&self, accumulator: &mut f64, value: &f64) {
        *accumulator *= value;
    }

    /// `d(a·b·c) = da·b·c + a·db·c + a·b·dc`, dropping zero terms.
    fn derive(&self, node: &MulNode, variable: &dyn Node) -> GraphResult<NodeRef> {
        let factors = node.dependencies();
        let is_zero = is_constant_zero::<f64>();
        let mut terms = Vec::with_capacity(factors.len());
        for (index, factor) in factors.iter().enumerate() {
            let derivative = factor.derive(variable)?;
            if is_zero(&*derivative) {
                continue;
            }
            let mut term = factors.to_vec();
            term[index] = derivative;
            terms.push(MulNode::create(term)?.into_node());
        }
        AddNode::create(terms).map(ValueRef::into_node)
    }
}

pub type MulNode = ReductionNode<Mul>;

#[derive(Debug, Default)]
pub struct Neg;

impl FunctionOp for Neg {
    type Result = f64;
    type Args = (f64,);

    fn compute(&self, (x,): ArgRefs<'_, Self>) -> f64 {
        -x
    }

    fn derive(&self, node: &NegNode, variable: &dyn Node) -> GraphResult<NodeRef> {
        let dx = node.dependency(0).derive(variable)?;
        NegNode::create(vec![dx]).map(ValueRef::into_node)
    }
}

pub type NegNode = FunctionNode<Neg>;

#[derive(Debug, Default)]
pub struct Square;

impl FunctionOp for Square {
    type Result = f64;
    type Args = (f64,);

    fn compute(&self, (x,): ArgRefs<'_, Self>) -> f64 {
        x * x
    }

    fn derive(&self, node: &SquareNode, variable: &dyn Node) -> GraphResult<NodeRef> {
        let x = node.dependency(0);
        let dx = x.derive(variable)?;
        DSquareNode::create(vec![x.clone(), dx]).map(ValueRef::into_node)
    }
}

pub type SquareNode = FunctionNode<Square>;

/// First derivative of a square: `2·x·dx`, from `(x, dx)`.
#[derive(Debug, Default)]
pub struct DSquare;

impl FunctionOp for DSquare {
    type Result = f64;
    type Args = (f64, f64);

    fn compute(&self, (x, dx): ArgRefs<'_, Self>) -> f64 {
        2.0 * x * dx
    }

    fn derive(&self, node: &DSquareNode, variable: &dyn Node) -> GraphResult<NodeRef> {
        let x = node.dependency(0);
        let dx = node.dependency(1);
        DDSquareNode::create(vec![
            x.clone(),
            dx.clone(),
            x.derive(variable)?,
            dx.derive(variable)?,
        ])
        .map(ValueRef::into_node)
    }
}

pub type DSquareNode = FunctionNode<DSquare>;

/// Derivative of `2·x·y`: `2·(dx·y + x·dy)`, from `(x, y, dx, dy)`.
#[derive(Debug, Default)]
pub struct DDSquare;

impl FunctionOp for DDSquare {
    type Result = f64;
    type Args = (f64, f64, f64, f64);

    fn compute(&self, (x, y, dx, dy): ArgRefs<'_, Self>) -> f64 {
        2.0 * (dx * y + x * dy)
    }
}

pub type DDSquareNode = FunctionNode<DDSquare>;

#[derive(Debug, Default)]
pub struct Log;

impl FunctionOp for Log {
    type Result = f64;
    type Args = (f64,);

    fn compute(&self, (x,): ArgRefs<'_, Self>) -> f64 {
        x.ln()
    }

    fn derive(&self, node: &LogNode, variable: &dyn Node) -> GraphResult<NodeRef> {
        let x = node.dependency(0);
        QuotientNode::create(vec![x.derive(variable)?, x.clone()]).map(ValueRef::into_node)
    }
}

pub type LogNode = FunctionNode<Log>;

#[derive(Debug, Default)]
pub struct Quotient;

impl FunctionOp for Quotient {
    type Result = f64;
    type Args = (f64, f64);

    fn compute(&self, (a, b): ArgRefs<'_, Self>) -> f64 {
        a / b
    }

    /// `(da·b - a·db) / b²`
    fn derive(&self, node: &QuotientNode, variable: &dyn Node) -> GraphResult<NodeRef> {
        let a = node.dependency(0);
        let b = node.dependency(1);
        let da_b = MulNode::create(vec![a.derive(variable)?, b.clone()])?;
        let a_db = MulNode::create(vec![a.clone(), b.derive(variable)?])?;
        let minus_a_db = NegNode::create(vec![a_db.into_node()])?;
        let numerator = AddNode::create(vec![da_b.into_node(), minus_a_db.into_node()])?;
        let denominator = SquareNode::create(vec![b.clone()])?;
        QuotientNode::create(vec![numerator.into_node(), denominator.into_node()])
            .map(ValueRef::into_node)
    }
}

pub type QuotientNode = FunctionNode<Quotient>;

// ----------------------------------------------------------------------------
// Per-site vector operations
// ----------------------------------------------------------------------------

fn check_sites(a: &[f64], b: &[f64]) {
    assert_eq!(a.len(), b.len(), "per-site vectors differ in length");
}

#[derive(Debug, Default)]
pub struct CWiseAdd;

impl ReductionOp for CWiseAdd {
    type Result = Vec<f64>;
    type Element = Vec<f64>;

    fn reset(&self) -> Vec<f64> {
        Vec::new()
    }

    fn reduce(&self, accumulator: &mut Vec<f64>, value: &Vec<f64>) {
        if value.is_empty() {
            return;
        }
        if accumulator.is_empty() {
            accumulator.extend_from_slice(value);
            return;
        }
        check_sites(accumulator, value);
        for (a, v) in accumulator.iter_mut().zip(value) {
            *a += v;
        }
    }

    fn derive(&self, node: &CWiseAddNode, variable: &dyn Node) -> GraphResult<NodeRef> {
        let terms = remove_dependencies_if(
            derivatives(node.dependencies(), variable)?,
            is_constant_zero::<Vec<f64>>(),
        );
        CWiseAddNode::create(terms).map(ValueRef::into_node)
    }
}

pub type CWiseAddNode = ReductionNode<CWiseAdd>;

#[derive(Debug, Default)]
pub struct CWiseMul;

impl ReductionOp for CWiseMul {
    type Result = Vec<f64>;
    type Element = Vec<f64>;

    fn reset(&self) -> Vec<f64> {
        Vec::new()
    }

    fn reduce_first(&self, accumulator: &mut Vec<f64>, value: &Vec<f64>) {
        accumulator.extend_from_slice(value);
    }

    fn reduce(&self, accumulator: &mut Vec<f64>, value: &Vec<f64>) {
        if accumulator.is_empty() || value.is_empty() {
            accumulator.clear();
            return;
        }
        check_sites(accumulator, value);
        for (a, v) in accumulator.iter_mut().zip(value) {
            *a *= v;
        }
    }

    fn derive(&self, node: &CWiseMulNode, variable: &dyn Node) -> GraphResult<NodeRef> {
        let factors = node.dependencies();
        let is_zero = is_constant_zero::<Vec<f64>>();
        let mut terms = Vec::with_capacity(factors.len());
        for (index, factor) in factors.iter().enumerate() {
            let derivative = factor.derive(variable)?;
            if is_zero(&*derivative) {
                continue;
            }
            let mut term = factors.to_vec();
            term[index] = derivative;
            terms.push(CWiseMulNode::create(term)?.into_node());
        }
        CWiseAddNode::create(terms).map(ValueRef::into_node)
    }
}

pub type CWiseMulNode = ReductionNode<CWiseMul>;

/// Multiply every site by a scalar.
#[derive(Debug, Default)]
pub struct Scale;

impl FunctionOp for Scale {
    type Result = Vec<f64>;
    type Args = (f64, Vec<f64>);

    fn compute(&self, (factor, values): ArgRefs<'_, Self>) -> Vec<f64> {
        values.iter().map(|v| factor * v).collect()
    }

    /// `d(a·v) = da·v + a·dv`, dropping zero terms.
    fn derive(&self, node: &ScaleNode, variable: &dyn Node) -> GraphResult<NodeRef> {
        let a = node.dependency(0);
        let v = node.dependency(1);
        let da = a.derive(variable)?;
        let dv = v.derive(variable)?;

        let mut terms = Vec::with_capacity(2);
        if !is_constant_zero::<f64>()(&*da) {
            terms.push(ScaleNode::create(vec![da, v.clone()])?.into_node());
        }
        if !is_constant_zero::<Vec<f64>>()(&*dv) {
            terms.push(ScaleNode::create(vec![a.clone(), dv])?.into_node());
        }
        CWiseAddNode::create(terms).map(ValueRef::into_node)
    }
}

pub type ScaleNode = FunctionNode<Scale>;

/// Sum of the logarithms of every site.
#[derive(Debug, Default)]
pub struct SumOfLogarithms;

impl FunctionOp for SumOfLogarithms {
    type Result = f64;
    type Args = (Vec<f64>,);

    fn compute(&self, (values,): ArgRefs<'_, Self>) -> f64 {
        values.iter().map(|v| v.ln()).sum()
    }

    fn derive(&self, node: &SumOfLogarithmsNode, variable: &dyn Node) -> GraphResult<NodeRef> {
        let values = node.dependency(0);
        SumOfRatiosNode::create(vec![values.derive(variable)?, values.clone()])
            .map(ValueRef::into_node)
    }
}

pub type SumOfLogarithmsNode = FunctionNode<SumOfLogarithms>;

/// `Σ nᵢ / dᵢ`, from `(n, d)`. An empty numerator sums to zero.
#[derive(Debug, Default)]
pub struct SumOfRatios;

impl FunctionOp for SumOfRatios {
    type Result = f64;
    type Args = (Vec<f64>, Vec<f64>);

    fn compute(&self, (numerators, denominators): ArgRefs<'_, Self>) -> f64 {
        if numerators.is_empty() {
            return 0.0;
        }
        check_sites(numerators, denominators);
        numerators
            .iter()
            .zip(denominators)
            .map(|(n, d)| n / d)
            .sum()
    }
}

pub type SumOfRatiosNode = FunctionNode<SumOfRatios>;
