//! Tree-rewriting passes and the combinators that sequence them.
//!
//! Every pass borrows its input and builds a fresh tree, reporting whether
//! anything changed. The boolean passes (flatten, order/dedupe, absorption,
//! DNF) are written once against [`BooleanTree`] and run on both layers of a
//! pattern.

pub mod absorb;
pub mod comparison;
pub mod dnf;
pub mod flatten;
pub mod observation;
pub mod order;
pub mod special;

use slog::{debug, error, Logger};

use crate::error::EquivalenceError;
use crate::pattern::{ComparisonExpr, Junction, ObservationExpr};

pub use self::absorb::Absorption;
pub use self::comparison::CanonicalizeTests;
pub use self::dnf::Dnf;
pub use self::flatten::Flatten;
pub use self::observation::CanonicalizeComparisons;
pub use self::order::OrderDedupe;

/// A pure rewrite of a tree
pub trait Transform<T>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the rewritten tree and whether it differs from `expr`
    fn transform(&self, logger: &Logger, expr: &T) -> Result<(T, bool), EquivalenceError>;
}

/// Trees that can report their size, used to bound [`Settle`]
pub trait Measured {
    fn node_count(&self) -> usize;
}

impl Measured for ObservationExpr {
    fn node_count(&self) -> usize {
        ObservationExpr::node_count(self)
    }
}

impl Measured for ComparisonExpr {
    fn node_count(&self) -> usize {
        ComparisonExpr::node_count(self)
    }
}

/// A tree of n-ary boolean-ish compounds over opaque atoms.
///
/// Anything that is not a compound (a comparison test, an observation leaf,
/// a qualified observation) is an atom at its parent's level.
pub trait BooleanTree: Ord + Clone + Sized {
    type Op: Copy + Eq;

    fn as_compound(&self) -> Option<(Self::Op, &[Self])>;

    /// A compound's operands, or the atom itself
    fn into_operands(self) -> Vec<Self>;

    fn compound(op: Self::Op, operands: Vec<Self>) -> Self;

    /// The junction an operator behaves as, if it obeys the boolean laws
    fn junction(op: Self::Op) -> Option<Junction>;

    fn op_for(junction: Junction) -> Self::Op;

    /// Whether DNF expansion pushes this operator below OR
    fn distributes_over_or(op: Self::Op) -> bool;

    /// Rebuild the tree bottom-up, handing each compound's rewritten operands
    /// to `step`. Returns the new tree and whether any step (or any
    /// structural merge along the way) changed something.
    fn rewrite_compounds(
        &self,
        step: &mut dyn FnMut(Self::Op, Vec<Self>) -> (Self, bool),
    ) -> (Self, bool);

    fn has_op(&self, op: Self::Op) -> bool {
        matches!(self.as_compound(), Some((inner, _)) if inner == op)
    }
}

/// Build a compound, replacing a single-operand list by its operand
pub(crate) fn collapse<T: BooleanTree>(op: T::Op, operands: Vec<T>, changed: bool) -> (T, bool) {
    match <[T; 1]>::try_from(operands) {
        Ok([single]) => (single, true),
        Err(operands) => (T::compound(op, operands), changed),
    }
}

/// Runs a fixed sequence of passes, threading the tree through them
pub struct Chain<T> {
    name: &'static str,
    passes: Vec<Box<dyn Transform<T>>>,
}

impl<T> Chain<T> {
    pub fn new(name: &'static str, passes: Vec<Box<dyn Transform<T>>>) -> Self {
        Self { name, passes }
    }
}

impl<T: Clone> Transform<T> for Chain<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn transform(&self, logger: &Logger, expr: &T) -> Result<(T, bool), EquivalenceError> {
        let mut changed = false;
        let mut current: Option<T> = None;

        for pass in self.passes.iter() {
            let input = current.as_ref().unwrap_or(expr);
            let (next, pass_changed) = pass.transform(logger, input)?;
            debug!(logger, "pass applied"; "chain" => self.name, "pass" => pass.name(), "changed" => pass_changed);
            changed |= pass_changed;
            current = Some(next);
        }

        Ok((current.unwrap_or_else(|| expr.clone()), changed))
    }
}

/// Bound on how many times [`Settle`] may reapply its pass:
/// `base + per_node * node_count(input)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationLimit {
    pub base: usize,
    pub per_node: usize,
}

impl Default for IterationLimit {
    fn default() -> Self {
        Self {
            base: 8,
            per_node: 1,
        }
    }
}

impl IterationLimit {
    pub fn cap(&self, node_count: usize) -> usize {
        self.base
            .saturating_add(self.per_node.saturating_mul(node_count))
    }
}

/// Reapplies a pass until it reports no change. Running out of iterations
/// is fatal: a pass that never settles is a bug, not a result.
pub struct Settle<P> {
    pass: P,
    limit: IterationLimit,
}

impl<P> Settle<P> {
    pub fn new(pass: P, limit: IterationLimit) -> Self {
        Self { pass, limit }
    }
}

impl<T: Measured, P: Transform<T>> Transform<T> for Settle<P> {
    fn name(&self) -> &'static str {
        self.pass.name()
    }

    fn transform(&self, logger: &Logger, expr: &T) -> Result<(T, bool), EquivalenceError> {
        let cap = self.limit.cap(expr.node_count());
        let mut current: Option<T> = None;

        for iteration in 1..=cap {
            let input = current.as_ref().unwrap_or(expr);
            let (next, changed) = self.pass.transform(logger, input)?;
            if !changed {
                debug!(logger, "settled"; "pass" => self.pass.name(), "iterations" => iteration);
                let touched = current.is_some();
                return Ok((current.unwrap_or(next), touched));
            }
            current = Some(next);
        }

        error!(logger, "pass did not settle"; "pass" => self.pass.name(), "limit" => cap);
        Err(EquivalenceError::NonConvergence {
            pass: self.pass.name(),
            limit: cap,
        })
    }
}

/// Flatten, then order and dedupe, then absorb, repeated until stable
pub fn simplify<T>(limit: IterationLimit) -> Settle<Chain<T>>
where
    T: BooleanTree + Send + Sync + 'static,
{
    Settle::new(
        Chain::new(
            "simplify",
            vec![Box::new(Flatten), Box::new(OrderDedupe), Box::new(Absorption)],
        ),
        limit,
    )
}

/// Full pipeline for the comparison expression inside one observation
pub fn comparison_pipeline(limit: IterationLimit) -> Chain<ComparisonExpr> {
    Chain::new(
        "comparison",
        vec![
            Box::new(CanonicalizeTests),
            Box::new(simplify::<ComparisonExpr>(limit)),
            Box::new(Dnf),
            Box::new(simplify::<ComparisonExpr>(limit)),
        ],
    )
}

/// Full pipeline for a pattern
pub fn observation_pipeline(limit: IterationLimit) -> Chain<ObservationExpr> {
    Chain::new(
        "observation",
        vec![
            Box::new(CanonicalizeComparisons::new(comparison_pipeline(limit))),
            Box::new(simplify::<ObservationExpr>(limit)),
            Box::new(Dnf),
            Box::new(simplify::<ObservationExpr>(limit)),
        ],
    )
}
