use itertools::Itertools;
use slog::{debug, Logger};

use super::flatten::flatten_step;
use super::{BooleanTree, Transform};
use crate::error::EquivalenceError;
use crate::pattern::Junction;

/// Expand into disjunctive normal form: a top-level OR of clauses with no OR
/// beneath an AND (or FOLLOWEDBY).
///
/// Works bottom-up, so every operand a node sees is already in DNF. OR nodes
/// absorb their OR children's clauses; a distributing node with an OR child
/// becomes the OR of every combination of its children's clauses.
pub struct Dnf;

pub(crate) fn distribute_step<T: BooleanTree>(op: T::Op, operands: Vec<T>) -> (T, bool) {
    let or = T::op_for(Junction::Or);

    if op == or {
        return flatten_step(op, operands);
    }
    if !T::distributes_over_or(op) || !operands.iter().any(|o| o.has_op(or)) {
        return (T::compound(op, operands), false);
    }

    let clauses: Vec<Vec<T>> = operands
        .into_iter()
        .map(|o| if o.has_op(or) { o.into_operands() } else { vec![o] })
        .collect();

    let products = clauses
        .into_iter()
        .multi_cartesian_product()
        .map(|choice| flatten_step(op, choice).0)
        .collect();

    (T::compound(or, products), true)
}

impl<T: BooleanTree + Send + Sync> Transform<T> for Dnf {
    fn name(&self) -> &'static str {
        "dnf"
    }

    fn transform(&self, logger: &Logger, expr: &T) -> Result<(T, bool), EquivalenceError> {
        let (expanded, changed) = expr.rewrite_compounds(&mut distribute_step::<T>);
        if changed {
            let clauses = match expanded.as_compound() {
                Some((op, operands)) if op == T::op_for(Junction::Or) => operands.len(),
                _ => 1,
            };
            debug!(logger, "expanded to dnf"; "clauses" => clauses);
        }
        Ok((expanded, changed))
    }
}
