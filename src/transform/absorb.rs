use slog::Logger;

use super::{collapse, BooleanTree, Transform};
use crate::error::EquivalenceError;

/// Boolean absorption: `AND(x, OR(x, y))` is `x`, `OR(x, AND(x, y))` is `x`.
///
/// Under a junction J with dual D, each operand stands for a set of terms:
/// a D compound for its operands, anything else for itself. An operand whose
/// set contains another operand's set is redundant. Operators without
/// boolean laws are atoms here.
pub struct Absorption;

fn terms<T: BooleanTree>(operand: &T, dual: T::Op) -> Vec<&T> {
    match operand.as_compound() {
        Some((op, children)) if op == dual => children.iter().collect(),
        _ => vec![operand],
    }
}

fn is_subset<T: Eq>(small: &[&T], big: &[&T]) -> bool {
    small.iter().all(|x| big.contains(x))
}

pub(crate) fn absorb_step<T: BooleanTree>(op: T::Op, operands: Vec<T>) -> (T, bool) {
    let Some(junction) = T::junction(op) else {
        return (T::compound(op, operands), false);
    };
    let dual = T::op_for(junction.dual());

    let keep: Vec<bool> = {
        let sets: Vec<Vec<&T>> = operands.iter().map(|o| terms(o, dual)).collect();
        (0..sets.len())
            .map(|i| {
                !(0..sets.len()).any(|k| {
                    k != i
                        && is_subset(&sets[k], &sets[i])
                        && (k < i || !is_subset(&sets[i], &sets[k]))
                })
            })
            .collect()
    };

    let total = operands.len();
    let kept: Vec<T> = operands
        .into_iter()
        .zip(keep)
        .filter_map(|(operand, keep)| keep.then_some(operand))
        .collect();
    let changed = kept.len() != total;

    collapse(op, kept, changed)
}

impl<T: BooleanTree + Send + Sync> Transform<T> for Absorption {
    fn name(&self) -> &'static str {
        "absorption"
    }

    fn transform(&self, _logger: &Logger, expr: &T) -> Result<(T, bool), EquivalenceError> {
        Ok(expr.rewrite_compounds(&mut absorb_step::<T>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::ComparisonExpr;
    use crate::transform::comparison::tests::{and, or, t};
    use pretty_assertions::assert_eq;

    fn absorb(e: &ComparisonExpr) -> (ComparisonExpr, bool) {
        Absorption
            .transform(&Logger::root(slog::Discard, slog::o!()), e)
            .unwrap()
    }

    #[test]
    fn and_absorbs_or() {
        let e = and(vec![t("a"), or(vec![t("a"), t("b")])]);
        assert_eq!(absorb(&e), (t("a"), true));
    }

    #[test]
    fn or_absorbs_and() {
        let e = or(vec![and(vec![t("a"), t("b")]), t("a")]);
        assert_eq!(absorb(&e), (t("a"), true));
    }

    #[test]
    fn smaller_clause_absorbs_larger() {
        let e = or(vec![
            and(vec![t("a"), t("b")]),
            and(vec![t("a"), t("b"), t("c")]),
            t("d"),
        ]);
        assert_eq!(
            absorb(&e),
            (or(vec![and(vec![t("a"), t("b")]), t("d")]), true)
        );
    }

    #[test]
    fn equal_clauses_keep_the_first() {
        let e = or(vec![t("a"), t("b"), t("a")]);
        assert_eq!(absorb(&e), (or(vec![t("a"), t("b")]), true));
    }

    #[test]
    fn unrelated_operands_survive() {
        let e = and(vec![t("a"), or(vec![t("b"), t("c")])]);
        assert_eq!(absorb(&e), (e.clone(), false));
    }
}
