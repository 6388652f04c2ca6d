use slog::Logger;

use super::{collapse, BooleanTree, Transform};
use crate::error::EquivalenceError;

/// Inline operands that share their parent's operator:
/// `AND(AND(a, b), c)` becomes `AND(a, b, c)`
pub struct Flatten;

pub(crate) fn flatten_step<T: BooleanTree>(op: T::Op, operands: Vec<T>) -> (T, bool) {
    let mut changed = false;
    let mut flat = Vec::with_capacity(operands.len());

    for operand in operands {
        if operand.has_op(op) {
            changed = true;
            flat.extend(operand.into_operands());
        } else {
            flat.push(operand);
        }
    }

    collapse(op, flat, changed)
}

impl<T: BooleanTree + Send + Sync> Transform<T> for Flatten {
    fn name(&self) -> &'static str {
        "flatten"
    }

    fn transform(&self, _logger: &Logger, expr: &T) -> Result<(T, bool), EquivalenceError> {
        Ok(expr.rewrite_compounds(&mut flatten_step::<T>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::comparison::tests::{and, or, t};
    use pretty_assertions::assert_eq;

    fn flatten(e: &crate::pattern::ComparisonExpr) -> (crate::pattern::ComparisonExpr, bool) {
        Flatten
            .transform(&Logger::root(slog::Discard, slog::o!()), e)
            .unwrap()
    }

    #[test]
    fn nested_same_operator_is_inlined() {
        let e = and(vec![and(vec![t("a"), t("b")]), t("c")]);
        assert_eq!(flatten(&e), (and(vec![t("a"), t("b"), t("c")]), true));
    }

    #[test]
    fn deep_nesting_flattens_in_one_pass() {
        let e = or(vec![t("a"), or(vec![t("b"), or(vec![t("c"), t("d")])])]);
        assert_eq!(flatten(&e), (or(vec![t("a"), t("b"), t("c"), t("d")]), true));
    }

    #[test]
    fn mixed_operators_are_kept() {
        let e = and(vec![or(vec![t("a"), t("b")]), t("c")]);
        assert_eq!(flatten(&e), (e.clone(), false));
    }

    #[test]
    fn atoms_are_untouched() {
        assert_eq!(flatten(&t("a")), (t("a"), false));
    }
}
