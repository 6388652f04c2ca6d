use recursion::CollapsibleExt;
use slog::Logger;

use super::special::canonical_value;
use super::{BooleanTree, Transform};
use crate::error::EquivalenceError;
use crate::pattern::frame::ComparisonFrame;
use crate::pattern::{ComparisonExpr, ComparisonOp, Junction, PropertyTest, Value};

impl BooleanTree for ComparisonExpr {
    type Op = Junction;

    fn as_compound(&self) -> Option<(Junction, &[Self])> {
        match self {
            ComparisonExpr::Compound { op, operands } => Some((*op, operands.as_slice())),
            ComparisonExpr::Test(_) => None,
        }
    }

    fn into_operands(self) -> Vec<Self> {
        match self {
            ComparisonExpr::Compound { operands, .. } => operands,
            test => vec![test],
        }
    }

    fn compound(op: Junction, operands: Vec<Self>) -> Self {
        ComparisonExpr::Compound { op, operands }
    }

    fn junction(op: Junction) -> Option<Junction> {
        Some(op)
    }

    fn op_for(junction: Junction) -> Junction {
        junction
    }

    fn distributes_over_or(op: Junction) -> bool {
        op == Junction::And
    }

    fn rewrite_compounds(
        &self,
        step: &mut dyn FnMut(Junction, Vec<Self>) -> (Self, bool),
    ) -> (Self, bool) {
        self.collapse_frames(|frame| match frame {
            ComparisonFrame::Test(test) => (ComparisonExpr::Test(test.clone()), false),
            ComparisonFrame::Compound(op, operands) => {
                let (operands, changed): (Vec<_>, Vec<bool>) = operands.into_iter().unzip();
                let (rewritten, stepped) = step(op, operands);
                (rewritten, stepped || changed.into_iter().any(|c| c))
            }
        })
    }
}

/// Rewrites each property test into its canonical spelling:
/// - `NOT =` becomes `!=` and `NOT !=` becomes `=`
/// - special values (IP addresses, registry keys) take their canonical text
/// - set literals are sorted and deduplicated
pub struct CanonicalizeTests;

pub fn canonical_test(test: &PropertyTest) -> (PropertyTest, bool) {
    let mut test = test.clone();
    let mut changed = false;

    if test.negated {
        let flipped = match test.operator {
            ComparisonOp::Eq => Some(ComparisonOp::NotEq),
            ComparisonOp::NotEq => Some(ComparisonOp::Eq),
            _ => None,
        };
        if let Some(operator) = flipped {
            test.operator = operator;
            test.negated = false;
            changed = true;
        }
    }

    if let Some(value) = canonical_value(&test.path, test.operator, test.value.as_ref()) {
        test.value = Some(value);
        changed = true;
    }

    if let Some(Value::Set(items)) = &mut test.value {
        if !items.windows(2).all(|w| w[0] < w[1]) {
            items.sort();
            items.dedup();
            changed = true;
        }
    }

    (test, changed)
}

impl Transform<ComparisonExpr> for CanonicalizeTests {
    fn name(&self) -> &'static str {
        "canonicalize-tests"
    }

    fn transform(
        &self,
        _logger: &Logger,
        expr: &ComparisonExpr,
    ) -> Result<(ComparisonExpr, bool), EquivalenceError> {
        Ok(expr.collapse_frames(|frame| match frame {
            ComparisonFrame::Test(test) => {
                let (test, changed) = canonical_test(test);
                (ComparisonExpr::Test(test), changed)
            }
            ComparisonFrame::Compound(op, operands) => {
                let (operands, changed): (Vec<_>, Vec<bool>) = operands.into_iter().unzip();
                (
                    ComparisonExpr::Compound { op, operands },
                    changed.into_iter().any(|c| c),
                )
            }
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pattern::{Number, ObjectPath};
    use crate::transform::{comparison_pipeline, IterationLimit};
    use pretty_assertions::assert_eq;

    /// `x:<name> = 1`, ordered by name
    pub fn t(name: &str) -> ComparisonExpr {
        ComparisonExpr::test(
            ObjectPath::simple("x", name),
            ComparisonOp::Eq,
            Value::Number(Number::Int(1)),
        )
    }

    pub fn and(operands: Vec<ComparisonExpr>) -> ComparisonExpr {
        ComparisonExpr::compound(Junction::And, operands)
    }

    pub fn or(operands: Vec<ComparisonExpr>) -> ComparisonExpr {
        ComparisonExpr::compound(Junction::Or, operands)
    }

    fn logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    fn negated(operator: ComparisonOp, value: Value) -> PropertyTest {
        PropertyTest {
            path: ObjectPath::simple("file", "name"),
            operator,
            value: Some(value),
            negated: true,
        }
    }

    #[test]
    fn negated_equality_flips_operator() {
        let (test, changed) = canonical_test(&negated(ComparisonOp::Eq, Value::String("a".into())));
        assert!(changed);
        assert_eq!(test.operator, ComparisonOp::NotEq);
        assert!(!test.negated);

        let (test, _) = canonical_test(&negated(ComparisonOp::NotEq, Value::String("a".into())));
        assert_eq!(test.operator, ComparisonOp::Eq);
        assert!(!test.negated);
    }

    #[test]
    fn other_negations_keep_the_flag() {
        let original = negated(ComparisonOp::Like, Value::String("a%".into()));
        let (test, changed) = canonical_test(&original);
        assert!(!changed);
        assert_eq!(test, original);
    }

    #[test]
    fn set_literals_are_sorted_and_deduplicated() {
        let test = PropertyTest {
            path: ObjectPath::simple("file", "size"),
            operator: ComparisonOp::In,
            value: Some(Value::Set(vec![
                Value::Number(Number::Int(3)),
                Value::Number(Number::Int(1)),
                Value::Number(Number::Int(3)),
            ])),
            negated: false,
        };
        let (test, changed) = canonical_test(&test);
        assert!(changed);
        assert_eq!(
            test.value,
            Some(Value::Set(vec![
                Value::Number(Number::Int(1)),
                Value::Number(Number::Int(3)),
            ]))
        );
        assert!(!canonical_test(&test).1);
    }

    #[test]
    fn pipeline_reaches_canonical_dnf() {
        // (b OR a) AND c AND (c OR d)
        let e = and(vec![or(vec![t("b"), t("a")]), and(vec![t("c"), or(vec![t("c"), t("d")])])]);
        let pipeline = comparison_pipeline(IterationLimit::default());
        let (canonical, changed) = pipeline.transform(&logger(), &e).unwrap();
        assert!(changed);
        assert_eq!(
            canonical,
            or(vec![and(vec![t("a"), t("c")]), and(vec![t("b"), t("c")])])
        );

        let (again, changed) = pipeline.transform(&logger(), &canonical).unwrap();
        assert!(!changed);
        assert_eq!(again, canonical);
    }
}
