use recursion::CollapsibleExt;
use slog::{debug, Logger};

use super::{BooleanTree, Transform};
use crate::error::EquivalenceError;
use crate::pattern::frame::ObservationFrame;
use crate::pattern::{ComparisonExpr, Junction, Leaf, ObservationExpr, ObservationOp};

impl BooleanTree for ObservationExpr {
    type Op = ObservationOp;

    fn as_compound(&self) -> Option<(ObservationOp, &[Self])> {
        match self {
            ObservationExpr::Compound { op, operands } => Some((*op, operands.as_slice())),
            _ => None,
        }
    }

    fn into_operands(self) -> Vec<Self> {
        match self {
            ObservationExpr::Compound { operands, .. } => operands,
            atom => vec![atom],
        }
    }

    fn compound(op: ObservationOp, operands: Vec<Self>) -> Self {
        ObservationExpr::Compound { op, operands }
    }

    fn junction(op: ObservationOp) -> Option<Junction> {
        op.junction()
    }

    fn op_for(junction: Junction) -> ObservationOp {
        junction.into()
    }

    fn distributes_over_or(op: ObservationOp) -> bool {
        matches!(op, ObservationOp::And | ObservationOp::FollowedBy)
    }

    /// Qualified nodes are rebuilt through [`ObservationExpr::qualify`], so a
    /// qualified compound that has collapsed to a leaf absorbs into it
    fn rewrite_compounds(
        &self,
        step: &mut dyn FnMut(ObservationOp, Vec<Self>) -> (Self, bool),
    ) -> (Self, bool) {
        self.collapse_frames(|frame| match frame {
            ObservationFrame::Leaf(leaf) => (ObservationExpr::Leaf(leaf.clone()), false),
            ObservationFrame::Compound(op, operands) => {
                let (operands, changed): (Vec<_>, Vec<bool>) = operands.into_iter().unzip();
                let (rewritten, stepped) = step(op, operands);
                (rewritten, stepped || changed.into_iter().any(|c| c))
            }
            ObservationFrame::Qualified(qualifiers, (inner, changed)) => {
                let (qualified, merged) = ObservationExpr::qualify(qualifiers.clone(), inner);
                (qualified, changed || merged)
            }
        })
    }
}

/// Runs a comparison pipeline over the comparison expression of every
/// observation, leaving the observation structure alone
pub struct CanonicalizeComparisons {
    comparisons: Box<dyn Transform<ComparisonExpr>>,
}

impl CanonicalizeComparisons {
    pub fn new(comparisons: impl Transform<ComparisonExpr> + 'static) -> Self {
        Self {
            comparisons: Box::new(comparisons),
        }
    }
}

impl Transform<ObservationExpr> for CanonicalizeComparisons {
    fn name(&self) -> &'static str {
        "canonicalize-comparisons"
    }

    fn transform(
        &self,
        logger: &Logger,
        expr: &ObservationExpr,
    ) -> Result<(ObservationExpr, bool), EquivalenceError> {
        expr.collapse_frames(|frame| -> Result<(ObservationExpr, bool), EquivalenceError> {
            match frame {
                ObservationFrame::Leaf(leaf) => {
                    let (comparison, changed) = self.comparisons.transform(logger, &leaf.comparison)?;
                    if changed {
                        debug!(logger, "canonicalized observation"; "before" => %leaf.comparison, "after" => %comparison);
                    }
                    let leaf = Leaf {
                        qualifiers: leaf.qualifiers.clone(),
                        comparison,
                    };
                    Ok((ObservationExpr::Leaf(leaf), changed))
                }
                ObservationFrame::Compound(op, operands) => {
                    let (operands, changed): (Vec<_>, Vec<bool>) =
                        operands.into_iter().collect::<Result<Vec<_>, _>>()?.into_iter().unzip();
                    Ok((
                        ObservationExpr::Compound { op, operands },
                        changed.into_iter().any(|c| c),
                    ))
                }
                ObservationFrame::Qualified(qualifiers, inner) => {
                    let (inner, changed) = inner?;
                    let qualified = ObservationExpr::Qualified {
                        qualifiers: qualifiers.clone(),
                        expr: Box::new(inner),
                    };
                    Ok((qualified, changed))
                }
            }
        })
    }
}
