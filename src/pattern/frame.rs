use recursion::{Collapsible, MappableFrame, PartiallyApplied};

use super::{ComparisonExpr, Junction, Leaf, ObservationExpr, ObservationOp, PropertyTest, QualifierSet};

/// short-lived single layer of an observation expression, used for
/// expressing bottom-up rewrites over a borrowed tree
pub enum ObservationFrame<'a, X> {
    Leaf(&'a Leaf),
    Compound(ObservationOp, Vec<X>),
    Qualified(&'a QualifierSet, X),
}

impl<'a> MappableFrame for ObservationFrame<'a, PartiallyApplied> {
    type Frame<X> = ObservationFrame<'a, X>;

    fn map_frame<A, B>(input: Self::Frame<A>, mut f: impl FnMut(A) -> B) -> Self::Frame<B> {
        use ObservationFrame::*;
        match input {
            Leaf(leaf) => Leaf(leaf),
            Compound(op, xs) => Compound(op, xs.into_iter().map(f).collect()),
            Qualified(qualifiers, x) => Qualified(qualifiers, f(x)),
        }
    }
}

impl<'a> Collapsible for &'a ObservationExpr {
    type FrameToken = ObservationFrame<'a, PartiallyApplied>;

    fn into_frame(self) -> ObservationFrame<'a, Self> {
        match self {
            ObservationExpr::Leaf(leaf) => ObservationFrame::Leaf(leaf),
            ObservationExpr::Compound { op, operands } => {
                ObservationFrame::Compound(*op, operands.iter().collect())
            }
            ObservationExpr::Qualified { qualifiers, expr } => {
                ObservationFrame::Qualified(qualifiers, expr.as_ref())
            }
        }
    }
}

/// single layer of a comparison expression
pub enum ComparisonFrame<'a, X> {
    Test(&'a PropertyTest),
    Compound(Junction, Vec<X>),
}

impl<'a> MappableFrame for ComparisonFrame<'a, PartiallyApplied> {
    type Frame<X> = ComparisonFrame<'a, X>;

    fn map_frame<A, B>(input: Self::Frame<A>, f: impl FnMut(A) -> B) -> Self::Frame<B> {
        match input {
            ComparisonFrame::Test(test) => ComparisonFrame::Test(test),
            ComparisonFrame::Compound(op, xs) => {
                ComparisonFrame::Compound(op, xs.into_iter().map(f).collect())
            }
        }
    }
}

impl<'a> Collapsible for &'a ComparisonExpr {
    type FrameToken = ComparisonFrame<'a, PartiallyApplied>;

    fn into_frame(self) -> ComparisonFrame<'a, Self> {
        match self {
            ComparisonExpr::Test(test) => ComparisonFrame::Test(test),
            ComparisonExpr::Compound { op, operands } => {
                ComparisonFrame::Compound(*op, operands.iter().collect())
            }
        }
    }
}
