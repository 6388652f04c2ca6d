//! STIX pattern syntax tree
//!
//! Two layers, mirroring the pattern language: observation expressions
//! combine bracketed observations with AND/OR/FOLLOWEDBY and temporal
//! qualifiers, and each bracketed observation holds a comparison expression
//! combining property tests with AND/OR.
//!
//! The derived `Ord` impls are the structural comparator used both to sort
//! operand lists and to decide equivalence of canonical trees, so variant and
//! field declaration order is significant throughout this module.

pub mod frame;
pub mod path;
pub mod value;

use std::fmt::{self, Display};

use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;
use recursion::CollapsibleExt;

pub use self::path::{ListIndex, ObjectPath, PathStep};
pub use self::value::{Number, Value};
use self::frame::{ComparisonFrame, ObservationFrame};

/// Operators obeying the boolean laws (commutative, idempotent, absorptive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Junction {
    And,
    Or,
}

impl Junction {
    pub fn dual(self) -> Self {
        match self {
            Junction::And => Junction::Or,
            Junction::Or => Junction::And,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Junction::And => "AND",
            Junction::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObservationOp {
    And,
    Or,
    /// Ordered: `a FOLLOWEDBY b` differs from `b FOLLOWEDBY a`
    FollowedBy,
}

impl ObservationOp {
    /// The boolean junction this operator behaves as, if any
    pub fn junction(self) -> Option<Junction> {
        match self {
            ObservationOp::And => Some(Junction::And),
            ObservationOp::Or => Some(Junction::Or),
            ObservationOp::FollowedBy => None,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            ObservationOp::And => "AND",
            ObservationOp::Or => "OR",
            ObservationOp::FollowedBy => "FOLLOWEDBY",
        }
    }
}

impl From<Junction> for ObservationOp {
    fn from(j: Junction) -> Self {
        match j {
            Junction::And => ObservationOp::And,
            Junction::Or => ObservationOp::Or,
        }
    }
}

/// Temporal qualifier. Variant order is the qualifier kind order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Qualifier {
    Within(Number),
    Repeats(u64),
    StartStop {
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QualifierKind {
    Within,
    Repeats,
    StartStop,
}

impl QualifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualifierKind::Within => "WITHIN",
            QualifierKind::Repeats => "REPEATS",
            QualifierKind::StartStop => "START/STOP",
        }
    }
}

impl Qualifier {
    pub fn kind(&self) -> QualifierKind {
        match self {
            Qualifier::Within(_) => QualifierKind::Within,
            Qualifier::Repeats(_) => QualifierKind::Repeats,
            Qualifier::StartStop { .. } => QualifierKind::StartStop,
        }
    }
}

/// Qualifiers attached to one observation, kept sorted by kind with at most
/// one qualifier per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifierSet(Vec<Qualifier>);

impl QualifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a qualifier, handing back the one already present if its kind is
    /// taken
    pub fn insert(&mut self, qualifier: Qualifier) -> Result<(), &Qualifier> {
        match self
            .0
            .binary_search_by(|q| q.kind().cmp(&qualifier.kind()))
        {
            Ok(existing) => Err(&self.0[existing]),
            Err(slot) => {
                self.0.insert(slot, qualifier);
                Ok(())
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Qualifier> {
        self.0.iter()
    }

    pub fn contains_kind(&self, kind: QualifierKind) -> bool {
        self.0.iter().any(|q| q.kind() == kind)
    }

    /// Whether no qualifier kind appears in both sets
    pub fn is_disjoint(&self, other: &QualifierSet) -> bool {
        other.iter().all(|q| !self.contains_kind(q.kind()))
    }

    /// Union of two disjoint sets; `None` if a kind appears in both
    pub fn merged(&self, other: &QualifierSet) -> Option<QualifierSet> {
        let mut merged = self.clone();
        for q in other.iter() {
            merged.insert(q.clone()).ok()?;
        }
        Some(merged)
    }
}

impl From<Qualifier> for QualifierSet {
    fn from(qualifier: Qualifier) -> Self {
        QualifierSet(vec![qualifier])
    }
}

impl TryFrom<Vec<Qualifier>> for QualifierSet {
    /// The first qualifier whose kind was already taken
    type Error = Qualifier;

    fn try_from(qualifiers: Vec<Qualifier>) -> Result<Self, Self::Error> {
        let mut set = QualifierSet::new();
        for q in qualifiers {
            if set.insert(q.clone()).is_err() {
                return Err(q);
            }
        }
        Ok(set)
    }
}

/// A single bracketed observation with its qualifiers. Qualifiers are
/// declared first so that they are compared first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Leaf {
    pub qualifiers: QualifierSet,
    pub comparison: ComparisonExpr,
}

/// Observation-layer expression
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObservationExpr {
    Leaf(Leaf),
    Compound {
        op: ObservationOp,
        operands: Vec<ObservationExpr>,
    },
    /// Qualifiers on a compound; qualifiers on a single observation live on
    /// its `Leaf`
    Qualified {
        qualifiers: QualifierSet,
        expr: Box<ObservationExpr>,
    },
}

impl ObservationExpr {
    pub fn leaf(comparison: ComparisonExpr) -> Self {
        ObservationExpr::Leaf(Leaf {
            qualifiers: QualifierSet::new(),
            comparison,
        })
    }

    pub fn compound(op: ObservationOp, operands: Vec<Self>) -> Self {
        ObservationExpr::Compound { op, operands }
    }

    pub fn and(a: Self, b: Self) -> Self {
        Self::compound(ObservationOp::And, vec![a, b])
    }

    pub fn or(a: Self, b: Self) -> Self {
        Self::compound(ObservationOp::Or, vec![a, b])
    }

    /// Attach qualifiers to an expression, merging them into a leaf or an
    /// existing qualified node when no kind clashes. Returns whether a merge
    /// happened.
    pub fn qualify(qualifiers: QualifierSet, expr: ObservationExpr) -> (Self, bool) {
        if qualifiers.is_empty() {
            return (expr, true);
        }
        match expr {
            ObservationExpr::Leaf(leaf) if leaf.qualifiers.is_disjoint(&qualifiers) => {
                let merged = leaf.qualifiers.merged(&qualifiers).unwrap_or_default();
                let leaf = Leaf {
                    qualifiers: merged,
                    comparison: leaf.comparison,
                };
                (ObservationExpr::Leaf(leaf), true)
            }
            ObservationExpr::Qualified {
                qualifiers: inner,
                expr,
            } if inner.is_disjoint(&qualifiers) => {
                let merged = inner.merged(&qualifiers).unwrap_or_default();
                (
                    ObservationExpr::Qualified {
                        qualifiers: merged,
                        expr,
                    },
                    true,
                )
            }
            expr => (
                ObservationExpr::Qualified {
                    qualifiers,
                    expr: Box::new(expr),
                },
                false,
            ),
        }
    }

    /// Number of nodes, comparison trees included
    pub fn node_count(&self) -> usize {
        self.collapse_frames(|frame| match frame {
            ObservationFrame::Leaf(leaf) => 1 + leaf.comparison.node_count(),
            ObservationFrame::Compound(_, counts) => 1 + counts.into_iter().sum::<usize>(),
            ObservationFrame::Qualified(_, count) => 1 + count,
        })
    }

    /// Whether the tree is a top-level OR of clauses with no OR below an
    /// AND/FOLLOWEDBY, looking through qualified nodes
    pub fn is_dnf(&self) -> bool {
        fn no_or(e: &ObservationExpr) -> bool {
            match e {
                ObservationExpr::Leaf(_) => true,
                ObservationExpr::Compound { op, operands } => {
                    *op != ObservationOp::Or && operands.iter().all(no_or)
                }
                ObservationExpr::Qualified { expr, .. } => expr.is_dnf(),
            }
        }
        match self {
            ObservationExpr::Compound {
                op: ObservationOp::Or,
                operands,
            } => operands.iter().all(no_or),
            other => no_or(other),
        }
    }
}

/// A single property test: `path [NOT] operator value`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyTest {
    pub path: ObjectPath,
    pub operator: ComparisonOp,
    /// Absent only for `EXISTS`
    pub value: Option<Value>,
    pub negated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    Ge,
    Le,
    In,
    Like,
    Matches,
    IsSubset,
    IsSuperset,
    Exists,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "!=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Lt => "<",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Le => "<=",
            ComparisonOp::In => "IN",
            ComparisonOp::Like => "LIKE",
            ComparisonOp::Matches => "MATCHES",
            ComparisonOp::IsSubset => "ISSUBSET",
            ComparisonOp::IsSuperset => "ISSUPERSET",
            ComparisonOp::Exists => "EXISTS",
        }
    }
}

/// Comparison-layer expression, the content of one `[...]`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComparisonExpr {
    Test(PropertyTest),
    Compound {
        op: Junction,
        operands: Vec<ComparisonExpr>,
    },
}

impl ComparisonExpr {
    pub fn test(path: ObjectPath, operator: ComparisonOp, value: Value) -> Self {
        ComparisonExpr::Test(PropertyTest {
            path,
            operator,
            value: Some(value),
            negated: false,
        })
    }

    pub fn compound(op: Junction, operands: Vec<Self>) -> Self {
        ComparisonExpr::Compound { op, operands }
    }

    pub fn and(a: Self, b: Self) -> Self {
        Self::compound(Junction::And, vec![a, b])
    }

    pub fn or(a: Self, b: Self) -> Self {
        Self::compound(Junction::Or, vec![a, b])
    }

    pub fn node_count(&self) -> usize {
        self.collapse_frames(|frame| match frame {
            ComparisonFrame::Test(_) => 1,
            ComparisonFrame::Compound(_, counts) => 1 + counts.into_iter().sum::<usize>(),
        })
    }
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qualifier::Within(seconds) => write!(f, "WITHIN {} SECONDS", seconds),
            Qualifier::Repeats(times) => write!(f, "REPEATS {} TIMES", times),
            Qualifier::StartStop { start, stop } => write!(
                f,
                "START t'{}' STOP t'{}'",
                start.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                stop.to_rfc3339_opts(SecondsFormat::AutoSi, true)
            ),
        }
    }
}

impl Display for QualifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for q in self.iter() {
            write!(f, " {}", q)?;
        }
        Ok(())
    }
}

impl Display for PropertyTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let not = if self.negated { "NOT " } else { "" };
        match &self.value {
            None => write!(f, "{}{} {}", not, self.operator.as_str(), self.path),
            Some(value) => write!(
                f,
                "{} {}{} {}",
                self.path,
                not,
                self.operator.as_str(),
                value
            ),
        }
    }
}

impl Display for ComparisonExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonExpr::Test(test) => write!(f, "{}", test),
            ComparisonExpr::Compound { op, operands } => {
                let sep = format!(" {} ", op.keyword());
                let rendered = operands
                    .iter()
                    .map(|e| match e {
                        ComparisonExpr::Compound { .. } => format!("({})", e),
                        ComparisonExpr::Test(_) => e.to_string(),
                    })
                    .join(&sep);
                f.write_str(&rendered)
            }
        }
    }
}

impl Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]{}", self.comparison, self.qualifiers)
    }
}

impl Display for ObservationExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationExpr::Leaf(leaf) => write!(f, "{}", leaf),
            ObservationExpr::Compound { op, operands } => {
                let sep = format!(" {} ", op.keyword());
                let rendered = operands
                    .iter()
                    .map(|e| match e {
                        ObservationExpr::Compound { .. } => format!("({})", e),
                        _ => e.to_string(),
                    })
                    .join(&sep);
                f.write_str(&rendered)
            }
            ObservationExpr::Qualified { qualifiers, expr } => {
                write!(f, "({}){}", expr, qualifiers)
            }
        }
    }
}
