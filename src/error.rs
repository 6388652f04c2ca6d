use miette::Diagnostic;
use thiserror::Error;

use crate::parser::ParseError;

/// Errors surfaced by the equivalence engine
#[derive(Debug, Clone, Diagnostic, Error)]
pub enum EquivalenceError {
    /// Malformed pattern text, passed through from the parser unchanged
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error("Unsupported STIX version: {version}")]
    #[diagnostic(
        code(stix_equiv::unsupported_version),
        help("Supported versions: 2.0, 2.1")
    )]
    UnsupportedVersion { version: String },

    /// A settled pass kept reporting changes past its iteration cap. This is
    /// an internal consistency failure, never a condition to retry.
    #[error("{pass} did not reach a fixed point within {limit} iterations")]
    #[diagnostic(code(stix_equiv::non_convergence))]
    NonConvergence { pass: &'static str, limit: usize },
}

impl EquivalenceError {
    pub fn is_parse_error(&self) -> bool {
        matches!(self, EquivalenceError::Parse(_))
    }
}
