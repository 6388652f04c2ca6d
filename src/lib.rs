//! Semantic equivalence of STIX 2.x patterns.
//!
//! Patterns are parsed, reduced to a canonical form by a fixed pipeline of
//! tree rewrites (comparison canonicalization, flattening, ordering and
//! deduplication, absorption, DNF expansion), and compared structurally.
//!
//! ```
//! use stix_equiv::{equivalent_patterns, StixVersion};
//!
//! let same = equivalent_patterns(
//!     "[ipv4-addr:value = '1.2.3.4/32'] OR [domain-name:value = 'example.com']",
//!     "[domain-name:value = 'example.com'] OR [ipv4-addr:value = '1.2.3.4']",
//!     StixVersion::V2_1,
//! )
//! .unwrap();
//! assert!(same);
//! ```

pub mod equivalence;
pub mod error;
pub mod parser;
pub mod pattern;
pub mod transform;
pub mod version;

pub use equivalence::{
    CanonicalForm, Canonicalizer, CanonicalizerConfig, EquivalentPatterns, PatternEquivalence,
};
pub use error::EquivalenceError;
pub use parser::{parse_pattern, ParseError};
pub use pattern::{ComparisonExpr, ObservationExpr};
pub use transform::IterationLimit;
pub use version::{StixVersion, DEFAULT_VERSION};

/// Whether two patterns are semantically equivalent
pub fn equivalent_patterns(
    pattern1: &str,
    pattern2: &str,
    version: StixVersion,
) -> Result<bool, EquivalenceError> {
    PatternEquivalence::default()
        .with_version(version)
        .equivalent(pattern1, pattern2)
}

/// Lazily yield the candidates equivalent to `search`, in order.
///
/// The search pattern is canonicalized once, before this returns.
pub fn find_equivalent_patterns<I>(
    search: &str,
    candidates: I,
    version: StixVersion,
) -> Result<EquivalentPatterns<PatternEquivalence<'static>, I::IntoIter>, EquivalenceError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    PatternEquivalence::default()
        .with_version(version)
        .find_equivalent(search, candidates)
}
