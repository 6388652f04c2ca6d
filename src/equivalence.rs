//! Equivalence checks built on the canonicalization pipeline.
//!
//! Two patterns are equivalent when their canonical forms compare equal
//! under the structural order of the pattern tree.

use std::iter::FusedIterator;
use std::sync::OnceLock;

use slog::{debug, o, Logger};

use crate::error::EquivalenceError;
use crate::parser::parse_pattern;
use crate::pattern::ObservationExpr;
use crate::transform::{observation_pipeline, Chain, IterationLimit, Transform};
use crate::version::StixVersion;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalizerConfig {
    pub iteration_limit: IterationLimit,
}

/// The full canonicalization pipeline, built once and shared read-only
pub struct Canonicalizer {
    config: CanonicalizerConfig,
    pipeline: Chain<ObservationExpr>,
}

impl Canonicalizer {
    pub fn new(config: CanonicalizerConfig) -> Self {
        Self {
            config,
            pipeline: observation_pipeline(config.iteration_limit),
        }
    }

    /// Process-wide instance with the default configuration
    pub fn global() -> &'static Canonicalizer {
        static GLOBAL: OnceLock<Canonicalizer> = OnceLock::new();
        GLOBAL.get_or_init(|| Canonicalizer::new(CanonicalizerConfig::default()))
    }

    pub fn config(&self) -> &CanonicalizerConfig {
        &self.config
    }

    pub fn canonicalize(
        &self,
        logger: &Logger,
        expr: &ObservationExpr,
    ) -> Result<ObservationExpr, EquivalenceError> {
        self.transform(logger, expr).map(|(canonical, _)| canonical)
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new(CanonicalizerConfig::default())
    }
}

impl Transform<ObservationExpr> for Canonicalizer {
    fn name(&self) -> &'static str {
        "canonicalize"
    }

    fn transform(
        &self,
        logger: &Logger,
        expr: &ObservationExpr,
    ) -> Result<(ObservationExpr, bool), EquivalenceError> {
        self.pipeline.transform(logger, expr)
    }
}

/// Pattern text to canonical tree
pub trait CanonicalForm {
    fn canonical_form(&self, pattern: &str) -> Result<ObservationExpr, EquivalenceError>;
}

/// Equivalence checks for one STIX version against a shared canonicalizer
#[derive(Clone)]
pub struct PatternEquivalence<'c> {
    canonicalizer: &'c Canonicalizer,
    version: StixVersion,
    logger: Logger,
}

impl<'c> PatternEquivalence<'c> {
    pub fn new(canonicalizer: &'c Canonicalizer) -> Self {
        Self {
            canonicalizer,
            version: StixVersion::default(),
            logger: Logger::root(slog::Discard, o!()),
        }
    }

    pub fn with_version(mut self, version: StixVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn version(&self) -> StixVersion {
        self.version
    }

    pub fn equivalent(&self, a: &str, b: &str) -> Result<bool, EquivalenceError> {
        let a = self.canonical_form(a)?;
        let b = self.canonical_form(b)?;
        Ok(a.cmp(&b).is_eq())
    }

    /// Lazily filter `candidates` down to those equivalent to `search`.
    ///
    /// `search` is canonicalized once, up front, so a bad search pattern
    /// fails here before any candidate is pulled.
    pub fn find_equivalent<I>(
        &self,
        search: &str,
        candidates: I,
    ) -> Result<EquivalentPatterns<Self, I::IntoIter>, EquivalenceError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        EquivalentPatterns::new(self.clone(), search, candidates.into_iter())
    }
}

impl Default for PatternEquivalence<'static> {
    fn default() -> Self {
        Self::new(Canonicalizer::global())
    }
}

impl CanonicalForm for PatternEquivalence<'_> {
    fn canonical_form(&self, pattern: &str) -> Result<ObservationExpr, EquivalenceError> {
        let parsed = parse_pattern(pattern, self.version)?;
        let logger = self.logger.new(o!("version" => self.version.as_str()));
        let canonical = self.canonicalizer.canonicalize(&logger, &parsed)?;
        debug!(logger, "canonical form"; "pattern" => pattern, "canonical" => %canonical);
        Ok(canonical)
    }
}

/// Candidates equivalent to a reference pattern, in input order.
///
/// Single pass: candidates are pulled one at a time and canonicalized as
/// they come. A candidate that fails to parse or canonicalize is yielded as
/// an error once, after which the iterator is exhausted.
pub struct EquivalentPatterns<C, I> {
    form: C,
    reference: ObservationExpr,
    candidates: I,
    done: bool,
}

impl<C, I> EquivalentPatterns<C, I>
where
    C: CanonicalForm,
    I: Iterator,
    I::Item: AsRef<str>,
{
    pub fn new(form: C, search: &str, candidates: I) -> Result<Self, EquivalenceError> {
        let reference = form.canonical_form(search)?;
        Ok(Self {
            form,
            reference,
            candidates,
            done: false,
        })
    }

    /// Canonical form of the search pattern
    pub fn reference(&self) -> &ObservationExpr {
        &self.reference
    }
}

impl<C, I> Iterator for EquivalentPatterns<C, I>
where
    C: CanonicalForm,
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = Result<I::Item, EquivalenceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        for candidate in self.candidates.by_ref() {
            match self.form.canonical_form(candidate.as_ref()) {
                Ok(canonical) if canonical.cmp(&self.reference).is_eq() => {
                    return Some(Ok(candidate))
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        self.done = true;
        None
    }
}

impl<C, I> FusedIterator for EquivalentPatterns<C, I>
where
    C: CanonicalForm,
    I: Iterator,
    I::Item: AsRef<str>,
{
}
