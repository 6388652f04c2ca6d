use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use super::raw::Rule;

/// Pattern parse failures, using miette for diagnostics
#[allow(dead_code)] // Fields are used by miette's derive macros
#[derive(Debug, Clone, Diagnostic, Error)]
pub enum ParseError {
    // Syntax errors from pest
    #[error("Syntax error at line {line}, column {col}")]
    #[diagnostic(code(stix_equiv::syntax))]
    Syntax {
        #[source_code]
        src: String,
        #[label("{expected_msg}")]
        span: SourceSpan,
        #[help]
        help: Option<String>,
        expected_msg: String,
        line: usize,
        col: usize,
    },

    #[error("Invalid {kind} literal: {found}")]
    #[diagnostic(code(stix_equiv::invalid_literal))]
    InvalidLiteral {
        kind: &'static str,
        found: String,
        #[label("{reason}")]
        span: SourceSpan,
        reason: String,
        #[source_code]
        src: String,
    },

    #[error("Operator '{operator}' expects {expected}, found {found}")]
    #[diagnostic(
        code(stix_equiv::invalid_operand),
        help("IN takes a set; LIKE, MATCHES, ISSUBSET and ISSUPERSET take strings")
    )]
    InvalidOperand {
        operator: &'static str,
        expected: &'static str,
        found: &'static str,
        #[label("invalid operand")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("{construct} is not valid in STIX {version}")]
    #[diagnostic(code(stix_equiv::version_mismatch))]
    VersionMismatch {
        construct: String,
        version: &'static str,
        #[label("not allowed here")]
        span: SourceSpan,
        #[help]
        help: Option<String>,
        #[source_code]
        src: String,
    },

    // Internal errors
    #[error("Internal parser error: {message}")]
    #[diagnostic(code(stix_equiv::internal))]
    Internal {
        message: String,
        #[source_code]
        src: String,
    },
}

// Extension trait for span location extraction
pub trait SpanExt {
    fn to_source_span(&self) -> SourceSpan;
}

impl SpanExt for pest::Span<'_> {
    #[inline]
    fn to_source_span(&self) -> SourceSpan {
        (self.start(), self.end() - self.start()).into()
    }
}

/// Convert pest Rule enum to user-friendly names
fn rule_to_friendly_name(rule: &Rule) -> &'static str {
    match rule {
        Rule::pattern => "pattern",
        Rule::observation_expressions | Rule::observation => "observation expression",
        Rule::bracketed => "'[' comparison ']'",
        Rule::followed_by => "FOLLOWEDBY",
        Rule::or_op => "OR",
        Rule::and_op => "AND",
        Rule::negation => "NOT",
        Rule::exists_kw => "EXISTS",
        Rule::within_qualifier => "WITHIN qualifier",
        Rule::repeats_qualifier => "REPEATS qualifier",
        Rule::start_stop_qualifier => "START/STOP qualifier",
        Rule::comparison_expression => "comparison expression",
        Rule::exists_test | Rule::value_test => "property comparison",
        Rule::neq
        | Rule::le
        | Rule::ge
        | Rule::lt
        | Rule::gt
        | Rule::eq
        | Rule::in_op
        | Rule::like
        | Rule::matches
        | Rule::issubset
        | Rule::issuperset => "comparison operator",
        Rule::object_path => "object path (type:property)",
        Rule::object_type => "object type",
        Rule::first_property | Rule::property | Rule::quoted_property => "property name",
        Rule::any_index | Rule::list_index => "list index",
        Rule::set_literal => "set literal",
        Rule::string_literal | Rule::string_inner => "string literal",
        Rule::timestamp_literal | Rule::timestamp_inner => "timestamp literal",
        Rule::hex_literal | Rule::hex_inner => "hex literal",
        Rule::binary_literal | Rule::binary_inner => "binary literal",
        Rule::bool_literal => "boolean",
        Rule::float_literal | Rule::int_literal => "number",
        Rule::EOI => "end of input",
        _ => "token",
    }
}

/// Generate contextual help text based on error patterns
fn generate_help_text(positives: &[Rule], found_eoi: bool) -> Option<String> {
    if positives.is_empty() {
        return None;
    }

    if positives.contains(&Rule::object_path) || positives.contains(&Rule::value_test) {
        return Some("Comparisons look like: [file:name = 'foo.exe']".to_string());
    }

    if positives.iter().any(|r| {
        matches!(
            r,
            Rule::string_literal | Rule::int_literal | Rule::set_literal | Rule::bool_literal
        )
    }) {
        return Some("Expected a literal here (e.g. 'text', 42, t'2020-01-01T00:00:00Z', or ('a', 'b'))".to_string());
    }

    if positives.contains(&Rule::bracketed) && found_eoi {
        return Some("Pattern is incomplete. Add an observation after the operator.".to_string());
    }

    if positives.contains(&Rule::EOI) {
        return Some("Unexpected input. Check for unbalanced brackets or quotes.".to_string());
    }

    None
}

impl ParseError {
    /// Create a syntax error from pest error with diagnostic information
    pub fn from_pest(pest_err: Box<pest::error::Error<Rule>>, src: String) -> Self {
        use pest::error::{ErrorVariant, InputLocation};

        // non-zero width so miette has something to point at
        let span: SourceSpan = match pest_err.location {
            InputLocation::Pos(pos) => {
                if pos >= src.len() && pos > 0 {
                    (pos - 1, 1).into()
                } else if pos < src.len() {
                    (pos, 1).into()
                } else {
                    (0, 0).into()
                }
            }
            InputLocation::Span((start, end)) => (start, end.saturating_sub(start).max(1)).into(),
        };

        let (line, col) = match pest_err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => (line, col),
            pest::error::LineColLocation::Span((line, col), _) => (line, col),
        };

        let (expected_msg, help) = match &pest_err.variant {
            ErrorVariant::ParsingError {
                positives,
                negatives: _,
            } => {
                let found_eoi = match pest_err.location {
                    InputLocation::Pos(p) => p >= src.len(),
                    InputLocation::Span((_, end)) => end >= src.len(),
                };

                let mut names: Vec<&str> = positives.iter().map(rule_to_friendly_name).collect();
                names.dedup();
                let expected_msg = match names.len() {
                    0 => "Unexpected input".to_string(),
                    1 => format!("Expected {}", names[0]),
                    2 | 3 => format!("Expected one of: {}", names.join(", ")),
                    _ => format!("Expected one of: {}, ...", names[..3].join(", ")),
                };

                (expected_msg, generate_help_text(positives, found_eoi))
            }
            ErrorVariant::CustomError { message } => (message.clone(), None),
        };

        ParseError::Syntax {
            src,
            span,
            help,
            expected_msg,
            line,
            col,
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        ParseError::Internal {
            message: msg.into(),
            src: String::new(),
        }
    }

    /// Add source code to the error
    pub fn with_source(mut self, src: String) -> Self {
        match &mut self {
            ParseError::Syntax { src: s, .. }
            | ParseError::InvalidLiteral { src: s, .. }
            | ParseError::InvalidOperand { src: s, .. }
            | ParseError::VersionMismatch { src: s, .. }
            | ParseError::Internal { src: s, .. } => {
                *s = src;
            }
        }
        self
    }
}
