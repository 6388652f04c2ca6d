use chrono::{DateTime, Utc};
use pest::{
    iterators::{Pair, Pairs},
    pratt_parser::{Assoc::*, Op, PrattParser},
    Parser,
};
use pest_derive::Parser;

use super::error::{ParseError, SpanExt};
use crate::pattern::{
    ComparisonExpr, ComparisonOp, Junction, ListIndex, Number, ObjectPath, ObservationExpr,
    ObservationOp, PathStep, PropertyTest, Qualifier, QualifierSet, Value,
};
use crate::version::StixVersion;

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
pub struct PatternParser;

// Extension trait for better error handling with iterators
trait ParseIterExt<'i> {
    fn expect_next(&mut self, context: &'static str) -> Result<Pair<'i, Rule>, ParseError>;
}

impl<'i> ParseIterExt<'i> for Pairs<'i, Rule> {
    fn expect_next(&mut self, context: &'static str) -> Result<Pair<'i, Rule>, ParseError> {
        self.next()
            .ok_or_else(|| ParseError::internal(format!("Grammar guarantees {}", context)))
    }
}

impl PatternParser {
    /// Parse pattern text into an observation expression tree
    pub fn parse_pattern(input: &str, version: StixVersion) -> Result<ObservationExpr, ParseError> {
        let mut pairs = Self::parse(Rule::pattern, input)
            .map_err(|e| ParseError::from_pest(Box::new(e), input.to_string()))?;

        let builder = Builder {
            src: input,
            version,
        };

        pairs
            .expect_next("program exists")
            .and_then(|pattern| pattern.into_inner().expect_next("pattern contains expression"))
            .and_then(|expressions| builder.observation_expressions(expressions))
            .map_err(|e| e.with_source(input.to_string()))
    }
}

/// Turns pest pairs into the pattern tree, validating what the grammar can't
struct Builder<'s> {
    src: &'s str,
    version: StixVersion,
}

impl<'s> Builder<'s> {
    fn observation_expressions(&self, pair: Pair<'_, Rule>) -> Result<ObservationExpr, ParseError> {
        let pratt = PrattParser::new()
            .op(Op::infix(Rule::followed_by, Left))
            .op(Op::infix(Rule::or_op, Left))
            .op(Op::infix(Rule::and_op, Left));

        pratt
            .map_primary(|primary| self.observation(primary))
            .map_infix(|lhs, op, rhs| {
                let op = match op.as_rule() {
                    Rule::followed_by => ObservationOp::FollowedBy,
                    Rule::or_op => ObservationOp::Or,
                    Rule::and_op => ObservationOp::And,
                    rule => {
                        return Err(ParseError::internal(format!(
                            "Unexpected infix rule: {:?}",
                            rule
                        )))
                    }
                };
                Ok(ObservationExpr::compound(op, vec![lhs?, rhs?]))
            })
            .parse(pair.into_inner())
    }

    fn observation(&self, pair: Pair<'_, Rule>) -> Result<ObservationExpr, ParseError> {
        let mut inner = pair.into_inner();
        let primary = inner.expect_next("observation has a primary")?;

        let expr = match primary.as_rule() {
            Rule::bracketed => {
                let comparison = primary
                    .into_inner()
                    .expect_next("brackets contain a comparison")?;
                ObservationExpr::leaf(self.comparison_expression(comparison)?)
            }
            Rule::observation_expressions => self.observation_expressions(primary)?,
            rule => {
                return Err(ParseError::internal(format!(
                    "Unexpected primary rule: {:?}",
                    rule
                )))
            }
        };

        // qualifiers apply left to right; one whose kind is already taken
        // wraps everything before it
        inner.try_fold(expr, |expr, qualifier_pair| {
            let qualifier = self.qualifier(qualifier_pair)?;
            Ok(ObservationExpr::qualify(QualifierSet::from(qualifier), expr).0)
        })
    }

    fn qualifier(&self, pair: Pair<'_, Rule>) -> Result<Qualifier, ParseError> {
        let rule = pair.as_rule();
        let mut inner = pair.into_inner();
        match rule {
            Rule::within_qualifier => {
                let seconds_pair = inner.expect_next("WITHIN has a duration")?;
                let span = seconds_pair.as_span();
                let seconds = self.number(seconds_pair)?;
                let positive = match seconds {
                    Number::Int(i) => i > 0,
                    Number::Float(f) => f > 0.0,
                };
                if !positive {
                    return Err(self.invalid_literal("duration", span, "must be positive"));
                }
                Ok(Qualifier::Within(seconds))
            }
            Rule::repeats_qualifier => {
                let count_pair = inner.expect_next("REPEATS has a count")?;
                let span = count_pair.as_span();
                match count_pair.as_str().parse::<u64>() {
                    Ok(count) if count > 0 => Ok(Qualifier::Repeats(count)),
                    _ => Err(self.invalid_literal("repeat count", span, "must be a positive integer")),
                }
            }
            Rule::start_stop_qualifier => {
                let start = self.qualifier_time(inner.expect_next("START has a time")?)?;
                let stop = self.qualifier_time(inner.expect_next("STOP has a time")?)?;
                Ok(Qualifier::StartStop { start, stop })
            }
            rule => Err(ParseError::internal(format!(
                "Unexpected qualifier rule: {:?}",
                rule
            ))),
        }
    }

    /// START/STOP take plain strings in 2.0 and timestamp literals in 2.1
    fn qualifier_time(&self, pair: Pair<'_, Rule>) -> Result<DateTime<Utc>, ParseError> {
        let span = pair.as_span();
        let wanted = match self.version {
            StixVersion::V2_0 => Rule::string_literal,
            StixVersion::V2_1 => Rule::timestamp_literal,
        };
        if pair.as_rule() != wanted {
            let help = match self.version {
                StixVersion::V2_0 => "STIX 2.0 START/STOP take string literals, e.g. '2016-01-01T00:00:00Z'",
                StixVersion::V2_1 => "STIX 2.1 START/STOP take timestamp literals, e.g. t'2016-01-01T00:00:00Z'",
            };
            return Err(ParseError::VersionMismatch {
                construct: format!("START/STOP time {}", pair.as_str()),
                version: self.version.as_str(),
                span: span.to_source_span(),
                help: Some(help.to_string()),
                src: self.src.to_string(),
            });
        }

        let text = pair.into_inner().expect_next("quoted literal has content")?;
        self.timestamp(text.as_str(), span)
    }

    fn comparison_expression(&self, pair: Pair<'_, Rule>) -> Result<ComparisonExpr, ParseError> {
        let pratt = PrattParser::new()
            .op(Op::infix(Rule::or_op, Left))
            .op(Op::infix(Rule::and_op, Left));

        pratt
            .map_primary(|primary| match primary.as_rule() {
                Rule::exists_test => self.exists_test(primary),
                Rule::value_test => self.value_test(primary),
                Rule::comparison_expression => self.comparison_expression(primary),
                rule => Err(ParseError::internal(format!(
                    "Unexpected comparison rule: {:?}",
                    rule
                ))),
            })
            .map_infix(|lhs, op, rhs| {
                let op = match op.as_rule() {
                    Rule::or_op => Junction::Or,
                    Rule::and_op => Junction::And,
                    rule => {
                        return Err(ParseError::internal(format!(
                            "Unexpected infix rule: {:?}",
                            rule
                        )))
                    }
                };
                Ok(ComparisonExpr::compound(op, vec![lhs?, rhs?]))
            })
            .parse(pair.into_inner())
    }

    fn exists_test(&self, pair: Pair<'_, Rule>) -> Result<ComparisonExpr, ParseError> {
        let mut negated = false;
        let mut path = None;
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::negation => negated = true,
                Rule::object_path => path = Some(self.object_path(part)?),
                _ => {}
            }
        }
        let path = path.ok_or_else(|| ParseError::internal("Grammar guarantees EXISTS has a path"))?;

        Ok(ComparisonExpr::Test(PropertyTest {
            path,
            operator: ComparisonOp::Exists,
            value: None,
            negated,
        }))
    }

    fn value_test(&self, pair: Pair<'_, Rule>) -> Result<ComparisonExpr, ParseError> {
        let mut inner = pair.into_inner();
        let path = self.object_path(inner.expect_next("comparison has a path")?)?;

        let mut operator_pair = inner.expect_next("comparison has an operator")?;
        let negated = operator_pair.as_rule() == Rule::negation;
        if negated {
            operator_pair = inner.expect_next("NOT is followed by an operator")?;
        }
        let operator = match operator_pair.as_rule() {
            Rule::eq => ComparisonOp::Eq,
            Rule::neq => ComparisonOp::NotEq,
            Rule::gt => ComparisonOp::Gt,
            Rule::lt => ComparisonOp::Lt,
            Rule::ge => ComparisonOp::Ge,
            Rule::le => ComparisonOp::Le,
            Rule::in_op => ComparisonOp::In,
            Rule::like => ComparisonOp::Like,
            Rule::matches => ComparisonOp::Matches,
            Rule::issubset => ComparisonOp::IsSubset,
            Rule::issuperset => ComparisonOp::IsSuperset,
            rule => {
                return Err(ParseError::internal(format!(
                    "Unexpected operator rule: {:?}",
                    rule
                )))
            }
        };

        let value_pair = inner.expect_next("comparison has a value")?;
        let value_span = value_pair.as_span();
        let value = self.literal(value_pair)?;
        self.check_operand(operator, &value, value_span)?;

        Ok(ComparisonExpr::Test(PropertyTest {
            path,
            operator,
            value: Some(value),
            negated,
        }))
    }

    fn check_operand(
        &self,
        operator: ComparisonOp,
        value: &Value,
        span: pest::Span<'_>,
    ) -> Result<(), ParseError> {
        let expected = match operator {
            ComparisonOp::In if !matches!(value, Value::Set(_)) => Some("a set"),
            ComparisonOp::Like
            | ComparisonOp::Matches
            | ComparisonOp::IsSubset
            | ComparisonOp::IsSuperset
                if !matches!(value, Value::String(_)) =>
            {
                Some("a string")
            }
            ComparisonOp::Gt | ComparisonOp::Lt | ComparisonOp::Ge | ComparisonOp::Le
                if !value.is_orderable() =>
            {
                Some("an orderable literal")
            }
            ComparisonOp::Eq | ComparisonOp::NotEq if matches!(value, Value::Set(_)) => {
                Some("a single literal")
            }
            _ => None,
        };

        match expected {
            None => Ok(()),
            Some(expected) => Err(ParseError::InvalidOperand {
                operator: operator.as_str(),
                expected,
                found: value.type_name(),
                span: span.to_source_span(),
                src: self.src.to_string(),
            }),
        }
    }

    fn object_path(&self, pair: Pair<'_, Rule>) -> Result<ObjectPath, ParseError> {
        let mut inner = pair.into_inner();
        let object_type = inner.expect_next("path has an object type")?.as_str().to_string();

        let mut steps = Vec::new();
        for step in inner {
            steps.push(match step.as_rule() {
                Rule::first_property | Rule::property => PathStep::Property(step.as_str().to_string()),
                Rule::quoted_property => {
                    let span = step.as_span();
                    let text = step.into_inner().expect_next("quoted property has content")?;
                    PathStep::Property(self.unescape(text.as_str(), span)?)
                }
                Rule::any_index => PathStep::Index(ListIndex::Any),
                Rule::list_index => {
                    let span = step.as_span();
                    let index = step
                        .as_str()
                        .parse::<i64>()
                        .map_err(|e| self.invalid_literal("list index", span, &e.to_string()))?;
                    PathStep::Index(ListIndex::At(index))
                }
                rule => {
                    return Err(ParseError::internal(format!(
                        "Unexpected path rule: {:?}",
                        rule
                    )))
                }
            });
        }

        Ok(ObjectPath { object_type, steps })
    }

    fn literal(&self, pair: Pair<'_, Rule>) -> Result<Value, ParseError> {
        let span = pair.as_span();
        match pair.as_rule() {
            Rule::set_literal => pair
                .into_inner()
                .map(|item| self.literal(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Set),
            Rule::string_literal => {
                let text = pair.into_inner().expect_next("string has content")?;
                Ok(Value::String(self.unescape(text.as_str(), span)?))
            }
            Rule::timestamp_literal => {
                let text = pair.into_inner().expect_next("timestamp has content")?;
                Ok(Value::Timestamp(self.timestamp(text.as_str(), span)?))
            }
            Rule::hex_literal => {
                let digits = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                Ok(Value::Hex(digits.to_ascii_lowercase()))
            }
            Rule::binary_literal => {
                let text = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                if text.len() % 4 != 0 {
                    return Err(self.invalid_literal("binary", span, "base64 length must be a multiple of 4"));
                }
                Ok(Value::Binary(clear_padding_bits(text)))
            }
            Rule::bool_literal => Ok(Value::Bool(pair.as_str().eq_ignore_ascii_case("true"))),
            Rule::int_literal | Rule::float_literal => self.number(pair).map(Value::Number),
            rule => Err(ParseError::internal(format!(
                "Unexpected literal rule: {:?}",
                rule
            ))),
        }
    }

    fn number(&self, pair: Pair<'_, Rule>) -> Result<Number, ParseError> {
        let span = pair.as_span();
        let text = pair.as_str();
        match pair.as_rule() {
            Rule::int_literal => text
                .parse::<i64>()
                .map(Number::Int)
                .map_err(|e| self.invalid_literal("integer", span, &e.to_string())),
            Rule::float_literal => match text.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Number::Float(f)),
                Ok(_) => Err(self.invalid_literal("float", span, "out of range")),
                Err(e) => Err(self.invalid_literal("float", span, &e.to_string())),
            },
            rule => Err(ParseError::internal(format!(
                "Unexpected number rule: {:?}",
                rule
            ))),
        }
    }

    fn timestamp(&self, text: &str, span: pest::Span<'_>) -> Result<DateTime<Utc>, ParseError> {
        DateTime::parse_from_rfc3339(text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| self.invalid_literal("timestamp", span, &e.to_string()))
    }

    /// Resolve `\'` and `\\`, the only escapes STIX strings allow
    fn unescape(&self, text: &str, span: pest::Span<'_>) -> Result<String, ParseError> {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some(escaped @ ('\'' | '\\')) => out.push(escaped),
                Some(other) => {
                    return Err(self.invalid_literal(
                        "string",
                        span,
                        &format!("invalid escape sequence '\\{}'", other),
                    ))
                }
                None => return Err(self.invalid_literal("string", span, "unterminated escape")),
            }
        }
        Ok(out)
    }

    fn invalid_literal(&self, kind: &'static str, span: pest::Span<'_>, reason: &str) -> ParseError {
        ParseError::InvalidLiteral {
            kind,
            found: span.as_str().to_string(),
            span: span.to_source_span(),
            reason: reason.to_string(),
            src: self.src.to_string(),
        }
    }
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Zero the bits of the last base64 digit that padding leaves unused, so
/// that texts decoding to the same bytes are spelled the same
fn clear_padding_bits(text: &str) -> String {
    let unused_mask = match text.bytes().rev().take_while(|&b| b == b'=').count() {
        1 => 0b11,
        2 => 0b1111,
        _ => return text.to_string(),
    };
    let digits = text.trim_end_matches('=');
    let padding = &text[digits.len()..];
    let Some(last) = digits.bytes().last() else {
        return text.to_string();
    };
    let Some(index) = BASE64_ALPHABET.iter().position(|&b| b == last) else {
        return text.to_string();
    };
    let cleared = BASE64_ALPHABET[index & !unused_mask] as char;
    format!("{}{}{}", &digits[..digits.len() - 1], cleared, padding)
}
