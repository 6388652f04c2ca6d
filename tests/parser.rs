use stix_equiv::parser::{parse_pattern, ParseError};
use stix_equiv::pattern::{ComparisonExpr, ComparisonOp, Number, ObservationExpr, Qualifier, Value};
use stix_equiv::StixVersion;

fn parse_21(s: &str) -> Result<ObservationExpr, ParseError> {
    parse_pattern(s, StixVersion::V2_1)
}

fn single_value(s: &str) -> Value {
    match parse_21(s).unwrap() {
        ObservationExpr::Leaf(leaf) => match leaf.comparison {
            ComparisonExpr::Test(test) => test.value.expect("value test"),
            other => panic!("expected a single test, got {}", other),
        },
        other => panic!("expected a leaf, got {}", other),
    }
}

// ==============================================================================
// Syntax errors

#[test]
fn test_syntax_errors() {
    for input in [
        "",
        "[",
        "[a:b = 1",
        "a:b = 1",
        "[a:b = 1] AND",
        "[a:b = 1] [c:d = 2]",
        "[a:b 1]",
        "[a:b = 'unterminated]",
        "[a = 1]",
        "[a:b = 1] WITHIN SECONDS",
    ] {
        let result = parse_21(input);
        assert!(
            matches!(result, Err(ParseError::Syntax { .. })),
            "expected syntax error for {:?}, got {:?}",
            input,
            result
        );
    }
}

#[test]
fn test_syntax_error_carries_position_and_source() {
    let err = parse_21("[a:b = 1] AND\n[c:d ==]").unwrap_err();
    match err {
        ParseError::Syntax { line, src, .. } => {
            assert_eq!(line, 2);
            assert_eq!(src, "[a:b = 1] AND\n[c:d ==]");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

// ==============================================================================
// Literals

#[test]
fn test_literals() {
    assert_eq!(single_value("[a:b = 42]"), Value::Number(Number::Int(42)));
    assert_eq!(single_value("[a:b = -3]"), Value::Number(Number::Int(-3)));
    assert_eq!(single_value("[a:b = 2.5]"), Value::Number(Number::Float(2.5)));
    assert_eq!(single_value("[a:b = 1e3]"), Value::Number(Number::Float(1000.0)));
    assert_eq!(single_value("[a:b = true]"), Value::Bool(true));
    assert_eq!(single_value("[a:b = FALSE]"), Value::Bool(false));
    assert_eq!(single_value("[a:b = 'text']"), Value::String("text".into()));
    assert_eq!(single_value("[a:b = h'0A0b']"), Value::Hex("0a0b".into()));
    assert_eq!(single_value("[a:b = b'AAEC']"), Value::Binary("AAEC".into()));
    assert!(matches!(single_value("[a:b = t'2020-01-01T00:00:00Z']"), Value::Timestamp(_)));
}

#[test]
fn test_invalid_literals() {
    for input in [
        r"[a:b = 'bad \n escape']",
        "[a:b = t'yesterday']",
        "[a:b = 99999999999999999999]",
        "[a:b = b'AAE']",
        "[a:b = 1] WITHIN 0 SECONDS",
        "[a:b = 1] REPEATS 0 TIMES",
    ] {
        let result = parse_21(input);
        assert!(
            matches!(result, Err(ParseError::InvalidLiteral { .. })),
            "expected invalid literal for {:?}, got {:?}",
            input,
            result
        );
    }
}

#[test]
fn test_operand_types_are_checked() {
    for input in [
        "[a:b IN 'x']",
        "[a:b LIKE 1]",
        "[a:b MATCHES true]",
        "[a:b ISSUBSET ('x')]",
        "[a:b > true]",
        "[a:b = ('x', 'y')]",
    ] {
        let result = parse_21(input);
        assert!(
            matches!(result, Err(ParseError::InvalidOperand { .. })),
            "expected invalid operand for {:?}, got {:?}",
            input,
            result
        );
    }

    assert!(parse_21("[ipv4-addr:value ISSUBSET '198.51.100.0/24']").is_ok());
    assert!(parse_21("[file:size >= 1024]").is_ok());
    assert!(parse_21("[file:name IN ('a', 'b')]").is_ok());
}

// ==============================================================================
// Qualifiers and versions

#[test]
fn test_repeated_qualifier_kind_nests() {
    let chained = parse_21("[a:b = 1] WITHIN 5 SECONDS WITHIN 10 SECONDS").unwrap();
    let nested = parse_21("([a:b = 1] WITHIN 5 SECONDS) WITHIN 10 SECONDS").unwrap();
    assert_eq!(chained, nested);
    assert_eq!(chained.to_string(), "([a:b = 1] WITHIN 5 SECONDS) WITHIN 10 SECONDS");
}

#[test]
fn test_start_stop_literal_depends_on_version() {
    let v21 = "[a:b = 1] START t'2016-01-01T00:00:00Z' STOP t'2016-02-01T00:00:00Z'";
    let v20 = "[a:b = 1] START '2016-01-01T00:00:00Z' STOP '2016-02-01T00:00:00Z'";

    assert!(parse_pattern(v21, StixVersion::V2_1).is_ok());
    assert!(parse_pattern(v20, StixVersion::V2_0).is_ok());
    assert_eq!(
        parse_pattern(v21, StixVersion::V2_1).unwrap(),
        parse_pattern(v20, StixVersion::V2_0).unwrap()
    );

    assert!(matches!(
        parse_pattern(v20, StixVersion::V2_1),
        Err(ParseError::VersionMismatch { version: "2.1", .. })
    ));
    assert!(matches!(
        parse_pattern(v21, StixVersion::V2_0),
        Err(ParseError::VersionMismatch { version: "2.0", .. })
    ));
}

#[test]
fn test_qualifier_values() {
    match parse_21("[a:b = 1] WITHIN 2.5 SECONDS REPEATS 3 TIMES").unwrap() {
        ObservationExpr::Leaf(leaf) => {
            let qualifiers: Vec<_> = leaf.qualifiers.iter().cloned().collect();
            assert_eq!(
                qualifiers,
                vec![
                    Qualifier::Within(Number::Float(2.5)),
                    Qualifier::Repeats(3)
                ]
            );
        }
        other => panic!("expected a leaf, got {}", other),
    }
}

#[test]
fn test_operators() {
    let ops = [
        ("=", ComparisonOp::Eq),
        ("!=", ComparisonOp::NotEq),
        ("<>", ComparisonOp::NotEq),
        (">", ComparisonOp::Gt),
        ("<", ComparisonOp::Lt),
        (">=", ComparisonOp::Ge),
        ("<=", ComparisonOp::Le),
    ];
    for (text, op) in ops {
        let pattern = format!("[file:size {} 10]", text);
        match parse_21(&pattern).unwrap() {
            ObservationExpr::Leaf(leaf) => match leaf.comparison {
                ComparisonExpr::Test(test) => assert_eq!(test.operator, op, "{}", pattern),
                other => panic!("expected a test, got {}", other),
            },
            other => panic!("expected a leaf, got {}", other),
        }
    }
}

#[test]
fn test_display_round_trips() {
    for input in [
        "[file:name = 'a\\'b'] AND [file:size > 10]",
        "([a:b = 1] OR [c:d = 2]) FOLLOWEDBY [e:f = 3] WITHIN 10 SECONDS",
        "([a:b = 1] AND [c:d = 2]) REPEATS 2 TIMES",
        "[x-custom:'odd name'.list[-1] NOT LIKE 'a%' OR NOT EXISTS x-custom:other]",
        "[a:b = t'2020-01-01T00:00:00.5Z'] START t'2020-01-01T00:00:00Z' STOP t'2021-01-01T00:00:00Z'",
    ] {
        let parsed = parse_21(input).unwrap();
        let rendered = parsed.to_string();
        assert_eq!(parse_21(&rendered).unwrap(), parsed, "{} -> {}", input, rendered);
    }
}
