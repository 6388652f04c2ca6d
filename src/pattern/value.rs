use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;

/// Numeric literal. STIX has a single number type: integers and floats are
/// ordered and compared by exact numeric value, so `1`, `1.0` and `1e0` are
/// the same number, as are `0.0` and `-0.0`.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

/// Exact comparison of an integer against a float, without a lossy cast of
/// the integer
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() || f >= TWO_POW_63 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => {
            let fraction = f - whole;
            if fraction > 0.0 {
                Ordering::Less
            } else if fraction < 0.0 {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        unequal => unequal,
    }
}

impl Number {
    /// The integer this number equals, if any
    fn as_integral(&self) -> Option<i64> {
        match *self {
            Number::Int(i) => Some(i),
            Number::Float(f) if f.fract() == 0.0 && f >= -TWO_POW_63 && f < TWO_POW_63 => {
                Some(f as i64)
            }
            Number::Float(_) => None,
        }
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(b),
            // non-finite floats never leave the parser; total_cmp keeps NaN ordered
            (Number::Float(a), Number::Float(b)) => a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b)),
            (Number::Int(a), Number::Float(b)) => cmp_int_float(*a, *b),
            (Number::Float(a), Number::Int(b)) => cmp_int_float(*b, *a).reverse(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl Hash for Number {
    /// Equal numbers hash alike: integral values hash as their integer
    fn hash<H: Hasher>(&self, state: &mut H) {
        match (self.as_integral(), self) {
            (Some(i), _) => {
                state.write_u8(0);
                i.hash(state)
            }
            (None, Number::Float(f)) => {
                state.write_u8(1);
                f.to_bits().hash(state)
            }
            (None, Number::Int(i)) => {
                state.write_u8(0);
                i.hash(state)
            }
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            // Debug keeps the decimal point on whole floats
            Number::Float(x) => write!(f, "{:?}", x),
        }
    }
}

/// Typed literal. Variant order is the cross-type rank used by the
/// comparator; values of the same type compare naturally.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Bool(bool),
    Number(Number),
    String(String),
    Timestamp(DateTime<Utc>),
    /// Lower-case hex digits, from `h'...'`
    Hex(String),
    /// Base64 text, from `b'...'`
    Binary(String),
    Set(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::Hex(_) => "hex",
            Value::Binary(_) => "binary",
            Value::Set(_) => "set",
        }
    }

    /// Literals accepted by the ordering operators
    pub fn is_orderable(&self) -> bool {
        matches!(
            self,
            Value::Number(_)
                | Value::String(_)
                | Value::Timestamp(_)
                | Value::Hex(_)
                | Value::Binary(_)
        )
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(&quote(s)),
            Value::Timestamp(t) => {
                write!(f, "t'{}'", t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Hex(h) => write!(f, "h'{}'", h),
            Value::Binary(b) => write!(f, "b'{}'", b),
            Value::Set(items) => write!(f, "({})", items.iter().join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn int_and_float_order_by_value() {
        assert!(Number::Int(1) < Number::Float(1.5));
        assert!(Number::Float(0.5) < Number::Int(1));
        assert!(Number::Int(-2) < Number::Float(-1.5));
        assert!(Number::Float(-2.5) < Number::Int(-2));
    }

    #[test]
    fn equal_int_and_float_are_the_same_number() {
        assert_eq!(Number::Int(1), Number::Float(1.0));
        assert_eq!(Number::Float(1.0).cmp(&Number::Int(1)), Ordering::Equal);
        assert_eq!(Number::Float(0.0), Number::Float(-0.0));
        assert_eq!(Number::Int(0), Number::Float(-0.0));
        assert_ne!(Number::Int(1), Number::Float(1.5));
    }

    #[test]
    fn equal_numbers_hash_alike() {
        use std::collections::hash_map::DefaultHasher;

        fn hash_of(n: Number) -> u64 {
            let mut hasher = DefaultHasher::new();
            n.hash(&mut hasher);
            hasher.finish()
        }

        assert_eq!(hash_of(Number::Int(5)), hash_of(Number::Float(5.0)));
        assert_eq!(hash_of(Number::Float(0.0)), hash_of(Number::Float(-0.0)));
        assert_eq!(hash_of(Number::Float(2.5)), hash_of(Number::Float(2.5)));
    }

    #[test]
    fn huge_floats_bound_every_int() {
        assert!(Number::Int(i64::MAX) < Number::Float(1e19));
        assert!(Number::Int(i64::MIN) > Number::Float(-1e19));
    }

    #[test]
    fn sorting_mixed_numbers_is_consistent() {
        let mut numbers = vec![
            Number::Float(2.0),
            Number::Float(-0.5),
            Number::Int(3),
            Number::Float(2.5),
            Number::Int(-1),
        ];
        numbers.sort();
        assert_eq!(
            numbers,
            vec![
                Number::Int(-1),
                Number::Float(-0.5),
                Number::Int(2),
                Number::Float(2.5),
                Number::Int(3),
            ]
        );
    }

    #[test]
    fn cross_type_values_order_by_rank() {
        let ts = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let ranked = vec![
            Value::Bool(true),
            Value::Number(Number::Int(100)),
            Value::String("a".into()),
            Value::Timestamp(ts),
            Value::Hex("00".into()),
            Value::Binary("AA==".into()),
            Value::Set(vec![]),
        ];
        let mut shuffled = ranked.clone();
        shuffled.reverse();
        shuffled.sort();
        assert_eq!(shuffled, ranked);
    }

    #[test]
    fn renders_literals() {
        assert_eq!(Value::String("it's".into()).to_string(), r"'it\'s'");
        assert_eq!(Value::Number(Number::Float(3.0)).to_string(), "3.0");
        let ts = Utc.with_ymd_and_hms(2016, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "t'2016-06-01T00:00:00Z'");
        assert_eq!(
            Value::Set(vec![
                Value::Number(Number::Int(1)),
                Value::Number(Number::Int(2))
            ])
            .to_string(),
            "(1, 2)"
        );
    }
}
