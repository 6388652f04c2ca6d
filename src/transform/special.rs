//! Canonical spellings for values whose text has more than one form:
//! IP addresses with CIDR suffixes and case-insensitive registry key names.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::pattern::{ComparisonOp, ListIndex, ObjectPath, PathStep, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Special {
    Ipv4,
    Ipv6,
    RegistryKey,
}

fn classify(path: &ObjectPath) -> Option<Special> {
    use PathStep::*;

    match (path.object_type.as_str(), path.steps.as_slice()) {
        ("ipv4-addr", [Property(p)]) if p == "value" => Some(Special::Ipv4),
        ("ipv6-addr", [Property(p)]) if p == "value" => Some(Special::Ipv6),
        ("windows-registry-key", [Property(p)]) if p == "key" => Some(Special::RegistryKey),
        ("windows-registry-key", [Property(values), Index(ListIndex::Any), Property(name)])
            if values == "values" && name == "name" =>
        {
            Some(Special::RegistryKey)
        }
        _ => None,
    }
}

/// `a.b.c.d/n`: host bits zeroed, `/32` dropped. Unparseable text is left as is.
fn canonical_ipv4(text: &str) -> Option<String> {
    let (addr, prefix) = match text.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix.parse::<u32>().ok()?)),
        None => (text, None),
    };
    let addr: Ipv4Addr = addr.parse().ok()?;

    match prefix {
        None | Some(32) => Some(addr.to_string()),
        Some(bits) if bits < 32 => {
            let mask = u32::MAX.checked_shl(32 - bits).unwrap_or(0);
            Some(format!("{}/{}", Ipv4Addr::from(u32::from(addr) & mask), bits))
        }
        Some(_) => None,
    }
}

/// Same as [`canonical_ipv4`] for 128-bit addresses, printed in compressed form
fn canonical_ipv6(text: &str) -> Option<String> {
    let (addr, prefix) = match text.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix.parse::<u32>().ok()?)),
        None => (text, None),
    };
    let addr: Ipv6Addr = addr.parse().ok()?;

    match prefix {
        None | Some(128) => Some(addr.to_string()),
        Some(bits) if bits < 128 => {
            let mask = u128::MAX.checked_shl(128 - bits).unwrap_or(0);
            Some(format!("{}/{}", Ipv6Addr::from(u128::from(addr) & mask), bits))
        }
        Some(_) => None,
    }
}

fn canonical_string(special: Special, text: &str) -> Option<String> {
    match special {
        Special::Ipv4 => canonical_ipv4(text),
        Special::Ipv6 => canonical_ipv6(text),
        Special::RegistryKey => Some(text.to_lowercase()),
    }
}

fn canonical_element(special: Special, value: &Value) -> Value {
    match value {
        Value::String(s) => canonical_string(special, s)
            .map(Value::String)
            .unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

/// The canonical replacement for a test's value, if it differs from the
/// current one
pub fn canonical_value(path: &ObjectPath, operator: ComparisonOp, value: Option<&Value>) -> Option<Value> {
    let special = classify(path)?;
    let value = value?;

    let applies = match operator {
        ComparisonOp::Eq | ComparisonOp::NotEq | ComparisonOp::In => true,
        ComparisonOp::Like => special == Special::RegistryKey,
        _ => false,
    };
    if !applies {
        return None;
    }

    let canonical = match value {
        Value::Set(items) => Value::Set(items.iter().map(|v| canonical_element(special, v)).collect()),
        other => canonical_element(special, other),
    };
    (canonical != *value).then_some(canonical)
}
