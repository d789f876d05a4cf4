use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What to do with negative quantities after coercion. Whether negatives
/// encode returns/corrections or entry errors is not settled, so the
/// behavior is a switch rather than a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeQuantityPolicy {
    #[default]
    Passthrough,
    ClampToZero,
}

/// Coerce an untrusted aid quantity into an integer. Total over every JSON
/// value: numbers and numeric strings are read as floats and truncated toward
/// zero, everything else (null, empty, garbage, non-finite) yields 0.
pub fn coerce_aid_quantity(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(truncate),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
    .unwrap_or(0)
}

fn truncate(f: f64) -> Option<i64> {
    f.is_finite().then(|| f.trunc() as i64)
}

/// Coerce, then apply the negative-quantity policy.
pub fn coerce_with_policy(value: &Value, policy: NegativeQuantityPolicy) -> i64 {
    let quantity = coerce_aid_quantity(value);
    match policy {
        NegativeQuantityPolicy::Passthrough => quantity,
        NegativeQuantityPolicy::ClampToZero => quantity.max(0),
    }
}

/// Coerce an optional quantity: absent stays absent, present is coerced.
pub fn coerce_optional_quantity(value: &Value, policy: NegativeQuantityPolicy) -> Option<i64> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        other => Some(coerce_with_policy(other, policy)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coercion_is_total() {
        let cases = [
            (Value::Null, 0),
            (json!(""), 0),
            (json!("abc"), 0),
            (json!("12.7"), 12),
            (json!(7), 7),
            (json!(7.9), 7),
            (json!(-3), -3),
        ];
        for (input, expected) in cases {
            assert_eq!(coerce_aid_quantity(&input), expected, "input: {}", input);
        }
    }

    #[test]
    fn test_coercion_of_unusual_inputs() {
        assert_eq!(coerce_aid_quantity(&json!(" 15 ")), 15);
        assert_eq!(coerce_aid_quantity(&json!("-3.9")), -3);
        assert_eq!(coerce_aid_quantity(&json!("1e2")), 100);
        assert_eq!(coerce_aid_quantity(&json!("NaN")), 0);
        assert_eq!(coerce_aid_quantity(&json!("inf")), 0);
        assert_eq!(coerce_aid_quantity(&json!(true)), 1);
        assert_eq!(coerce_aid_quantity(&json!([1, 2])), 0);
        assert_eq!(coerce_aid_quantity(&json!({"n": 1})), 0);
    }

    #[test]
    fn test_negative_policy() {
        assert_eq!(coerce_with_policy(&json!(-3), NegativeQuantityPolicy::Passthrough), -3);
        assert_eq!(coerce_with_policy(&json!(-3), NegativeQuantityPolicy::ClampToZero), 0);
        assert_eq!(coerce_with_policy(&json!("4"), NegativeQuantityPolicy::ClampToZero), 4);
    }

    #[test]
    fn test_optional_quantity() {
        let policy = NegativeQuantityPolicy::Passthrough;
        assert_eq!(coerce_optional_quantity(&Value::Null, policy), None);
        assert_eq!(coerce_optional_quantity(&json!(" "), policy), None);
        assert_eq!(coerce_optional_quantity(&json!("5"), policy), Some(5));
        assert_eq!(coerce_optional_quantity(&json!("x"), policy), Some(0));
    }
}
