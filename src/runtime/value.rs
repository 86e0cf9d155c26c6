//! Dynamically typed script values
//!
//! Block inputs carry numbers, text, or booleans. Coercions follow the
//! block-language conventions: text that parses as a number is a number,
//! booleans count as 1/0, and comparisons fall back to case-insensitive text.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A value stored in a variable or passed through an input slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value (produced by predicates).
    Bool(bool),
    /// Numeric value.
    Number(#[serde(with = "number")] f64),
    /// Text value.
    Text(String),
}

impl Value {
    /// Numeric view of the value, if it has one.
    ///
    /// Empty or non-numeric text has no numeric view.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_nan() => None,
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
            }
        }
    }

    /// Text view of the value.
    pub fn to_text(&self) -> String {
        match self {
            Value::Text(text) => text.clone(),
            other => other.to_string(),
        }
    }

    /// Truthiness used by conditions.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(text) => {
                let lowered = text.trim().to_ascii_lowercase();
                !(lowered.is_empty() || lowered == "false" || lowered == "0")
            }
        }
    }

    /// Compare two values: numerically when both are numeric, otherwise as
    /// case-insensitive text.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self.to_number(), other.to_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => self
                .to_text()
                .to_lowercase()
                .cmp(&other.to_text().to_lowercase()),
        }
    }

    /// Equality under [`Value::compare`].
    pub fn loosely_equals(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.is_infinite() => {
                write!(f, "{}", if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(text) => write!(f, "{}", text),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

/// Serde representation for numbers that may be non-finite.
///
/// JSON has no literal for infinities or NaN, so those are written as the
/// text `"Infinity"`, `"-Infinity"` and `"NaN"`. A `null` left by an older
/// save reads back as 0.
pub mod number {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a float, spelling out non-finite values
    pub fn serialize<S: Serializer>(n: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if n.is_nan() {
            serializer.serialize_str("NaN")
        } else if n.is_infinite() {
            serializer.serialize_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
        } else {
            serializer.serialize_f64(*n)
        }
    }

    /// Deserialize a float written by [`serialize`]
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(Option<f64>),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n.unwrap_or(0.0)),
            Repr::Text(text) => match text.as_str() {
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(D::Error::custom(format!("not a number: {other:?}"))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_text_coerces() {
        assert_eq!(Value::from(" 42 ").to_number(), Some(42.0));
        assert_eq!(Value::from("abc").to_number(), None);
        assert_eq!(Value::from("").to_number(), None);
        assert_eq!(Value::from(true).to_number(), Some(1.0));
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::from(true).is_truthy());
        assert!(!Value::from("false").is_truthy());
        assert!(!Value::from("0").is_truthy());
        assert!(!Value::from(0.0).is_truthy());
        assert!(Value::from("yes").is_truthy());
    }

    #[test]
    fn test_compare_mixed() {
        assert_eq!(Value::from("10").compare(&Value::from(9.0)), Ordering::Greater);
        assert!(Value::from("Apple").loosely_equals(&Value::from("apple")));
        assert_eq!(Value::from("b").compare(&Value::from("a")), Ordering::Greater);
    }

    #[test]
    fn test_display_integral_numbers() {
        assert_eq!(Value::from(3.0).to_text(), "3");
        assert_eq!(Value::from(2.5).to_text(), "2.5");
    }

    #[test]
    fn test_non_finite_numbers_survive_json() {
        let values = vec![
            Value::Number(f64::INFINITY),
            Value::Number(f64::NEG_INFINITY),
            Value::Number(f64::NAN),
            Value::from("Infinity!"),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"["Infinity","-Infinity","NaN","Infinity!"]"#);

        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[0], Value::Number(f64::INFINITY));
        assert_eq!(back[1], Value::Number(f64::NEG_INFINITY));
        assert!(matches!(back[2], Value::Number(n) if n.is_nan()));
        assert_eq!(back[3], Value::from("Infinity!"));
        assert_eq!(back[0].to_text(), "Infinity");
    }

    #[test]
    fn test_null_number_reads_as_zero() {
        let value: Value = serde_json::from_str("null").unwrap();
        assert_eq!(value, Value::Number(0.0));
    }

    #[test]
    fn test_untagged_json() {
        let values: Vec<Value> = serde_json::from_str(r#"[1.5, "hi", true]"#).unwrap();
        assert_eq!(
            values,
            vec![Value::Number(1.5), Value::from("hi"), Value::Bool(true)]
        );
    }
}
