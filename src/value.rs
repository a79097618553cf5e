//! Runtime values produced while evaluating interpolation expressions.
//!
//! Scope data arrives as `serde_json` values; the evaluator lifts them into
//! [`Value`] so that numbers, strings and arrays follow JavaScript-style
//! coercion rules when they are combined and stringified.

use serde_json::{Map, Value as Json};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Map<String, Json>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Numeric coercion. Strings that are not numbers become `NaN`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => single.to_number(),
                _ => f64::NAN,
            },
            Value::Object(_) => f64::NAN,
        }
    }

    /// String form used when a value is substituted into markup.
    pub fn render(&self) -> String {
        match self {
            Value::Undefined => String::new(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.render()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
        }
    }

    /// Property lookup: object keys, array indices and `length`.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(map) => map.get(key).map(Value::from),
            Value::Array(items) => {
                if key == "length" {
                    return Some(Value::Number(items.len() as f64));
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index).cloned())
            }
            Value::String(s) => {
                if key == "length" {
                    return Some(Value::Number(s.chars().count() as f64));
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|index| s.chars().nth(index))
                    .map(|c| Value::String(c.to_string()))
            }
            _ => None,
        }
    }

    /// `==` semantics: nullish values equal each other, mixed primitives
    /// compare numerically.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
                self == other
            }
            _ => self.to_number() == other.to_number(),
        }
    }

    /// Relational comparison; `None` when either side is `NaN`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => self.to_number().partial_cmp(&other.to_number()),
        }
    }
}

impl From<&Json> for Value {
    fn from(json: &Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            Json::Object(map) => Value::Object(map.clone()),
        }
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Value::from(&json)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Formats a number the way JavaScript stringifies it: integral values carry
/// no fractional part, non-finite values are spelled out.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let magnitude = n.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let formatted = format!("{:e}", n);
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => formatted,
        };
    }
    if n.fract() == 0.0 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            f64::NAN
        }
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(20.0), "20");
        assert_eq!(format_number(-4.0), "-4");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1e-7), "1e-7");
    }

    #[test]
    fn test_render_collections() {
        let value = Value::from(json!(["a", 1, null, true]));
        assert_eq!(value.render(), "a,1,,true");
        assert_eq!(Value::from(json!({"a": 1})).render(), "[object Object]");
        assert_eq!(Value::Null.render(), "null");
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("inf").to_number().is_nan());
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert!(Value::Undefined.to_number().is_nan());
    }

    #[test]
    fn test_property_lookup() {
        let value = Value::from(json!({"list": [10, 20], "name": "héllo"}));
        let list = value.get("list").unwrap();
        assert_eq!(list.get("1"), Some(Value::Number(20.0)));
        assert_eq!(list.get("length"), Some(Value::Number(2.0)));
        let name = value.get("name").unwrap();
        assert_eq!(name.get("length"), Some(Value::Number(5.0)));
        assert_eq!(name.get("1"), Some(Value::from("é")));
        assert_eq!(value.get("missing"), None);
    }

    #[test]
    fn test_equality_and_comparison() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(Value::from("5").loose_equals(&Value::Number(5.0)));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
        assert_eq!(
            Value::from("b").compare(&Value::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Number(f64::NAN).compare(&Value::Number(1.0)), None);
    }
}
