//! Values produced by resolution and formula evaluation.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rhai::{Array, Dynamic};
use std::fmt;

use super::reference::Reference;

/// A non-null value. Nullable values are `Option<Value>`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    /// A materialized range or array result; null members stay `None`.
    List(Vec<Option<Value>>),
    /// A stored value that points somewhere else, e.g. an environment value bound to a label.
    Reference(Reference),
}

impl Value {
    pub fn text(text: impl Into<String>) -> Value {
        Value::Text(text.into())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Option<Value>]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Name of the variant, used in conversion messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Text(_) => "Text",
            Value::Boolean(_) => "Boolean",
            Value::Date(_) => "Date",
            Value::DateTime(_) => "DateTime",
            Value::Time(_) => "Time",
            Value::List(_) => "List",
            Value::Reference(_) => "Reference",
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Convert a nullable value into a Rhai value (`None` becomes unit).
pub fn to_dynamic(value: &Option<Value>) -> Dynamic {
    let Some(value) = value else {
        return Dynamic::UNIT;
    };
    match value {
        Value::Number(n) => Dynamic::from(*n),
        Value::Text(s) => Dynamic::from(s.clone()),
        Value::Boolean(b) => Dynamic::from(*b),
        Value::Date(d) => Dynamic::from(*d),
        Value::DateTime(dt) => Dynamic::from(*dt),
        Value::Time(t) => Dynamic::from(*t),
        Value::List(items) => Dynamic::from(items.iter().map(to_dynamic).collect::<Array>()),
        Value::Reference(r) => Dynamic::from(r.clone()),
    }
}

/// Convert a Rhai value back into a nullable value (unit becomes `None`).
pub fn from_dynamic(value: Dynamic) -> Option<Value> {
    if value.is_unit() {
        return None;
    }
    if let Ok(n) = value.as_float() {
        return Some(Value::Number(n));
    }
    if let Ok(n) = value.as_int() {
        return Some(Value::Number(n as f64));
    }
    if let Ok(b) = value.as_bool() {
        return Some(Value::Boolean(b));
    }
    if let Ok(c) = value.as_char() {
        return Some(Value::Text(c.to_string()));
    }
    if value.is_string() {
        return value.into_string().ok().map(Value::Text);
    }
    if value.is_array() {
        let items = value.into_array().ok()?;
        return Some(Value::List(items.into_iter().map(from_dynamic).collect()));
    }
    if value.is::<NaiveDate>() {
        return Some(Value::Date(value.cast::<NaiveDate>()));
    }
    if value.is::<NaiveDateTime>() {
        return Some(Value::DateTime(value.cast::<NaiveDateTime>()));
    }
    if value.is::<NaiveTime>() {
        return Some(Value::Time(value.cast::<NaiveTime>()));
    }
    if value.is::<Reference>() {
        return Some(Value::Reference(value.cast::<Reference>()));
    }
    Some(Value::Text(value.to_string()))
}

/// Format a nullable value for display (`None` is blank).
pub fn format_value(value: &Option<Value>) -> String {
    match value {
        None => String::new(),
        Some(value) => value.to_string(),
    }
}

/// Format a number for display.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "#NAN!".to_string()
    } else if n.is_infinite() {
        "#INF!".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e10 {
        format!("{:.0}", n)
    } else {
        format!("{:.2}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(format_value).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Reference(r) => r.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(1.5), "1.50");
        assert_eq!(format_number(f64::NAN), "#NAN!");
        assert_eq!(format_number(f64::INFINITY), "#INF!");
    }

    #[test]
    fn test_unit_is_null() {
        assert_eq!(from_dynamic(Dynamic::UNIT), None);
        assert!(to_dynamic(&None).is_unit());
    }

    #[test]
    fn test_integers_become_numbers() {
        assert_eq!(from_dynamic(Dynamic::from(3_i64)), Some(Value::Number(3.0)));
    }

    #[test]
    fn test_list_keeps_null_members() {
        let list = Some(Value::List(vec![Some(Value::text("B2Value")), None]));
        assert_eq!(from_dynamic(to_dynamic(&list)), list);
        assert_eq!(format_value(&list), "{B2Value, }");
    }

    #[test]
    fn test_dates_survive_rhai() {
        let date = Some(Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert_eq!(from_dynamic(to_dynamic(&date)), date);
        assert_eq!(format_value(&date), "2024-02-29");
    }
}
