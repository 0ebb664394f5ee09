//! Converting resolved values into the shapes function parameters expect.

use super::error::{ResolveError, Result};
use super::value::{Value, format_value};

/// The type a parameter accepts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParameterKind {
    Any,
    Number,
    Text,
    Boolean,
    DateTime,
    List,
}

impl std::fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ParameterKind::Any => "Any",
            ParameterKind::Number => "Number",
            ParameterKind::Text => "Text",
            ParameterKind::Boolean => "Boolean",
            ParameterKind::DateTime => "DateTime",
            ParameterKind::List => "List",
        };
        f.write_str(text)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cardinality {
    Required,
    Optional,
    /// Zero or more trailing arguments; list arguments are flattened.
    Variadic,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionParameter {
    pub name: String,
    pub kind: ParameterKind,
    pub cardinality: Cardinality,
}

impl FunctionParameter {
    pub fn required(name: &str, kind: ParameterKind) -> Self {
        Self::new(name, kind, Cardinality::Required)
    }

    pub fn optional(name: &str, kind: ParameterKind) -> Self {
        Self::new(name, kind, Cardinality::Optional)
    }

    pub fn variadic(name: &str, kind: ParameterKind) -> Self {
        Self::new(name, kind, Cardinality::Variadic)
    }

    fn new(name: &str, kind: ParameterKind, cardinality: Cardinality) -> Self {
        FunctionParameter {
            name: name.to_string(),
            kind,
            cardinality,
        }
    }

    fn failure(&self, message: String) -> ResolveError {
        ResolveError::Conversion {
            parameter: self.name.clone(),
            message,
        }
    }
}

/// Convert one value for `parameter`. Nulls pass through untouched.
pub fn convert(value: Option<Value>, parameter: &FunctionParameter) -> Result<Option<Value>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let cannot = |value: &Value| {
        parameter.failure(format!(
            "cannot convert \"{}\" to {}",
            value, parameter.kind
        ))
    };

    let converted = match (parameter.kind, value) {
        (ParameterKind::Any, value) => value,
        (ParameterKind::Number, Value::Number(n)) => Value::Number(n),
        (ParameterKind::Number, Value::Boolean(b)) => Value::Number(if b { 1.0 } else { 0.0 }),
        (ParameterKind::Number, Value::Text(s)) => match s.trim().parse::<f64>() {
            Ok(n) => Value::Number(n),
            Err(_) => return Err(cannot(&Value::Text(s))),
        },
        (ParameterKind::Text, Value::List(items)) => {
            return Err(cannot(&Value::List(items)));
        }
        (ParameterKind::Text, value) => Value::Text(format_value(&Some(value))),
        (ParameterKind::Boolean, Value::Boolean(b)) => Value::Boolean(b),
        (ParameterKind::Boolean, Value::Number(n)) => Value::Boolean(n != 0.0),
        (ParameterKind::Boolean, Value::Text(s)) => {
            if s.eq_ignore_ascii_case("true") {
                Value::Boolean(true)
            } else if s.eq_ignore_ascii_case("false") {
                Value::Boolean(false)
            } else {
                return Err(cannot(&Value::Text(s)));
            }
        }
        (ParameterKind::DateTime, Value::DateTime(dt)) => Value::DateTime(dt),
        (ParameterKind::DateTime, Value::Date(d)) => match d.and_hms_opt(0, 0, 0) {
            Some(dt) => Value::DateTime(dt),
            None => return Err(cannot(&Value::Date(d))),
        },
        (ParameterKind::List, Value::List(items)) => Value::List(items),
        (ParameterKind::List, value) => Value::List(vec![Some(value)]),
        (_, value) => return Err(cannot(&value)),
    };
    Ok(Some(converted))
}

/// Match `args` against `parameters`, converting each one.
///
/// Missing optional parameters become `None`; variadic parameters absorb
/// the remaining arguments, flattening any lists.
pub fn convert_arguments(
    args: Vec<Option<Value>>,
    parameters: &[FunctionParameter],
) -> Result<Vec<Option<Value>>> {
    let mut converted = Vec::with_capacity(args.len().max(parameters.len()));
    let mut args = args.into_iter();

    for parameter in parameters {
        match parameter.cardinality {
            Cardinality::Required => {
                let Some(arg) = args.next() else {
                    return Err(parameter.failure("missing argument".to_string()));
                };
                converted.push(convert(arg, parameter)?);
            }
            Cardinality::Optional => {
                converted.push(convert(args.next().flatten(), parameter)?);
            }
            Cardinality::Variadic => {
                for arg in args.by_ref() {
                    match arg {
                        Some(Value::List(items)) if parameter.kind != ParameterKind::List => {
                            for item in items {
                                converted.push(convert(item, parameter)?);
                            }
                        }
                        other => converted.push(convert(other, parameter)?),
                    }
                }
            }
        }
    }

    let extra = args.count();
    if extra > 0 {
        let last = parameters
            .last()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "(none)".to_string());
        return Err(ResolveError::Conversion {
            parameter: last,
            message: format!("{} unexpected argument(s)", extra),
        });
    }
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_from_text() {
        let param = FunctionParameter::required("number", ParameterKind::Number);
        assert_eq!(
            convert(Some(Value::text(" 12.5 ")), &param).unwrap(),
            Some(Value::Number(12.5))
        );
    }

    #[test]
    fn test_number_conversion_failure_message() {
        let param = FunctionParameter::required("number", ParameterKind::Number);
        let err = convert(Some(Value::text("abc")), &param).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter \"number\": cannot convert \"abc\" to Number"
        );
    }

    #[test]
    fn test_null_passes_through() {
        let param = FunctionParameter::required("number", ParameterKind::Number);
        assert_eq!(convert(None, &param).unwrap(), None);
    }

    #[test]
    fn test_boolean_from_text_and_number() {
        let param = FunctionParameter::required("flag", ParameterKind::Boolean);
        assert_eq!(
            convert(Some(Value::text("TRUE")), &param).unwrap(),
            Some(Value::Boolean(true))
        );
        assert_eq!(
            convert(Some(Value::Number(0.0)), &param).unwrap(),
            Some(Value::Boolean(false))
        );
        assert!(convert(Some(Value::text("maybe")), &param).is_err());
    }

    #[test]
    fn test_variadic_flattens_lists() {
        let params = [FunctionParameter::variadic("values", ParameterKind::Number)];
        let args = vec![
            Some(Value::Number(1.0)),
            Some(Value::List(vec![Some(Value::Number(2.0)), None])),
        ];
        assert_eq!(
            convert_arguments(args, &params).unwrap(),
            vec![Some(Value::Number(1.0)), Some(Value::Number(2.0)), None]
        );
    }

    #[test]
    fn test_missing_required_argument() {
        let params = [FunctionParameter::required("condition", ParameterKind::Boolean)];
        let err = convert_arguments(vec![], &params).unwrap_err();
        assert_eq!(err.to_string(), "Parameter \"condition\": missing argument");
    }

    #[test]
    fn test_optional_defaults_to_null_and_extra_arguments_fail() {
        let params = [
            FunctionParameter::required("a", ParameterKind::Any),
            FunctionParameter::optional("b", ParameterKind::Any),
        ];
        assert_eq!(
            convert_arguments(vec![Some(Value::Number(1.0))], &params).unwrap(),
            vec![Some(Value::Number(1.0)), None]
        );

        let args = vec![None, None, Some(Value::Number(3.0))];
        assert!(convert_arguments(args, &params).is_err());
    }
}
