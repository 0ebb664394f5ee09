//! Spreadsheet functions: built-ins, user-defined lambdas and the registry.
//!
//! Conventions:
//! - Function names are case-insensitive and stored upper-cased (`SUM`).
//! - Arguments reach [`ExpressionFunction::apply`] already converted to the
//!   declared parameters (see [`super::convert`]).
//! - If you add a new built-in, add a row to `BUILTINS`.

use dashmap::DashMap;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

use super::context::EvaluationContext;
use super::convert::{FunctionParameter, ParameterKind};
use super::error::{ResolveError, Result};
use super::reference::{Reference, ValueName};
use super::value::Value;

/// A case-insensitive function name, stored upper-cased.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct FunctionName(String);

impl FunctionName {
    pub fn new(name: &str) -> Result<FunctionName> {
        let mut chars = name.chars();
        let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if valid {
            Ok(FunctionName(name.to_ascii_uppercase()))
        } else {
            Err(ResolveError::InvalidReference(format!(
                "invalid function name \"{}\"",
                name
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A function callable from formulas.
pub trait ExpressionFunction: Send + Sync {
    fn name(&self) -> &FunctionName;

    fn parameters(&self) -> &[FunctionParameter];

    /// Impure functions (`NOW`, `RAND`) may return a different value on each call.
    fn is_pure(&self) -> bool {
        true
    }

    /// The definition text for user-defined functions, `None` for built-ins.
    fn source(&self) -> Option<String> {
        None
    }

    fn apply(&self, args: Vec<Option<Value>>, context: &EvaluationContext)
    -> Result<Option<Value>>;
}

type BuiltinBody = fn(Vec<Option<Value>>) -> Result<Option<Value>>;

pub struct Builtin {
    pub name: &'static str,
    pub pure: bool,
    signature: fn() -> Vec<FunctionParameter>,
    body: BuiltinBody,
}

pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "SUM",
        pure: true,
        signature: numbers,
        body: sum,
    },
    Builtin {
        name: "AVERAGE",
        pure: true,
        signature: numbers,
        body: average,
    },
    Builtin {
        name: "COUNT",
        pure: true,
        signature: anything,
        body: count,
    },
    Builtin {
        name: "MIN",
        pure: true,
        signature: numbers,
        body: min,
    },
    Builtin {
        name: "MAX",
        pure: true,
        signature: numbers,
        body: max,
    },
    Builtin {
        name: "CONCAT",
        pure: true,
        signature: texts,
        body: concat,
    },
    Builtin {
        name: "ISBLANK",
        pure: true,
        signature: single_value,
        body: is_blank,
    },
    Builtin {
        name: "IF",
        pure: true,
        signature: condition,
        body: choose,
    },
    Builtin {
        name: "NOW",
        pure: false,
        signature: Vec::new,
        body: now,
    },
    Builtin {
        name: "RAND",
        pure: false,
        signature: Vec::new,
        body: random,
    },
];

fn numbers() -> Vec<FunctionParameter> {
    vec![FunctionParameter::variadic("number", ParameterKind::Number)]
}

fn anything() -> Vec<FunctionParameter> {
    vec![FunctionParameter::variadic("value", ParameterKind::Any)]
}

fn texts() -> Vec<FunctionParameter> {
    vec![FunctionParameter::variadic("text", ParameterKind::Text)]
}

fn single_value() -> Vec<FunctionParameter> {
    vec![FunctionParameter::optional("value", ParameterKind::Any)]
}

fn condition() -> Vec<FunctionParameter> {
    vec![
        FunctionParameter::required("condition", ParameterKind::Boolean),
        FunctionParameter::optional("then", ParameterKind::Any),
        FunctionParameter::optional("else", ParameterKind::Any),
    ]
}

fn present_numbers(args: &[Option<Value>]) -> impl Iterator<Item = f64> + '_ {
    args.iter().flatten().filter_map(Value::as_number)
}

fn sum(args: Vec<Option<Value>>) -> Result<Option<Value>> {
    Ok(Some(Value::Number(present_numbers(&args).sum())))
}

fn average(args: Vec<Option<Value>>) -> Result<Option<Value>> {
    let values: Vec<f64> = present_numbers(&args).collect();
    if values.is_empty() {
        return Err(ResolveError::Evaluation(
            "AVERAGE needs at least one number".to_string(),
        ));
    }
    Ok(Some(Value::Number(
        values.iter().sum::<f64>() / values.len() as f64,
    )))
}

fn count(args: Vec<Option<Value>>) -> Result<Option<Value>> {
    Ok(Some(Value::Number(args.iter().flatten().count() as f64)))
}

fn min(args: Vec<Option<Value>>) -> Result<Option<Value>> {
    let min = present_numbers(&args).reduce(f64::min).unwrap_or(0.0);
    Ok(Some(Value::Number(min)))
}

fn max(args: Vec<Option<Value>>) -> Result<Option<Value>> {
    let max = present_numbers(&args).reduce(f64::max).unwrap_or(0.0);
    Ok(Some(Value::Number(max)))
}

fn concat(args: Vec<Option<Value>>) -> Result<Option<Value>> {
    let text: String = args
        .iter()
        .flatten()
        .filter_map(Value::as_text)
        .collect();
    Ok(Some(Value::Text(text)))
}

fn is_blank(args: Vec<Option<Value>>) -> Result<Option<Value>> {
    let blank = args.into_iter().next().flatten().is_none();
    Ok(Some(Value::Boolean(blank)))
}

fn choose(args: Vec<Option<Value>>) -> Result<Option<Value>> {
    let mut args = args.into_iter();
    let condition = matches!(args.next().flatten(), Some(Value::Boolean(true)));
    let then = args.next().flatten();
    let otherwise = args.next().flatten();
    Ok(if condition { then } else { otherwise })
}

fn now(_: Vec<Option<Value>>) -> Result<Option<Value>> {
    Ok(Some(Value::DateTime(chrono::Local::now().naive_local())))
}

fn random(_: Vec<Option<Value>>) -> Result<Option<Value>> {
    Ok(Some(Value::Number(rand::thread_rng().r#gen::<f64>())))
}

/// A row of `BUILTINS` ready to be registered.
struct BuiltinFunction {
    builtin: &'static Builtin,
    name: FunctionName,
    parameters: Vec<FunctionParameter>,
}

impl ExpressionFunction for BuiltinFunction {
    fn name(&self) -> &FunctionName {
        &self.name
    }

    fn parameters(&self) -> &[FunctionParameter] {
        &self.parameters
    }

    fn is_pure(&self) -> bool {
        self.builtin.pure
    }

    fn apply(&self, args: Vec<Option<Value>>, _: &EvaluationContext) -> Result<Option<Value>> {
        (self.builtin.body)(args)
    }
}

/// A user-defined function: `DOUBLE(x) = x * 2`.
///
/// Calling it evaluates the body in a new scope frame where every parameter
/// is bound as a named value.
#[derive(Clone, Debug)]
pub struct LambdaFunction {
    name: FunctionName,
    names: Vec<ValueName>,
    parameters: Vec<FunctionParameter>,
    body: String,
}

impl LambdaFunction {
    pub fn new(name: &str, parameter_names: &[&str], body: &str) -> Result<LambdaFunction> {
        let name = FunctionName::new(name)?;
        let mut names: Vec<ValueName> = Vec::with_capacity(parameter_names.len());
        for parameter in parameter_names {
            let value_name = ValueName::new(parameter.trim())?;
            if names.contains(&value_name) {
                return Err(ResolveError::InvalidReference(format!(
                    "duplicate parameter \"{}\" in {}",
                    value_name, name
                )));
            }
            names.push(value_name);
        }
        let parameters = names
            .iter()
            .map(|n| FunctionParameter::required(n.as_str(), ParameterKind::Any))
            .collect();
        Ok(LambdaFunction {
            name,
            names,
            parameters,
            body: body.trim().to_string(),
        })
    }

    /// Parse `NAME(a, b) = body`.
    pub fn parse(definition: &str) -> Result<LambdaFunction> {
        let invalid = || {
            ResolveError::InvalidReference(format!(
                "invalid function definition \"{}\"",
                definition.trim()
            ))
        };
        let (head, body) = definition.split_once('=').ok_or_else(invalid)?;
        let (name, rest) = head.trim().split_once('(').ok_or_else(invalid)?;
        let params = rest.trim().strip_suffix(')').ok_or_else(invalid)?;
        if body.trim().is_empty() {
            return Err(invalid());
        }
        let params: Vec<&str> = params
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        LambdaFunction::new(name.trim(), &params, body)
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl ExpressionFunction for LambdaFunction {
    fn name(&self) -> &FunctionName {
        &self.name
    }

    fn parameters(&self) -> &[FunctionParameter] {
        &self.parameters
    }

    fn source(&self) -> Option<String> {
        let names: Vec<&str> = self.names.iter().map(ValueName::as_str).collect();
        Some(format!("{}({}) = {}", self.name, names.join(", "), self.body))
    }

    fn apply(
        &self,
        args: Vec<Option<Value>>,
        context: &EvaluationContext,
    ) -> Result<Option<Value>> {
        let bindings = self
            .names
            .iter()
            .cloned()
            .map(Reference::NamedValue)
            .zip(args);
        context.with_locals(bindings).evaluate(&self.body)
    }
}

/// Thread-safe, case-insensitive function table.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: DashMap<FunctionName, Arc<dyn ExpressionFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> FunctionRegistry {
        FunctionRegistry::default()
    }

    /// A registry holding every row of `BUILTINS`.
    pub fn with_builtins() -> FunctionRegistry {
        let registry = FunctionRegistry::new();
        for builtin in BUILTINS {
            registry.functions.insert(
                FunctionName(builtin.name.to_string()),
                Arc::new(BuiltinFunction {
                    builtin,
                    name: FunctionName(builtin.name.to_string()),
                    parameters: (builtin.signature)(),
                }),
            );
        }
        registry
    }

    /// Add or replace a function, returning the one it replaced.
    pub fn register(
        &self,
        function: Arc<dyn ExpressionFunction>,
    ) -> Option<Arc<dyn ExpressionFunction>> {
        self.functions.insert(function.name().clone(), function)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ExpressionFunction>> {
        let name = FunctionName::new(name).ok()?;
        self.functions.get(&name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn ExpressionFunction>> {
        let name = FunctionName::new(name).ok()?;
        self.functions.remove(&name).map(|(_, function)| function)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<FunctionName> {
        let mut names: Vec<FunctionName> =
            self.functions.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// User-defined functions, sorted by name.
    pub fn user_defined(&self) -> Vec<Arc<dyn ExpressionFunction>> {
        self.names()
            .iter()
            .filter_map(|name| self.functions.get(name).map(|e| Arc::clone(e.value())))
            .filter(|function| function.source().is_some())
            .collect()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("names", &self.names())
            .finish()
    }
}
