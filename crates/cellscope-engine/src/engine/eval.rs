//! Rhai engine creation and formula evaluation.
//!
//! Creates a Rhai engine whose `REF`, `CALL` and variable lookups are all
//! routed through an [`EvaluationContext`], so scope frames, labels, the
//! environment and the function table apply to every formula the same way.

use rhai::{Array, Dynamic, Engine, EvalAltResult, Position};
use tracing::trace;

use super::context::EvaluationContext;
use super::error::{ResolveError, Result};
use super::preprocess::preprocess_formula;
use super::reference::Reference;
use super::value::{Value, from_dynamic, to_dynamic};

/// Wrap a resolution error so it survives the trip through Rhai.
fn to_rhai_error(err: ResolveError) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(Dynamic::from(err), Position::NONE).into()
}

/// Recover the typed error from a Rhai failure.
pub fn from_rhai_error(err: Box<EvalAltResult>) -> ResolveError {
    match *err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => from_rhai_error(inner),
        EvalAltResult::ErrorRuntime(value, _) if value.is::<ResolveError>() => {
            value.cast::<ResolveError>()
        }
        other => ResolveError::Evaluation(other.to_string()),
    }
}

/// Create a Rhai engine bound to `context`.
pub fn create_engine(context: &EvaluationContext) -> Engine {
    let mut engine = Engine::new();

    let ctx = context.clone();
    engine.register_fn(
        "REF",
        move |text: &str| -> std::result::Result<Dynamic, Box<EvalAltResult>> {
            let reference = Reference::parse(text).map_err(to_rhai_error)?;
            let value = ctx.resolve_or_fail(&reference).map_err(to_rhai_error)?;
            Ok(to_dynamic(&value))
        },
    );

    let ctx = context.clone();
    engine.register_fn(
        "CALL",
        move |name: &str, args: Array| -> std::result::Result<Dynamic, Box<EvalAltResult>> {
            let args: Vec<Option<Value>> = args.into_iter().map(from_dynamic).collect();
            let value = ctx.call(name, args).map_err(to_rhai_error)?;
            Ok(to_dynamic(&value))
        },
    );

    let ctx = context.clone();
    #[allow(deprecated)]
    engine.on_var(move |name, _index, scope_ctx| {
        // Variables the formula declared itself (`let x = ...`) stay with Rhai.
        if scope_ctx.scope().contains(name) {
            return Ok(None);
        }
        let value = ctx.resolve_name(name).map_err(to_rhai_error)?;
        Ok(Some(to_dynamic(&value)))
    });

    engine
}

/// Evaluate a formula (with or without a leading `=`) in `context`.
pub fn evaluate_formula(context: &EvaluationContext, formula: &str) -> Result<Option<Value>> {
    let script = preprocess_formula(formula);
    trace!(formula, %script, "evaluating formula");
    if script.trim().is_empty() {
        return Ok(None);
    }
    let engine = create_engine(context);
    let result = engine.eval::<Dynamic>(&script).map_err(from_rhai_error)?;
    Ok(from_dynamic(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cell_ref::CellRef;
    use crate::engine::function::FunctionRegistry;
    use crate::engine::loader::MemoryLoader;
    use crate::engine::reference::LabelName;
    use crate::engine::resolve::ResolutionEngine;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn cell(text: &str) -> CellRef {
        CellRef::from_str(text).unwrap()
    }

    fn context(loader: MemoryLoader) -> EvaluationContext {
        EvaluationContext::new(
            ResolutionEngine::with_loader(Arc::new(loader)),
            Arc::new(FunctionRegistry::with_builtins()),
        )
    }

    #[test]
    fn test_arithmetic_over_cells() {
        let loader = MemoryLoader::new()
            .with_cell(cell("A1"), Some(Value::Number(2.0)))
            .with_cell(cell("A2"), Some(Value::Number(3.0)));
        let result = evaluate_formula(&context(loader), "=A1 * A2 + 1").unwrap();
        assert_eq!(result, Some(Value::Number(7.0)));
    }

    #[test]
    fn test_sum_over_range_with_gaps() {
        let loader = MemoryLoader::new()
            .with_cell(cell("B2"), Some(Value::Number(4.0)))
            .with_cell(cell("C3"), Some(Value::Number(123.0)));
        let result = evaluate_formula(&context(loader), "SUM(B2:C3)").unwrap();
        assert_eq!(result, Some(Value::Number(127.0)));
    }

    #[test]
    fn test_labels_as_bare_identifiers() {
        let loader = MemoryLoader::new()
            .with_cell(cell("A1"), Some(Value::Number(10.0)))
            .with_label(LabelName::new("Price").unwrap(), Reference::parse("A1").unwrap());
        let result = evaluate_formula(&context(loader), "Price * 2").unwrap();
        assert_eq!(result, Some(Value::Number(20.0)));
    }

    #[test]
    fn test_missing_cell_error_survives_rhai() {
        let err = evaluate_formula(&context(MemoryLoader::new()), "B2 + 1").unwrap_err();
        assert_eq!(err.to_string(), "Cell not found: \"B2\"");
    }

    #[test]
    fn test_unknown_identifier() {
        let err = evaluate_formula(&context(MemoryLoader::new()), "Name + 1").unwrap_err();
        assert_eq!(err.to_string(), "Unknown reference: \"Name\"");
    }

    #[test]
    fn test_let_bindings_stay_in_rhai() {
        let result =
            evaluate_formula(&context(MemoryLoader::new()), "let x = 4; x * x").unwrap();
        assert_eq!(result, Some(Value::Number(16.0)));
    }

    #[test]
    fn test_template_values_shadow_cells() {
        let loader = MemoryLoader::new().with_cell(cell("A1"), Some(Value::Number(1.0)));
        let ctx = context(loader).with_locals([(
            Reference::parse("A1").unwrap(),
            Some(Value::Number(41.0)),
        )]);
        assert_eq!(ctx.evaluate("A1 + 1").unwrap(), Some(Value::Number(42.0)));
    }

    #[test]
    fn test_null_results() {
        let loader = MemoryLoader::new().with_cell(cell("A1"), None);
        let ctx = context(loader);
        assert_eq!(ctx.evaluate("A1").unwrap(), None);
        assert_eq!(ctx.evaluate("ISBLANK(A1)").unwrap(), Some(Value::Boolean(true)));
        assert_eq!(ctx.evaluate("").unwrap(), None);
    }

    #[test]
    fn test_syntax_errors_are_evaluation_errors() {
        let err = evaluate_formula(&context(MemoryLoader::new()), "1 +").unwrap_err();
        assert!(matches!(err, ResolveError::Evaluation(_)));
    }
}
