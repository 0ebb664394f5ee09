//! The context a formula is evaluated in: a resolver plus the function table.

use std::sync::Arc;

use tracing::debug;

use super::convert::convert_arguments;
use super::error::{ResolveError, Result};
use super::eval::evaluate_formula;
use super::function::{ExpressionFunction, FunctionRegistry};
use super::loader::LabelMapping;
use super::reference::{LabelName, Reference, ReferenceKind, ValueName};
use super::resolve::{ResolutionEngine, Resolved};
use super::value::Value;

/// How deeply function calls may nest. Every call evaluates its body with a
/// fresh Rhai engine, so Rhai's own call limit never applies.
#[cfg(debug_assertions)]
pub const MAX_CALL_DEPTH: usize = 8;
#[cfg(not(debug_assertions))]
pub const MAX_CALL_DEPTH: usize = 64;

#[derive(Clone, Debug)]
pub struct EvaluationContext {
    resolver: ResolutionEngine,
    functions: Arc<FunctionRegistry>,
    depth: usize,
}

impl EvaluationContext {
    pub fn new(resolver: ResolutionEngine, functions: Arc<FunctionRegistry>) -> Self {
        EvaluationContext {
            resolver,
            functions,
            depth: 0,
        }
    }

    pub fn resolver(&self) -> &ResolutionEngine {
        &self.resolver
    }

    pub fn functions(&self) -> &Arc<FunctionRegistry> {
        &self.functions
    }

    /// A context whose innermost scope frame holds `bindings`.
    pub fn with_locals(
        &self,
        bindings: impl IntoIterator<Item = (Reference, Option<Value>)>,
    ) -> Self {
        EvaluationContext {
            resolver: self.resolver.enter_scope(bindings),
            functions: Arc::clone(&self.functions),
            depth: self.depth,
        }
    }

    /// Number of function calls this context is nested in.
    pub fn call_depth(&self) -> usize {
        self.depth
    }

    pub fn resolve(&self, reference: &Reference) -> Result<Resolved> {
        self.resolver.resolve(reference)
    }

    pub fn resolve_or_fail(&self, reference: &Reference) -> Result<Option<Value>> {
        self.resolver.resolve_or_fail(reference)
    }

    /// Resolve a bare identifier from a formula.
    ///
    /// Local named values and labels win, then the label store, then the
    /// environment.
    pub fn resolve_name(&self, name: &str) -> Result<Option<Value>> {
        let named = ValueName::new(name).ok().map(Reference::NamedValue);
        let label = LabelName::new(name).ok().map(Reference::Label);
        let scope = self.resolver.scope();

        for reference in named.iter().chain(label.iter()) {
            if let Some(local) = scope.lookup(reference) {
                return Ok(local.clone());
            }
        }
        if let Some(label) = &label {
            if let Resolved::Found(value) = self.resolver.resolve(label)? {
                return Ok(value);
            }
        }
        if let Some(named) = &named {
            if let Resolved::Found(value) = self.resolver.resolve(named)? {
                return Ok(value);
            }
        }
        Err(ResolveError::NotFound {
            kind: ReferenceKind::NamedValue,
            reference: name.to_string(),
        })
    }

    /// Look a label up in the backing store. A label shadowed by a local
    /// binding has a value, not a target, so asking for its mapping fails.
    pub fn load_label(&self, label: &LabelName) -> Result<Option<LabelMapping>> {
        if self.is_local(label.as_str()) {
            return Err(ResolveError::InvalidUse(format!("Label {} has a value", label)));
        }
        self.resolver.loader().load_label(label)
    }

    pub fn function(&self, name: &str) -> Result<Arc<dyn ExpressionFunction>> {
        if self.is_local(name) {
            return Err(ResolveError::InvalidUse(format!(
                "Function name {} is a parameter and not an actual function",
                name
            )));
        }
        self.functions
            .get(name)
            .ok_or_else(|| ResolveError::UnknownFunction(name.to_string()))
    }

    pub fn is_pure(&self, name: &str) -> Result<bool> {
        Ok(self.function(name)?.is_pure())
    }

    /// Convert `args` to the function's parameters and apply it.
    pub fn call(&self, name: &str, args: Vec<Option<Value>>) -> Result<Option<Value>> {
        let function = self.function(name)?;
        let args = convert_arguments(args, function.parameters())?;
        if self.depth >= MAX_CALL_DEPTH {
            return Err(ResolveError::Evaluation(format!(
                "Function {} exceeded the maximum call depth of {}",
                function.name(),
                MAX_CALL_DEPTH
            )));
        }
        debug!(
            function = %function.name(),
            args = args.len(),
            depth = self.depth,
            "calling function"
        );
        let nested = EvaluationContext {
            depth: self.depth + 1,
            ..self.clone()
        };
        function.apply(args, &nested)
    }

    pub fn evaluate(&self, formula: &str) -> Result<Option<Value>> {
        evaluate_formula(self, formula)
    }

    /// True when `name` is bound in the scope chain as a named value or label.
    fn is_local(&self, name: &str) -> bool {
        let scope = self.resolver.scope();
        let named = ValueName::new(name)
            .map(|n| scope.is_bound(&Reference::NamedValue(n)))
            .unwrap_or(false);
        named
            || LabelName::new(name)
                .map(|l| scope.is_bound(&Reference::Label(l)))
                .unwrap_or(false)
    }
}
