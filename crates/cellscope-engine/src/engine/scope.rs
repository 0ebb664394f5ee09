//! Immutable chains of local bindings.
//!
//! A [`ScopeFrame`] maps references to nullable values and points at its
//! parent. Entering a nested scope (function parameters, template values,
//! label overrides) builds a new child frame; existing frames are never
//! mutated, so a frame can be shared by every evaluation that sees it.

use std::collections::HashMap;
use std::sync::Arc;

use super::reference::Reference;
use super::value::Value;

#[derive(Debug, Default)]
pub struct ScopeFrame {
    bindings: HashMap<Reference, Option<Value>>,
    parent: Option<Arc<ScopeFrame>>,
}

impl ScopeFrame {
    /// An empty frame with no parent.
    pub fn root() -> Arc<ScopeFrame> {
        Arc::new(ScopeFrame::default())
    }

    /// A root frame holding `bindings`.
    pub fn with_bindings(
        bindings: impl IntoIterator<Item = (Reference, Option<Value>)>,
    ) -> Arc<ScopeFrame> {
        Arc::new(ScopeFrame {
            bindings: bindings.into_iter().collect(),
            parent: None,
        })
    }

    /// A new frame chained to `parent`.
    pub fn child(
        parent: &Arc<ScopeFrame>,
        bindings: impl IntoIterator<Item = (Reference, Option<Value>)>,
    ) -> Arc<ScopeFrame> {
        Arc::new(ScopeFrame {
            bindings: bindings.into_iter().collect(),
            parent: Some(Arc::clone(parent)),
        })
    }

    pub fn parent(&self) -> Option<&Arc<ScopeFrame>> {
        self.parent.as_ref()
    }

    /// Entry in this frame only. The outer `Option` says whether the frame
    /// knows the reference; the inner one whether the known value is null.
    pub fn get(&self, reference: &Reference) -> Option<&Option<Value>> {
        self.bindings.get(reference)
    }

    /// First entry found walking from this frame outwards.
    pub fn lookup(&self, reference: &Reference) -> Option<&Option<Value>> {
        self.frames().find_map(|frame| frame.get(reference))
    }

    pub fn is_bound(&self, reference: &Reference) -> bool {
        self.lookup(reference).is_some()
    }

    /// This frame followed by its ancestors, innermost first.
    pub fn frames(&self) -> impl Iterator<Item = &ScopeFrame> {
        std::iter::successors(Some(self), |frame| frame.parent.as_deref())
    }

    /// Number of frames in the chain, including this one.
    pub fn depth(&self) -> usize {
        self.frames().count()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Reference {
        Reference::named_value(name).unwrap()
    }

    #[test]
    fn test_inner_frame_shadows_outer() {
        let outer = ScopeFrame::with_bindings([(named("x"), Some(Value::Number(1.0)))]);
        let inner = ScopeFrame::child(&outer, [(named("x"), Some(Value::Number(2.0)))]);

        assert_eq!(inner.lookup(&named("x")), Some(&Some(Value::Number(2.0))));
        assert_eq!(outer.lookup(&named("x")), Some(&Some(Value::Number(1.0))));
        assert_eq!(inner.depth(), 2);
    }

    #[test]
    fn test_null_binding_is_still_known() {
        let frame = ScopeFrame::with_bindings([(named("blank"), None)]);
        assert_eq!(frame.lookup(&named("blank")), Some(&None));
        assert!(frame.is_bound(&named("blank")));
        assert_eq!(frame.lookup(&named("other")), None);
    }

    #[test]
    fn test_lookup_reaches_ancestors() {
        let root = ScopeFrame::with_bindings([(named("a"), Some(Value::text("root")))]);
        let middle = ScopeFrame::child(&root, []);
        let leaf = ScopeFrame::child(&middle, [(named("b"), None)]);

        assert_eq!(leaf.lookup(&named("a")), Some(&Some(Value::text("root"))));
        assert!(leaf.get(&named("a")).is_none());
        assert_eq!(leaf.depth(), 3);
    }
}
