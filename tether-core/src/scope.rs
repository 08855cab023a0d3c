//! Scopes
//!
//! A [`Scope`] is what expressions are evaluated against: a reactive
//! [`Object`] of local names plus an optional parent scope. The instance's
//! data object is the root scope; every rendered list item gets a child
//! scope holding its alias and index, delegating everything else to the
//! scope the list was compiled in.

use std::fmt;
use std::rc::Rc;

use crate::reactive::Object;
use crate::value::Value;

/// A chain of reactive objects searched innermost first.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

struct ScopeInner {
    locals: Object,
    parent: Option<Scope>,
}

impl Scope {
    /// Create a root scope over `data`.
    pub fn root(data: Object) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                locals: data,
                parent: None,
            }),
        }
    }

    /// Create a child scope whose own names are `locals`.
    pub fn child(&self, locals: Object) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                locals,
                parent: Some(self.clone()),
            }),
        }
    }

    pub fn locals(&self) -> &Object {
        &self.inner.locals
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// The outermost scope's data object.
    pub fn root_data(&self) -> &Object {
        match &self.inner.parent {
            Some(parent) => parent.root_data(),
            None => &self.inner.locals,
        }
    }

    /// The innermost scope that defines `name`, if any.
    fn owner(&self, name: &str) -> Option<&Scope> {
        if self.inner.locals.contains_key(name) {
            return Some(self);
        }
        self.inner.parent.as_ref().and_then(|parent| parent.owner(name))
    }

    /// Resolve a free identifier.
    ///
    /// A name no scope defines is read from the root as a missing key, so
    /// the reader is notified if the root gains that key later.
    pub fn lookup(&self, name: &str) -> Value {
        match self.owner(name) {
            Some(scope) => scope.inner.locals.get(name),
            None => self.root_data().get(name),
        }
    }

    /// Write a free identifier: to the innermost scope that defines it,
    /// otherwise to the root.
    pub fn assign(&self, name: &str, value: Value) {
        match self.owner(name) {
            Some(scope) => scope.inner.locals.set(name, value),
            None => self.root_data().set(name, value),
        }
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("locals", &self.inner.locals.keys())
            .field("is_root", &self.is_root())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::observe;

    fn observed(pairs: Vec<(&str, Value)>) -> Object {
        let obj = Object::from_pairs(pairs);
        observe(&Value::Object(obj.clone()));
        obj
    }

    #[test]
    fn child_shadows_parent() {
        let root = Scope::root(observed(vec![("name", Value::from("root")), ("shared", Value::from(1))]));
        let child = root.child(observed(vec![("name", Value::from("item"))]));

        assert_eq!(child.lookup("name"), Value::from("item"));
        assert_eq!(child.lookup("shared"), Value::from(1));
        assert_eq!(child.lookup("missing"), Value::Undefined);
    }

    #[test]
    fn assign_targets_the_defining_scope() {
        let root = Scope::root(observed(vec![("shared", Value::from(1))]));
        let child = root.child(observed(vec![("item", Value::from("a"))]));

        child.assign("item", Value::from("b"));
        child.assign("shared", Value::from(2));
        child.assign("fresh", Value::from(3));

        assert_eq!(child.locals().get_untracked("item"), Value::from("b"));
        assert_eq!(root.locals().get_untracked("shared"), Value::from(2));
        assert_eq!(root.locals().get_untracked("fresh"), Value::from(3));
        assert!(!child.locals().contains_key("fresh"));
    }

    #[test]
    fn root_data_walks_to_the_top() {
        let data = observed(vec![]);
        let root = Scope::root(data.clone());
        let grandchild = root.child(Object::new()).child(Object::new());
        assert!(grandchild.root_data().ptr_eq(&data));
    }
}
