//! Scope frames.
//!
//! An [`Environment`] is a handle to one frame in a chain. Frames are shared by
//! reference counting: a derived frame keeps its parent alive, and so does every
//! closure that captured it. Bindings within a frame are mutable in place; the
//! values stored in them are not.

use crate::ast::Value;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct Frame {
    bindings: FxHashMap<Rc<str>, Value>,
    parent: Option<Environment>,
}

/// Environment for variable bindings. Cloning shares the same frame.
#[derive(Clone)]
pub struct Environment {
    frame: Rc<RefCell<Frame>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::create()
    }
}

impl Environment {
    /// A new root frame with no parent.
    pub fn create() -> Self {
        Environment {
            frame: Rc::new(RefCell::new(Frame {
                bindings: FxHashMap::default(),
                parent: None,
            })),
        }
    }

    /// A new empty frame whose parent is `self`.
    pub fn derive(&self) -> Self {
        Environment {
            frame: Rc::new(RefCell::new(Frame {
                bindings: FxHashMap::default(),
                parent: Some(self.clone()),
            })),
        }
    }

    /// Bind `name` in this frame, replacing any existing binding here.
    pub fn set(&self, name: impl Into<Rc<str>>, value: Value) {
        self.frame.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Rebind `name` in the nearest frame that already binds it.
    /// Returns false, changing nothing, if no frame in the chain does.
    pub fn deep_update(&self, name: &str, value: Value) -> bool {
        let mut current = self.clone();
        loop {
            if current.shallow_update(name, value.clone()) {
                return true;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Rebind `name` only if this frame already binds it.
    pub fn shallow_update(&self, name: &str, value: Value) -> bool {
        match self.frame.borrow_mut().bindings.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Look `name` up through this frame and its ancestors.
    pub fn deep_lookup(&self, name: &str) -> Option<Value> {
        let mut current = self.clone();
        loop {
            if let Some(value) = current.shallow_lookup(name) {
                return Some(value);
            }
            current = current.parent()?;
        }
    }

    /// Look `name` up in this frame only, ignoring ancestors.
    pub fn shallow_lookup(&self, name: &str) -> Option<Value> {
        self.frame.borrow().bindings.get(name).cloned()
    }

    pub fn parent(&self) -> Option<Environment> {
        self.frame.borrow().parent.clone()
    }

    /// Number of frames between this one and the root.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent();
        while let Some(env) = current {
            depth += 1;
            current = env.parent();
        }
        depth
    }

    /// Names bound in this frame, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .frame
            .borrow()
            .bindings
            .keys()
            .map(|name| name.to_string())
            .collect();
        names.sort();
        names
    }

    /// True if both handles refer to the same frame.
    pub fn same_frame(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("bindings", &self.frame.borrow().bindings.len())
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inner_shadows_without_mutating_outer() {
        let outer = Environment::create();
        outer.set("x", Value::Number(1.0));
        let inner = outer.derive();
        inner.set("x", Value::Number(2.0));

        assert_eq!(inner.deep_lookup("x"), Some(Value::Number(2.0)));
        assert_eq!(outer.deep_lookup("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_deep_update_of_unbound_name_fails() {
        let outer = Environment::create();
        let inner = outer.derive();
        assert!(!inner.deep_update("y", Value::Number(3.0)));
        assert_eq!(inner.deep_lookup("y"), None);
        assert_eq!(outer.deep_lookup("y"), None);
    }

    #[test]
    fn test_deep_update_mutates_owning_frame() {
        let outer = Environment::create();
        outer.set("x", Value::Number(1.0));
        let inner = outer.derive();

        assert!(inner.deep_update("x", Value::Number(5.0)));
        assert_eq!(outer.shallow_lookup("x"), Some(Value::Number(5.0)));
        assert_eq!(inner.shallow_lookup("x"), None);
    }

    #[test]
    fn test_shallow_operations_ignore_parents() {
        let outer = Environment::create();
        outer.set("x", Value::Number(1.0));
        let inner = outer.derive();

        assert_eq!(inner.shallow_lookup("x"), None);
        assert!(!inner.shallow_update("x", Value::Number(9.0)));
        assert_eq!(outer.shallow_lookup("x"), Some(Value::Number(1.0)));

        inner.set("x", Value::Number(2.0));
        assert!(inner.shallow_update("x", Value::Number(3.0)));
        assert_eq!(inner.shallow_lookup("x"), Some(Value::Number(3.0)));
        assert_eq!(outer.shallow_lookup("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_set_overwrites_in_current_frame() {
        let env = Environment::create();
        env.set("x", Value::Number(1.0));
        env.set("x", Value::Number(2.0));
        assert_eq!(env.deep_lookup("x"), Some(Value::Number(2.0)));
        assert_eq!(env.names(), vec!["x".to_string()]);
    }

    #[test]
    fn test_clones_share_the_frame() {
        let env = Environment::create();
        let alias = env.clone();
        alias.set("a", Value::Nil);
        assert!(env.same_frame(&alias));
        assert_eq!(env.shallow_lookup("a"), Some(Value::Nil));
    }

    #[test]
    fn test_depth_and_parent() {
        let root = Environment::create();
        let child = root.derive();
        let grandchild = child.derive();
        assert_eq!(root.depth(), 0);
        assert_eq!(grandchild.depth(), 2);
        assert!(grandchild.parent().unwrap().same_frame(&child));
        assert!(root.parent().is_none());
    }
}
