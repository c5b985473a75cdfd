//! Scoped variable environment for the directive evaluator.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::Value;

/// A single scope level, shared with the closures created inside it.
type Scope = Rc<RefCell<IndexMap<String, Value>>>;

fn new_scope() -> Scope {
    Rc::new(RefCell::new(IndexMap::new()))
}

/// Scoped variable environment with push/pop semantics.
///
/// The outermost scope is the directive namespace. Variables are looked up
/// from the innermost scope outward. `define` creates in the innermost
/// scope unless the name was declared `global`, which binds it in the
/// namespace. `set` updates the first scope where the variable exists.
///
/// Cloning an environment shares its scopes, which is how closures see
/// later updates to the variables they captured.
#[derive(Clone)]
pub struct Env {
    scopes: Vec<Scope>,
    globals: Rc<RefCell<HashSet<String>>>,
}

impl Env {
    /// Create a new environment holding only an empty namespace.
    pub fn new() -> Self {
        Self {
            scopes: vec![new_scope()],
            globals: Rc::new(RefCell::new(HashSet::new())),
        }
    }

    /// Push a new scope (for blocks and calls).
    pub fn push_scope(&mut self) {
        self.scopes.push(new_scope());
    }

    /// Pop the innermost scope. The namespace is never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Mark `name` as living in the namespace for this whole directive.
    pub fn declare_global(&self, name: &str) {
        self.globals.borrow_mut().insert(name.to_string());
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.globals.borrow().contains(name)
    }

    pub fn define(&self, name: &str, value: Value) {
        let scope = if self.is_global(name) {
            self.scopes.first()
        } else {
            self.scopes.last()
        };
        if let Some(scope) = scope {
            scope.borrow_mut().insert(name.to_string(), value);
        }
    }

    /// Look up a variable, searching from innermost to outermost scope.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.borrow().get(name).cloned())
    }

    /// Update a variable in the first scope where it exists.
    ///
    /// A declared global is bound in the namespace even if it has no value
    /// yet. Returns `false` if nothing was updated.
    pub fn set(&self, name: &str, value: Value) -> bool {
        for scope in self.scopes.iter().rev() {
            let mut scope = scope.borrow_mut();
            if let Some(slot) = scope.get_mut(name) {
                *slot = value;
                return true;
            }
        }
        if self.is_global(name) {
            self.define(name, value);
            return true;
        }
        false
    }

    /// Bind directly in the namespace.
    pub fn define_namespace(&self, name: &str, value: Value) {
        if let Some(root) = self.scopes.first() {
            root.borrow_mut().insert(name.to_string(), value);
        }
    }

    /// Look up a namespace binding, ignoring any inner scope.
    pub fn namespace_get(&self, name: &str) -> Option<Value> {
        self.scopes
            .first()
            .and_then(|root| root.borrow().get(name).cloned())
    }

    /// Names bound in the namespace, in binding order.
    pub fn namespace_names(&self) -> Vec<String> {
        self.scopes
            .first()
            .map(|root| root.borrow().keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
