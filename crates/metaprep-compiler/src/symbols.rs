//! The run's symbol table: values exported by directives that already ran.

use indexmap::IndexMap;
use metaprep_eval::{Env, Value};

use crate::directive::MetaDirective;

/// Identifier → exported value, in export order. Only ever grows.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    values: IndexMap<String, Value>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// A fresh namespace for `directive` holding deep copies of its imports.
    ///
    /// Imports missing from the table are left unbound; the scheduler
    /// guarantees they are present.
    pub fn namespace_for(&self, directive: &MetaDirective) -> Env {
        let env = Env::new();
        for decl in directive.imports() {
            if let Some(value) = self.values.get(&decl.name) {
                env.define_namespace(&decl.name, value.deep_copy());
            }
        }
        env
    }

    /// Record the definitions of `directive` bound in `env`. Returns the
    /// first definition with no binding.
    pub fn merge(&mut self, directive: &MetaDirective, env: &Env) -> Result<(), String> {
        let mut bound = Vec::new();
        for decl in directive.definitions() {
            match env.namespace_get(&decl.name) {
                Some(value) => bound.push((decl.name.clone(), value)),
                None => return Err(decl.name.clone()),
            }
        }
        self.values.extend(bound);
        Ok(())
    }
}
