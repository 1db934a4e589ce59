use std::collections::HashMap;
use std::fmt;

use crate::value::{Value, ValueKind};

/// Binding classification: `let` entries may be reassigned, `const` entries
/// are write-once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Let,
    Const,
}

pub type Watcher = Box<dyn FnMut(&Value, &Value)>;

/// One named entry in the environment.
pub struct Binding {
    pub value: Value,
    pub declared_kind: Option<ValueKind>,
    pub scope: Scope,
    pub strict: bool,
    watchers: Vec<Watcher>,
}

impl Binding {
    fn trigger_watchers(&mut self, old: &Value, new: &Value) {
        for watcher in &mut self.watchers {
            watcher(old, new);
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Binding")
            .field("value", &self.value)
            .field("declared_kind", &self.declared_kind)
            .field("scope", &self.scope)
            .field("strict", &self.strict)
            .field("watchers", &self.watchers.len())
            .finish()
    }
}

/// Fields supplied to [`Environment::set`]. Absent fields are left untouched
/// when merging into an existing entry.
#[derive(Default)]
pub struct BindingUpdate {
    pub value: Option<Value>,
    pub declared_kind: Option<ValueKind>,
    pub scope: Option<Scope>,
    pub strict: Option<bool>,
}

impl BindingUpdate {
    pub fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    fn into_binding(self) -> Binding {
        Binding {
            value: self.value.unwrap_or_else(|| Value::Str(String::new())),
            declared_kind: self.declared_kind,
            scope: self.scope.unwrap_or(Scope::Let),
            strict: self.strict.unwrap_or(false),
            watchers: Vec::new(),
        }
    }
}

/// The shared symbol table. Names are unique; every nested block dispatches
/// against the same instance, so entries created inside a block outlive it.
#[derive(Debug, Default)]
pub struct Environment {
    bindings: HashMap<String, Binding>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Create the entry if absent; otherwise merge only the supplied fields.
    /// Watchers fire with (old, new) before the value field is replaced.
    pub fn set(&mut self, name: &str, update: BindingUpdate) {
        match self.bindings.get_mut(name) {
            None => {
                self.bindings.insert(name.to_string(), update.into_binding());
            }
            Some(binding) => {
                if let Some(new_value) = update.value {
                    let old = binding.value.clone();
                    binding.trigger_watchers(&old, &new_value);
                    binding.value = new_value;
                }
                if let Some(kind) = update.declared_kind {
                    binding.declared_kind = Some(kind);
                }
                if let Some(scope) = update.scope {
                    binding.scope = scope;
                }
                if let Some(strict) = update.strict {
                    binding.strict = strict;
                }
            }
        }
    }

    /// Register a change watcher; silently a no-op when the name is unknown.
    pub fn add_watcher(&mut self, name: &str, watcher: Watcher) {
        if let Some(binding) = self.bindings.get_mut(name) {
            binding.watchers.push(watcher);
        }
    }
}
