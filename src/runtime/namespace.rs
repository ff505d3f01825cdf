//! Namespaces and the namespace registry

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::host::HostType;
use super::symbol::Symbol;
use super::var::Var;
use super::Value;
use crate::error::{Error, Result};

/// Namespace holding the core functions and macros
pub const CORE_NS: &str = "clojure.core";

/// Namespace user code starts in
pub const DEFAULT_NS: &str = "user";

/// Named mapping from unqualified symbols to Vars and imported host types
pub struct Namespace {
    name: Symbol,
    mappings: DashMap<Arc<str>, Value>,
    aliases: DashMap<Arc<str>, Arc<Namespace>>,
}

impl Namespace {
    /// Empty namespace
    pub fn new(name: Symbol) -> Self {
        Namespace {
            name,
            mappings: DashMap::new(),
            aliases: DashMap::new(),
        }
    }

    /// Namespace name
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Finds or creates the Var named `sym` in this namespace
    ///
    /// Concurrent interning of the same name yields the same Var. A mapping that refers to a
    /// Var from another namespace, or to an imported type, is replaced.
    pub fn intern(&self, sym: &Symbol) -> Result<Arc<Var>> {
        if sym.ns().is_some() {
            return Err(Error::illegal_argument(format!(
                "can't intern namespace-qualified symbol: {}",
                sym
            )));
        }
        Ok(self.intern_simple(sym))
    }

    /// Finds or creates the Var for an unqualified `sym`, ignoring any namespace part
    pub fn intern_simple(&self, sym: &Symbol) -> Arc<Var> {
        match self.mappings.entry(sym.name_arc()) {
            Entry::Occupied(mut entry) => {
                if let Value::Var(var) = entry.get() {
                    if var.ns() == &self.name {
                        return var.clone();
                    }
                }
                let var = self.new_var(sym);
                entry.insert(Value::Var(var.clone()));
                var
            }
            Entry::Vacant(entry) => {
                let var = self.new_var(sym);
                entry.insert(Value::Var(var.clone()));
                var
            }
        }
    }

    fn new_var(&self, sym: &Symbol) -> Arc<Var> {
        debug!(ns = %self.name, name = %sym.name(), "interning var");
        let var = Arc::new(Var::new(self.name.clone(), sym.without_ns().with_meta(None)));
        var.set_meta(Default::default());
        var
    }

    /// Mapping for an unqualified name
    pub fn get_mapping(&self, name: &str) -> Option<Value> {
        self.mappings.get(name).map(|entry| entry.value().clone())
    }

    /// Var mapped under `name`, if the mapping is a Var
    pub fn find_var(&self, name: &str) -> Option<Arc<Var>> {
        match self.get_mapping(name)? {
            Value::Var(var) => Some(var),
            _ => None,
        }
    }

    /// Maps `name` to a Var owned elsewhere
    pub fn refer(&self, name: &str, var: Arc<Var>) {
        self.mappings.insert(Arc::from(name), Value::Var(var));
    }

    /// Maps a host type under its simple name
    pub fn import(&self, ty: Arc<HostType>) {
        self.mappings
            .insert(Arc::from(ty.name()), Value::Class(ty));
    }

    /// Registers `alias` as a short name for `ns`
    pub fn add_alias(&self, alias: &str, ns: Arc<Namespace>) {
        self.aliases.insert(Arc::from(alias), ns);
    }

    /// Namespace registered under `alias`
    pub fn lookup_alias(&self, alias: &str) -> Option<Arc<Namespace>> {
        self.aliases.get(alias).map(|entry| entry.value().clone())
    }

    /// Snapshot of all mappings, sorted by name
    pub fn mappings(&self) -> Vec<(Arc<str>, Value)> {
        let mut all: Vec<_> = self
            .mappings
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

/// All namespaces of a runtime, keyed by name
#[derive(Default)]
pub struct NamespaceRegistry {
    namespaces: DashMap<Arc<str>, Arc<Namespace>>,
}

impl NamespaceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace named `name`, created if absent
    pub fn find_or_create(&self, name: &Symbol) -> Arc<Namespace> {
        self.namespaces
            .entry(name.name_arc())
            .or_insert_with(|| Arc::new(Namespace::new(name.without_ns().with_meta(None))))
            .value()
            .clone()
    }

    /// Existing namespace named `name`
    pub fn find_namespace(&self, name: &Symbol) -> Option<Arc<Namespace>> {
        self.namespaces
            .get(name.name())
            .map(|entry| entry.value().clone())
    }

    /// The core namespace
    pub fn core(&self) -> Arc<Namespace> {
        self.find_or_create(&Symbol::simple(CORE_NS))
    }

    /// Resolves `sym` as seen from `current`
    ///
    /// Qualified symbols go through `current`'s aliases, then the registry. Unqualified symbols
    /// look in `current`, then fall back to the core namespace.
    pub fn resolve(&self, sym: &Symbol, current: &Namespace) -> Option<Value> {
        match sym.ns() {
            Some(ns) => {
                let target = current
                    .lookup_alias(ns)
                    .or_else(|| self.find_namespace(&Symbol::simple(ns)))?;
                target.get_mapping(sym.name())
            }
            None => current.get_mapping(sym.name()).or_else(|| {
                if current.name().name() == CORE_NS {
                    None
                } else {
                    self.core().get_mapping(sym.name())
                }
            }),
        }
    }

    /// Unbinds every Var root and drops all namespaces
    ///
    /// Fns stored in Var roots hold their defining environment, which holds the runtime; this
    /// breaks those cycles when an interpreter shuts down.
    pub(crate) fn clear(&self) {
        for entry in self.namespaces.iter() {
            let ns = entry.value();
            for mapping in ns.mappings.iter() {
                if let Value::Var(var) = mapping.value() {
                    var.unbind_root();
                }
            }
            ns.mappings.clear();
            ns.aliases.clear();
        }
        self.namespaces.clear();
    }

    /// Names of all namespaces, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .namespaces
            .iter()
            .map(|entry| entry.key().to_string())
            .collect();
        names.sort();
        names
    }
}
