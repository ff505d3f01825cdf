//! Vars: named, mutable global bindings
//!
//! A Var has an optional root value shared by every thread, and may be rebound per thread
//! when it is dynamic (see [`crate::runtime::bindings`]).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{ReentrantMutex, RwLock};
use tracing::debug;

use super::bindings;
use super::collections::Meta;
use super::symbol::Symbol;
use super::Value;
use crate::error::{Error, Result};

/// Global binding from a namespace-qualified symbol to a value
pub struct Var {
    ns: Symbol,
    sym: Symbol,
    root: RwLock<Option<Value>>,
    meta: RwLock<Meta>,
    dynamic: AtomicBool,
    macro_flag: AtomicBool,
    thread_bound: AtomicBool,
    sync: ReentrantMutex<()>,
}

impl Var {
    /// Unbound Var named `sym` in the namespace named `ns`
    pub fn new(ns: Symbol, sym: Symbol) -> Self {
        Var {
            ns,
            sym,
            root: RwLock::new(None),
            meta: RwLock::new(Meta::new()),
            dynamic: AtomicBool::new(false),
            macro_flag: AtomicBool::new(false),
            thread_bound: AtomicBool::new(false),
            sync: ReentrantMutex::new(()),
        }
    }

    /// Owning namespace name
    pub fn ns(&self) -> &Symbol {
        &self.ns
    }

    /// Unqualified name
    pub fn sym(&self) -> &Symbol {
        &self.sym
    }

    /// `ns/name`
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.ns.name(), self.sym.name())
    }

    /// Current value: the innermost thread binding, else the root
    pub fn get(&self) -> Result<Value> {
        if self.thread_bound.load(Ordering::Acquire) {
            if let Some(value) = bindings::lookup(self) {
                return Ok(value);
            }
        }
        self.root.read().clone().ok_or_else(|| Error::UnboundVar {
            name: self.qualified_name(),
        })
    }

    /// Root value, ignoring thread bindings
    pub fn get_root(&self) -> Option<Value> {
        self.root.read().clone()
    }

    /// Assigns the current thread binding; roots are never changed this way
    pub fn set(&self, value: Value) -> Result<Value> {
        if self.thread_bound.load(Ordering::Acquire) && bindings::set_binding(self, value.clone()) {
            return Ok(value);
        }
        Err(Error::IllegalState(format!(
            "can't change/establish root binding of: {} with set",
            self
        )))
    }

    /// Replaces the root value
    pub fn bind_root(&self, value: Value) {
        let _guard = self.sync.lock();
        *self.root.write() = Some(value);
    }

    /// Applies `f` to the root value atomically with respect to other root updates
    pub fn alter_root<F>(&self, f: F) -> Result<Value>
    where
        F: FnOnce(Option<Value>) -> Result<Value>,
    {
        let _guard = self.sync.lock();
        let current = self.root.read().clone();
        let next = f(current)?;
        *self.root.write() = Some(next.clone());
        Ok(next)
    }

    pub(crate) fn unbind_root(&self) {
        *self.root.write() = None;
    }

    /// Whether a root value is present
    pub fn has_root(&self) -> bool {
        self.root.read().is_some()
    }

    /// Whether a value is visible to this thread
    pub fn is_bound(&self) -> bool {
        self.has_root() || (self.thread_bound.load(Ordering::Acquire) && bindings::lookup(self).is_some())
    }

    /// Whether the Var holds a macro
    pub fn is_macro(&self) -> bool {
        self.macro_flag.load(Ordering::Acquire)
    }

    /// Sets or clears the macro flag, keeping `:macro` in the metadata in step
    pub fn set_macro(&self, is_macro: bool) {
        debug!(var = %self, is_macro, "setting macro flag");
        self.macro_flag.store(is_macro, Ordering::Release);
        let mut meta = self.meta.write();
        if is_macro {
            meta.insert(Value::keyword("macro"), Value::Bool(true));
        } else {
            meta.remove(&Value::keyword("macro"));
        }
    }

    /// Whether the Var may be dynamically rebound
    pub fn is_dynamic(&self) -> bool {
        self.dynamic.load(Ordering::Acquire)
    }

    /// Sets the dynamic flag
    pub fn set_dynamic(&self, dynamic: bool) {
        self.dynamic.store(dynamic, Ordering::Release);
    }

    pub(crate) fn mark_thread_bound(&self) {
        self.thread_bound.store(true, Ordering::Release);
    }

    /// Metadata snapshot
    pub fn meta(&self) -> Meta {
        self.meta.read().clone()
    }

    /// Replaces the metadata; `:ns` and `:name` always describe this Var
    pub fn set_meta(&self, meta: Meta) {
        let mut meta = meta;
        meta.insert(Value::keyword("name"), Value::Symbol(self.sym.clone()));
        meta.insert(Value::keyword("ns"), Value::Symbol(self.ns.clone()));
        *self.meta.write() = meta;
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#'{}/{}", self.ns.name(), self.sym.name())
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Var {
        Var::new(Symbol::simple("user"), Symbol::simple(name))
    }

    #[test]
    fn test_unbound_var() {
        let v = var("x");
        assert!(!v.is_bound());
        match v.get() {
            Err(Error::UnboundVar { name }) => assert_eq!(name, "user/x"),
            other => panic!("expected unbound var, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_set_without_thread_binding_fails() {
        let v = var("x");
        v.bind_root(Value::Int(1));
        let err = v.set(Value::Int(2)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "can't change/establish root binding of: #'user/x with set"
        );
        assert_eq!(v.get().unwrap(), Value::Int(1));
    }

    #[test]
    fn test_alter_root() {
        let v = var("counter");
        v.bind_root(Value::Int(1));
        let next = v
            .alter_root(|old| Ok(Value::Int(old.unwrap().as_int()? + 1)))
            .unwrap();
        assert_eq!(next, Value::Int(2));
        assert_eq!(v.get_root(), Some(Value::Int(2)));
    }

    #[test]
    fn test_meta_tracks_name() {
        let v = var("y");
        v.set_meta(Meta::new());
        assert_eq!(
            v.meta().get(&Value::keyword("name")),
            Some(&Value::symbol("y"))
        );
    }
}
