//! Shared runtime state: namespaces, host types, configuration and cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::config::EvalConfig;
use super::host::{HostRegistry, HostType};
use super::namespace::{Namespace, NamespaceRegistry, CORE_NS, DEFAULT_NS};
use super::symbol::Symbol;
use super::Value;
use crate::error::{Error, Result};

/// Cooperative cancellation flag, checked at every invocation
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clears a previous request
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State shared by every environment of one interpreter
pub struct Runtime {
    namespaces: NamespaceRegistry,
    host: Arc<HostRegistry>,
    config: EvalConfig,
    cancel: CancellationToken,
    current_ns: RwLock<Arc<Namespace>>,
}

impl Runtime {
    /// Runtime with the core and user namespaces and the built-in host types imported
    pub fn new(config: EvalConfig) -> Self {
        let namespaces = NamespaceRegistry::new();
        let host = Arc::new(HostRegistry::new());
        let core = namespaces.core();
        for ty in host.types() {
            core.import(ty);
        }
        let user = namespaces.find_or_create(&Symbol::simple(DEFAULT_NS));
        Runtime {
            namespaces,
            host,
            config,
            cancel: CancellationToken::new(),
            current_ns: RwLock::new(user),
        }
    }

    /// Namespace registry
    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    /// Host type registry
    pub fn host(&self) -> &Arc<HostRegistry> {
        &self.host
    }

    /// Evaluator settings
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Token that cancels evaluations on this runtime
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fails with [`Error::Cancelled`] once cancellation was requested
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Namespace new definitions go into
    pub fn current_ns(&self) -> Arc<Namespace> {
        self.current_ns.read().clone()
    }

    /// Switches the current namespace, creating it if needed
    pub fn set_current_ns(&self, name: &Symbol) -> Arc<Namespace> {
        let ns = self.namespaces.find_or_create(name);
        *self.current_ns.write() = ns.clone();
        ns
    }

    /// The core namespace
    pub fn core(&self) -> Arc<Namespace> {
        self.namespaces.core()
    }

    /// Resolves a symbol against the current namespace
    pub fn resolve(&self, sym: &Symbol) -> Option<Value> {
        self.namespaces.resolve(sym, &self.current_ns())
    }

    /// Registers a host type and makes it visible by simple name
    pub fn register_type(&self, ty: Arc<HostType>) {
        self.host.register(ty.clone());
        self.core().import(ty);
    }

    /// Drops every namespace mapping, releasing Vars and the fns they hold
    pub(crate) fn clear(&self) {
        self.namespaces.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_in_user_namespace() {
        let rt = Runtime::new(EvalConfig::default());
        assert_eq!(rt.current_ns().name().name(), DEFAULT_NS);
        assert!(rt.namespaces().find_namespace(&Symbol::simple(CORE_NS)).is_some());
    }

    #[test]
    fn test_host_types_resolve_by_name() {
        let rt = Runtime::new(EvalConfig::default());
        assert!(matches!(
            rt.resolve(&Symbol::simple("ExceptionInfo")),
            Some(Value::Class(_))
        ));
    }

    #[test]
    fn test_cancellation() {
        let rt = Runtime::new(EvalConfig::default());
        assert!(rt.check_cancelled().is_ok());
        rt.cancellation_token().cancel();
        assert!(matches!(rt.check_cancelled(), Err(Error::Cancelled)));
    }
}
