use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::Runtime;
use super::Value;
use crate::error::{Error, Result};

static NEXT_RECUR_TARGET: AtomicU64 = AtomicU64::new(1);

/// Identity of one loop or fn-method activation, matched by `recur`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecurTarget(u64);

impl RecurTarget {
    /// Allocates a target no other activation shares
    pub fn fresh() -> Self {
        RecurTarget(NEXT_RECUR_TARGET.fetch_add(1, Ordering::Relaxed))
    }
}

/// Single scope frame
struct Scope {
    /// Locals bound in this frame
    vars: RwLock<HashMap<Arc<str>, Value>>,
    /// Enclosing frame
    parent: Option<Arc<Scope>>,
}

/// Evaluation environment: local scope chain, active recur target and the shared runtime
///
/// Cloning is cheap; frames are shared, never copied. Closures capture an `Environment` and
/// keep its frames alive.
#[derive(Clone)]
pub struct Environment {
    scope: Option<Arc<Scope>>,
    recur_target: Option<RecurTarget>,
    runtime: Arc<Runtime>,
}

impl Environment {
    /// Top-level environment with no locals
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Environment {
            scope: None,
            recur_target: None,
            runtime,
        }
    }

    /// Shared runtime (namespaces, host types, config)
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Child environment with one new local
    pub fn bind(&self, name: Arc<str>, value: Value) -> Self {
        let mut vars = HashMap::with_capacity(1);
        vars.insert(name, value);
        self.push_frame(vars)
    }

    /// Child environment with all `bindings` in one frame
    pub fn bind_all(&self, bindings: impl IntoIterator<Item = (Arc<str>, Value)>) -> Self {
        self.push_frame(bindings.into_iter().collect())
    }

    fn push_frame(&self, vars: HashMap<Arc<str>, Value>) -> Self {
        Environment {
            scope: Some(Arc::new(Scope {
                vars: RwLock::new(vars),
                parent: self.scope.clone(),
            })),
            recur_target: self.recur_target,
            runtime: self.runtime.clone(),
        }
    }

    /// Replaces a local in the innermost frame that binds it
    ///
    /// Used by `letfn*` to fill in names that were bound before their fns existed.
    pub fn assign(&self, name: &str, value: Value) -> Result<()> {
        let mut scope = self.scope.as_ref();
        while let Some(frame) = scope {
            let mut vars = frame.vars.write();
            if let Some(slot) = vars.get_mut(name) {
                *slot = value;
                return Ok(());
            }
            drop(vars);
            scope = frame.parent.as_ref();
        }
        Err(Error::UnresolvedSymbol {
            name: name.to_string(),
        })
    }

    /// Value of a local, innermost binding first
    pub fn lookup(&self, name: &str) -> Result<Value> {
        let mut scope = self.scope.as_ref();
        while let Some(frame) = scope {
            if let Some(value) = frame.vars.read().get(name) {
                return Ok(value.clone());
            }
            scope = frame.parent.as_ref();
        }
        Err(Error::UnresolvedSymbol {
            name: name.to_string(),
        })
    }

    /// Same scope with a different active recur target
    pub fn with_recur_target(&self, target: Option<RecurTarget>) -> Self {
        Environment {
            scope: self.scope.clone(),
            recur_target: target,
            runtime: self.runtime.clone(),
        }
    }

    /// Active recur target
    pub fn recur_target(&self) -> Option<RecurTarget> {
        self.recur_target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::EvalConfig;

    fn env() -> Environment {
        Environment::new(Arc::new(Runtime::new(EvalConfig::default())))
    }

    #[test]
    fn test_shadowing() {
        let outer = env().bind(Arc::from("x"), Value::Int(1));
        let inner = outer.bind(Arc::from("x"), Value::Int(2));
        assert_eq!(inner.lookup("x").unwrap(), Value::Int(2));
        assert_eq!(outer.lookup("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_missing_local() {
        assert!(matches!(
            env().lookup("nope"),
            Err(Error::UnresolvedSymbol { .. })
        ));
    }

    #[test]
    fn test_assign_is_visible_to_captured_children() {
        let frame = env().bind(Arc::from("f"), Value::Nil);
        let child = frame.bind(Arc::from("y"), Value::Int(0));
        frame.assign("f", Value::Int(7)).unwrap();
        assert_eq!(child.lookup("f").unwrap(), Value::Int(7));
    }

    #[test]
    fn test_recur_target_is_scoped() {
        let target = RecurTarget::fresh();
        let base = env();
        let looping = base.with_recur_target(Some(target));
        assert_eq!(looping.recur_target(), Some(target));
        assert_eq!(looping.bind(Arc::from("i"), Value::Int(0)).recur_target(), Some(target));
        assert_eq!(base.recur_target(), None);
    }
}
