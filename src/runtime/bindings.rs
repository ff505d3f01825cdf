//! Per-thread dynamic binding frames for Vars
//!
//! Each push copies the enclosing frame and overlays the new bindings, so the top frame always
//! holds every active binding. Frames share binding cells rather than values: a `set!` under a
//! nested frame updates the binding the outer frame sees too. [`BindingGuard`] pops on drop,
//! restoring the outer bindings on every exit path.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::var::Var;
use super::Value;
use crate::error::{Error, Result};

/// One thread binding, shared by every frame that inherits it
type BindingCell = Arc<RwLock<Value>>;

type Frame = HashMap<usize, (Arc<Var>, BindingCell)>;

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

fn key(var: &Var) -> usize {
    var as *const Var as usize
}

/// Pushes a frame binding each Var to its value on this thread
pub fn push_thread_bindings(bindings: Vec<(Arc<Var>, Value)>) -> Result<()> {
    let mut frame = FRAMES.with(|frames| frames.borrow().last().cloned().unwrap_or_default());
    for (var, value) in bindings {
        if !var.is_dynamic() {
            return Err(Error::IllegalState(format!(
                "cannot dynamically bind non-dynamic var: {}",
                var
            )));
        }
        var.mark_thread_bound();
        frame.insert(key(&var), (var, Arc::new(RwLock::new(value))));
    }
    FRAMES.with(|frames| frames.borrow_mut().push(frame));
    Ok(())
}

/// Pops the innermost frame pushed on this thread
pub fn pop_thread_bindings() -> Result<()> {
    FRAMES.with(|frames| {
        frames
            .borrow_mut()
            .pop()
            .map(|_| ())
            .ok_or_else(|| Error::IllegalState("pop without matching push".to_string()))
    })
}

/// Innermost thread binding of `var`
pub fn lookup(var: &Var) -> Option<Value> {
    FRAMES.with(|frames| {
        frames
            .borrow()
            .last()
            .and_then(|frame| frame.get(&key(var)).map(|(_, cell)| cell.read().clone()))
    })
}

/// Replaces the innermost thread binding of `var`; false when it has none
pub fn set_binding(var: &Var, value: Value) -> bool {
    FRAMES.with(|frames| {
        match frames.borrow().last().and_then(|frame| frame.get(&key(var))) {
            Some((_, cell)) => {
                *cell.write() = value;
                true
            }
            None => false,
        }
    })
}

/// Number of frames currently pushed on this thread
pub fn depth() -> usize {
    FRAMES.with(|frames| frames.borrow().len())
}

/// Scoped thread bindings, popped when dropped
pub struct BindingGuard {
    _private: (),
}

impl BindingGuard {
    /// Pushes `bindings` for the lifetime of the guard
    pub fn push(bindings: Vec<(Arc<Var>, Value)>) -> Result<Self> {
        push_thread_bindings(bindings)?;
        Ok(BindingGuard { _private: () })
    }
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        let _ = pop_thread_bindings();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Symbol;

    fn dynamic_var(name: &str) -> Arc<Var> {
        let var = Arc::new(Var::new(Symbol::simple("user"), Symbol::simple(name)));
        var.set_dynamic(true);
        var
    }

    #[test]
    fn test_guard_restores_root() {
        let var = dynamic_var("*x*");
        var.bind_root(Value::Int(1));
        {
            let _guard = BindingGuard::push(vec![(var.clone(), Value::Int(2))]).unwrap();
            assert_eq!(var.get().unwrap(), Value::Int(2));
            var.set(Value::Int(3)).unwrap();
            assert_eq!(var.get().unwrap(), Value::Int(3));
        }
        assert_eq!(var.get().unwrap(), Value::Int(1));
    }

    #[test]
    fn test_nested_frames_inherit_outer() {
        let a = dynamic_var("*a*");
        let b = dynamic_var("*b*");
        let _outer = BindingGuard::push(vec![(a.clone(), Value::Int(1))]).unwrap();
        {
            let _inner = BindingGuard::push(vec![(b.clone(), Value::Int(2))]).unwrap();
            assert_eq!(lookup(&a), Some(Value::Int(1)));
            assert_eq!(lookup(&b), Some(Value::Int(2)));
        }
        assert_eq!(lookup(&b), None);
    }

    #[test]
    fn test_set_in_nested_frame_reaches_outer_binding() {
        let var = dynamic_var("*shared*");
        var.bind_root(Value::Int(0));
        let _outer = BindingGuard::push(vec![(var.clone(), Value::Int(1))]).unwrap();
        {
            let _inner = BindingGuard::push(vec![]).unwrap();
            var.set(Value::Int(5)).unwrap();
        }
        assert_eq!(var.get().unwrap(), Value::Int(5));

        {
            let _rebound = BindingGuard::push(vec![(var.clone(), Value::Int(7))]).unwrap();
            var.set(Value::Int(8)).unwrap();
        }
        assert_eq!(var.get().unwrap(), Value::Int(5));
    }

    #[test]
    fn test_non_dynamic_var_rejected() {
        let var = Arc::new(Var::new(Symbol::simple("user"), Symbol::simple("plain")));
        let before = depth();
        let err = push_thread_bindings(vec![(var, Value::Nil)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot dynamically bind non-dynamic var: #'user/plain"
        );
        assert_eq!(depth(), before);
    }

    #[test]
    fn test_unbalanced_pop() {
        assert!(pop_thread_bindings().is_err());
    }
}
