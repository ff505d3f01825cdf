//! Fn values and application
//!
//! A [`Closure`] pairs an analyzed `fn*` node with the environment it was created in. Calls
//! pick a method by argument count, bind params in a fresh frame and run the body under a
//! per-invocation recur target, iterating natively on `recur`.

use std::cell::Cell;
use std::sync::Arc;

use tracing::trace;

use super::collections::Meta;
use super::environment::{Environment, RecurTarget};
use super::evaluator::Flow;
use super::Value;
use crate::ast::{FnMethodNode, FnNode};
use crate::error::{Error, Result};

thread_local! {
    static CALL_DEPTH: Cell<usize> = Cell::new(0);
}

/// Counts one level of non-tail fn nesting for as long as it lives
struct DepthGuard;

impl DepthGuard {
    fn enter(limit: usize) -> Result<Self> {
        CALL_DEPTH.with(|depth| {
            let next = depth.get() + 1;
            if next > limit {
                return Err(Error::ExecutionLimitExceeded { limit });
            }
            depth.set(next);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Closure produced by evaluating `fn*`
pub struct Closure {
    node: Arc<FnNode>,
    env: Environment,
    meta: Option<Meta>,
}

impl Closure {
    /// Closes `node` over `env`
    pub fn new(node: Arc<FnNode>, env: Environment, meta: Option<Meta>) -> Self {
        Closure { node, env, meta }
    }

    /// Analyzed `fn*` node
    pub fn node(&self) -> &Arc<FnNode> {
        &self.node
    }

    /// Self name, if the fn has one
    pub fn name(&self) -> Option<&str> {
        self.node.local.as_ref().map(|local| local.name.name())
    }

    /// Attached metadata
    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    /// Same fn with different metadata
    pub fn with_meta(&self, meta: Option<Meta>) -> Self {
        Closure {
            node: self.node.clone(),
            env: self.env.clone(),
            meta,
        }
    }

    /// Method for `argc` arguments: an exact fixed arity first, else the variadic method
    pub fn find_method(&self, argc: usize) -> Result<&FnMethodNode> {
        if let Some(method) = self
            .node
            .methods
            .iter()
            .find(|m| !m.variadic && m.fixed_arity == argc)
        {
            return Ok(method);
        }
        if let Some(method) = self
            .node
            .methods
            .iter()
            .find(|m| m.variadic && argc >= m.fixed_arity)
        {
            return Ok(method);
        }
        if !self.node.variadic && argc > self.node.max_fixed_arity {
            return Err(Error::illegal_argument(format!(
                "too many arguments ({})",
                argc
            )));
        }
        Err(Error::illegal_argument(format!(
            "wrong number of arguments ({})",
            argc
        )))
    }

    /// Calls the fn
    pub fn invoke(self: &Arc<Self>, args: Vec<Value>) -> Result<Value> {
        let runtime = self.env.runtime();
        let _depth = DepthGuard::enter(runtime.config().max_call_depth)?;
        let method = self.find_method(args.len())?;

        let base = match &self.node.local {
            Some(local) => self.env.bind(local.name.name_arc(), Value::Fn(self.clone())),
            None => self.env.clone(),
        };

        let target = RecurTarget::fresh();
        let mut args = bind_rest(method, args);
        loop {
            let frame = base
                .bind_all(
                    method
                        .params
                        .iter()
                        .map(|p| p.name.name_arc())
                        .zip(args),
                )
                .with_recur_target(Some(target));
            match frame.eval_flow(&method.body)? {
                Flow::Value(value) => return Ok(value),
                Flow::Recur { target: t, args: next } if t == target => {
                    runtime.check_cancelled()?;
                    trace!(fn_name = ?self.name(), "recur");
                    args = next;
                }
                Flow::Recur { .. } => {
                    return Err(Error::runtime("recur target not found in fn body"));
                }
            }
        }
    }
}

/// Collects extra args into the rest slot: `nil` when none, else a list
fn bind_rest(method: &FnMethodNode, mut args: Vec<Value>) -> Vec<Value> {
    if method.variadic {
        let rest = args.split_off(method.fixed_arity);
        args.push(if rest.is_empty() {
            Value::Nil
        } else {
            Value::list(rest)
        });
    }
    args
}

/// Applies any invocable value to `args`
///
/// Fns and natives run; Vars call their value; keywords and maps look up; sets test
/// membership; vectors index.
pub fn apply(f: &Value, args: Vec<Value>) -> Result<Value> {
    match f {
        Value::Fn(closure) => closure.invoke(args),
        Value::Native(tool) => {
            if let Some(arity) = tool.arity() {
                if arity != args.len() {
                    return Err(Error::illegal_argument(format!(
                        "wrong number of arguments ({}) passed to {}",
                        args.len(),
                        tool.name()
                    )));
                }
            }
            tool.execute(&args)
        }
        Value::Var(var) => {
            let value = var.get().map_err(|_| {
                Error::IllegalState(format!("Attempting to call unbound fn: {}", var))
            })?;
            apply(&value, args)
        }
        Value::Keyword(_) => {
            let (coll, default) = lookup_args(&args)?;
            Ok(lookup(coll, f).unwrap_or(default))
        }
        Value::Map(map) => {
            let (key, default) = lookup_args(&args)?;
            Ok(map.entries.get(key).cloned().unwrap_or(default))
        }
        Value::Set(set) => match args.as_slice() {
            [key] => Ok(if set.items.contains(key) {
                key.clone()
            } else {
                Value::Nil
            }),
            _ => Err(arity_error(args.len())),
        },
        Value::Vector(vector) => match args.as_slice() {
            [index] => {
                let i = index.as_int()?;
                usize::try_from(i)
                    .ok()
                    .and_then(|i| vector.items.get(i).cloned())
                    .ok_or(Error::IndexOutOfBounds {
                        index: i,
                        length: vector.items.len(),
                    })
            }
            _ => Err(arity_error(args.len())),
        },
        other => Err(Error::NotCallable {
            type_name: other.type_name().to_string(),
        }),
    }
}

fn arity_error(argc: usize) -> Error {
    Error::illegal_argument(format!("wrong number of arguments ({})", argc))
}

fn lookup_args(args: &[Value]) -> Result<(&Value, Value)> {
    match args {
        [first] => Ok((first, Value::Nil)),
        [first, default] => Ok((first, default.clone())),
        _ => Err(arity_error(args.len())),
    }
}

/// `get` semantics shared by keyword invocation and the core `get` fn
pub fn lookup(coll: &Value, key: &Value) -> Option<Value> {
    match coll {
        Value::Map(map) => map.entries.get(key).cloned(),
        Value::Set(set) => set.items.contains(key).then(|| key.clone()),
        Value::Vector(vector) => match key {
            Value::Int(i) => usize::try_from(*i)
                .ok()
                .and_then(|i| vector.items.get(i).cloned()),
            _ => None,
        },
        Value::String(s) => match key {
            Value::Int(i) => usize::try_from(*i)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(Value::Char),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        let map = Value::map([(Value::keyword("a"), Value::Int(1))]);
        assert_eq!(
            apply(&Value::keyword("a"), vec![map.clone()]).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            apply(&Value::keyword("b"), vec![map, Value::Int(0)]).unwrap(),
            Value::Int(0)
        );
    }

    #[test]
    fn test_collection_invocation() {
        let set = Value::set([Value::Int(1)]);
        assert_eq!(apply(&set, vec![Value::Int(1)]).unwrap(), Value::Int(1));
        assert_eq!(apply(&set, vec![Value::Int(2)]).unwrap(), Value::Nil);

        let v = Value::vector([Value::keyword("x")]);
        assert_eq!(apply(&v, vec![Value::Int(0)]).unwrap(), Value::keyword("x"));
        assert!(matches!(
            apply(&v, vec![Value::Int(3)]),
            Err(Error::IndexOutOfBounds { index: 3, length: 1 })
        ));
    }

    #[test]
    fn test_not_callable() {
        assert!(matches!(
            apply(&Value::Int(1), vec![]),
            Err(Error::NotCallable { .. })
        ));
    }
}
