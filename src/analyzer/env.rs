use std::sync::Arc;

use im::OrdMap;

use crate::ast::{LocalKind, LoopId};
use crate::runtime::Symbol;

/// Position of the form being analyzed relative to its enclosing form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    /// Value is used
    Expr,
    /// Value is discarded
    Statement,
    /// Value is the result of the enclosing loop or fn method
    Return,
}

/// Local visible to the form being analyzed
#[derive(Debug, Clone)]
pub struct LocalBinding {
    pub name: Symbol,
    pub local: LocalKind,
    pub arg_id: Option<usize>,
    pub variadic: bool,
}

impl LocalBinding {
    /// Local without param information
    pub fn new(name: Symbol, local: LocalKind) -> Self {
        LocalBinding {
            name,
            local,
            arg_id: None,
            variadic: false,
        }
    }
}

/// Analysis environment
///
/// Persistent: every `with_*` method returns an extended copy and leaves `self` untouched.
#[derive(Debug, Clone)]
pub struct Env {
    /// Locals by name
    pub locals: OrdMap<Arc<str>, LocalBinding>,
    pub context: Context,
    /// Namespace symbols resolve in
    pub ns: Symbol,
    /// Innermost `loop*` or fn method
    pub loop_id: Option<LoopId>,
    /// Number of locals `recur` must supply
    pub loop_locals: Option<usize>,
    /// Inside a `try` body with no `loop*` or `fn*` in between
    pub in_try: bool,
}

impl Env {
    /// Top-level environment in namespace `ns`
    pub fn new(ns: Symbol) -> Self {
        Env {
            locals: OrdMap::new(),
            context: Context::Expr,
            ns,
            loop_id: None,
            loop_locals: None,
            in_try: false,
        }
    }

    pub fn with_context(&self, context: Context) -> Self {
        Env {
            context,
            ..self.clone()
        }
    }

    pub fn expr(&self) -> Self {
        self.with_context(Context::Expr)
    }

    pub fn statement(&self) -> Self {
        self.with_context(Context::Statement)
    }

    pub fn ret(&self) -> Self {
        self.with_context(Context::Return)
    }

    /// Adds (or shadows) a local
    pub fn with_local(&self, binding: LocalBinding) -> Self {
        let mut env = self.clone();
        env.locals.insert(binding.name.name_arc(), binding);
        env
    }

    /// Same environment with no locals visible
    pub fn without_locals(&self) -> Self {
        Env {
            locals: OrdMap::new(),
            ..self.clone()
        }
    }

    /// Enters a `loop*` body or fn method taking `arity` recur operands
    pub fn with_loop(&self, loop_id: LoopId, arity: usize) -> Self {
        Env {
            loop_id: Some(loop_id),
            loop_locals: Some(arity),
            in_try: false,
            ..self.clone()
        }
    }

    /// Enters a `try` body
    pub fn in_try(&self) -> Self {
        Env {
            in_try: true,
            ..self.clone()
        }
    }

    /// Leaves `try` scoping, as catch bodies do
    pub fn outside_try(&self) -> Self {
        Env {
            in_try: false,
            ..self.clone()
        }
    }

    /// Local named `name`
    pub fn local(&self, name: &str) -> Option<&LocalBinding> {
        self.locals.get(name)
    }
}
