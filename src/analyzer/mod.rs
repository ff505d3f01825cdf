//! Semantic analyzer: forms in, typed AST out
//!
//! The analyzer resolves symbols against the namespace store, expands macros and checks the
//! shape of every special form. Macros are ordinary fns, so expanding one means calling back
//! into the evaluator through [`MacroInvoker`].

mod analyze;
mod env;
mod special_forms;

pub use env::{Context, Env, LocalBinding};

use std::collections::HashSet;

use crate::ast::Node;
use crate::error::Result;
use crate::runtime::{Runtime, Value};

/// Names the analyzer handles itself; they are never macroexpanded or resolved
pub const SPECIAL_FORMS: [&str; 18] = [
    "do", "if", "new", "quote", "set!", "try", "throw", "def", ".", "let*", "letfn*", "loop*",
    "recur", "fn*", "var", "case*", "catch", "finally",
];

lazy_static::lazy_static! {
    static ref SPECIAL_FORM_NAMES: HashSet<&'static str> = SPECIAL_FORMS.iter().copied().collect();
}

/// Whether `name` is a special form
pub fn is_special(name: &str) -> bool {
    SPECIAL_FORM_NAMES.contains(name)
}

/// Callback that runs a macro fn during analysis
pub trait MacroInvoker {
    /// Calls `macro_fn` with `form` and a nil environment prepended to `args`
    fn invoke_macro(&self, macro_fn: &Value, form: &Value, args: Vec<Value>) -> Result<Value>;
}

/// Analyzer bound to a runtime and a macro invoker
pub struct Analyzer<'a> {
    runtime: &'a Runtime,
    invoker: &'a dyn MacroInvoker,
}

impl<'a> Analyzer<'a> {
    /// Creates an analyzer
    pub fn new(runtime: &'a Runtime, invoker: &'a dyn MacroInvoker) -> Self {
        Analyzer { runtime, invoker }
    }

    /// Analyzes `form` in `env`
    pub fn analyze(&self, form: &Value, env: &Env) -> Result<Node> {
        self.analyze_form(form, env)
    }

    /// Expands `form` once if its head names a macro or member/constructor sugar
    pub fn macroexpand_1(&self, form: &Value, env: &Env) -> Result<Value> {
        Ok(self.expand_once(form, env)?.unwrap_or_else(|| form.clone()))
    }

    /// Expands `form` until its head is no longer a macro
    pub fn macroexpand(&self, form: &Value, env: &Env) -> Result<Value> {
        let mut current = form.clone();
        while let Some(expanded) = self.expand_once(&current, env)? {
            current = expanded;
        }
        Ok(current)
    }
}
