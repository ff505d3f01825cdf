//! Driver tying the reader, analyzer and evaluator together

use std::sync::Arc;

use tracing::debug;

use super::config::EvalConfig;
use super::context::{CancellationToken, Runtime};
use super::environment::Environment;
use super::function::apply;
use super::host::HostType;
use super::symbol::Symbol;
use super::var::Var;
use super::Value;
use crate::analyzer::{Analyzer, Env, MacroInvoker};
use crate::ast::Node;
use crate::error::Result;
use crate::parser::read_str;
use crate::tools::{NativeFn, ToolRegistry};

/// Interpreter owning one runtime
///
/// Forms are read, analyzed and evaluated one top-level form at a time, so a macro defined by
/// one form is available to the next.
///
/// ```
/// use jolt::{Interpreter, Value};
///
/// let interp = Interpreter::new();
/// let result = interp.eval_str("(defn sq [x] (* x x)) (sq 7)").unwrap();
/// assert_eq!(result, Value::Int(49));
/// ```
pub struct Interpreter {
    runtime: Arc<Runtime>,
    env: Environment,
}

impl Interpreter {
    /// Interpreter with default settings and the standard library loaded
    pub fn new() -> Self {
        Self::with_config(EvalConfig::default())
    }

    /// Interpreter with custom settings
    pub fn with_config(config: EvalConfig) -> Self {
        let runtime = Arc::new(Runtime::new(config));
        let tools = ToolRegistry::new(runtime.host());
        tools.install(&runtime.core());
        let env = Environment::new(runtime.clone());
        Interpreter { runtime, env }
    }

    /// Shared runtime state
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Reads every form in `source`
    pub fn read(&self, source: &str) -> Result<Vec<Value>> {
        read_str(source, &self.runtime.config().source_name)
    }

    /// Reads and evaluates `source`, returning the value of the last form
    pub fn eval_str(&self, source: &str) -> Result<Value> {
        let forms = self.read(source)?;
        debug!(forms = forms.len(), "evaluating source");
        let mut result = Value::Nil;
        for form in &forms {
            result = self.eval_form(form)?;
        }
        Ok(result)
    }

    /// Analyzes and evaluates one form
    ///
    /// A top-level `do` is unrolled so that each subform is analyzed only after the previous
    /// one has run.
    pub fn eval_form(&self, form: &Value) -> Result<Value> {
        if let Some(body) = top_level_do(form) {
            let mut result = Value::Nil;
            for subform in body {
                result = self.eval_form(subform)?;
            }
            return Ok(result);
        }
        let node = self.analyze_form(form)?;
        self.env.eval(&node)
    }

    /// Analyzes `form` in the current namespace
    pub fn analyze_form(&self, form: &Value) -> Result<Node> {
        Analyzer::new(&self.runtime, self).analyze(form, &self.analysis_env())
    }

    /// Top-level analysis environment for the current namespace
    pub fn analysis_env(&self) -> Env {
        Env::new(self.runtime.current_ns().name().clone())
    }

    /// Expands `form` once
    pub fn macroexpand_1(&self, form: &Value) -> Result<Value> {
        Analyzer::new(&self.runtime, self).macroexpand_1(form, &self.analysis_env())
    }

    /// Expands `form` until its head is no longer a macro
    pub fn macroexpand(&self, form: &Value) -> Result<Value> {
        Analyzer::new(&self.runtime, self).macroexpand(form, &self.analysis_env())
    }

    /// Switches the current namespace, creating it if needed
    pub fn in_ns(&self, name: &str) {
        self.runtime.set_current_ns(&Symbol::simple(name));
    }

    /// Defines a native fn in the current namespace
    pub fn define_native<F>(&self, name: &str, arity: Option<usize>, f: F) -> Result<Arc<Var>>
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let var = self.runtime.current_ns().intern(&Symbol::simple(name))?;
        var.bind_root(Value::Native(Arc::new(NativeFn::new(name, arity, f))));
        Ok(var)
    }

    /// Registers a host type, visible by simple name from every namespace
    pub fn register_type(&self, ty: Arc<HostType>) {
        self.runtime.register_type(ty);
    }

    /// Token that cancels running evaluations
    pub fn cancellation_token(&self) -> CancellationToken {
        self.runtime.cancellation_token()
    }
}

impl MacroInvoker for Interpreter {
    fn invoke_macro(&self, macro_fn: &Value, form: &Value, args: Vec<Value>) -> Result<Value> {
        let mut call_args = Vec::with_capacity(args.len() + 2);
        call_args.push(form.clone());
        call_args.push(Value::Nil);
        call_args.extend(args);
        apply(macro_fn, call_args)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        // Closures held by Var roots point back at the runtime
        self.runtime.clear();
    }
}

fn top_level_do(form: &Value) -> Option<impl Iterator<Item = &Value>> {
    match form {
        Value::List(list) => match list.items.front() {
            Some(Value::Symbol(head)) if head.ns().is_none() && head.name() == "do" => {
                Some(list.items.iter().skip(1))
            }
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_installs_every_tool() {
        let interp = Interpreter::new();
        let tools = ToolRegistry::new(interp.runtime().host());
        let core = interp.runtime().core();
        for name in tools.list_tools() {
            let var = core
                .find_var(&name)
                .unwrap_or_else(|| panic!("{} not installed", name));
            assert!(var.is_bound(), "{} has no root", name);
            assert_eq!(var.is_macro(), tools.is_macro(&name), "{}", name);
        }
    }

    #[test]
    fn test_eval_str_returns_last_value() {
        let interp = Interpreter::new();
        assert_eq!(interp.eval_str("1 2 3").unwrap(), Value::Int(3));
        assert_eq!(interp.eval_str("").unwrap(), Value::Nil);
    }

    #[test]
    fn test_macro_defined_in_same_do_is_usable() {
        let interp = Interpreter::new();
        let result = interp
            .eval_str("(do (defmacro twice [x] `(* 2 ~x)) (twice 21))")
            .unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn test_define_native() {
        let interp = Interpreter::new();
        interp
            .define_native("triple", Some(1), |args| Ok(Value::Int(args[0].as_int()? * 3)))
            .unwrap();
        assert_eq!(interp.eval_str("(triple 5)").unwrap(), Value::Int(15));
    }

    #[test]
    fn test_macroexpand() {
        let interp = Interpreter::new();
        let form = interp.read("(when a b)").unwrap().remove(0);
        let expanded = interp.macroexpand_1(&form).unwrap();
        assert_eq!(expanded.to_string(), "(if a (do b) nil)");
    }

    #[test]
    fn test_namespaces_are_separate() {
        let interp = Interpreter::new();
        interp.eval_str("(def x 1)").unwrap();
        interp.in_ns("other");
        assert!(interp.eval_str("x").is_err());
        assert_eq!(interp.eval_str("user/x").unwrap(), Value::Int(1));
    }
}
