//! Native function system
//!
//! Built-in fns and macros implemented in Rust. Each one is a [`Tool`]; the
//! [`ToolRegistry`] collects them and interns them as Vars in `clojure.core`.

pub mod stdlib;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::runtime::{HostRegistry, Namespace, Symbol, Value};

/// A function implemented natively
pub trait Tool: Send + Sync {
    /// Name the tool is interned under
    fn name(&self) -> &str;

    /// One-line description, stored as the Var's `:doc`
    fn description(&self) -> &str {
        ""
    }

    /// Runs the tool
    fn execute(&self, args: &[Value]) -> Result<Value>;

    /// Exact argument count, or `None` for variadic tools
    fn arity(&self) -> Option<usize> {
        None
    }
}

type NativeBody = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Closure-backed tool
#[derive(Clone)]
pub struct NativeFn {
    name: String,
    description: String,
    arity: Option<usize>,
    func: NativeBody,
}

impl NativeFn {
    /// Wraps `func` as a tool named `name`
    pub fn new<F>(name: &str, arity: Option<usize>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        NativeFn {
            name: name.to_string(),
            description: String::new(),
            arity,
            func: Arc::new(func),
        }
    }

    /// Sets the description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

impl Tool for NativeFn {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        if let Some(arity) = self.arity {
            if args.len() != arity {
                return Err(Error::illegal_argument(format!(
                    "wrong number of arguments ({}) passed to {}",
                    args.len(),
                    self.name
                )));
            }
        }
        (self.func)(args)
    }

    fn arity(&self) -> Option<usize> {
        self.arity
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({})", self.name)
    }
}

/// Tool registry
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    macros: HashSet<String>,
}

impl ToolRegistry {
    /// Creates a registry holding the standard library
    pub fn new(host: &Arc<HostRegistry>) -> Self {
        let mut registry = ToolRegistry::empty();
        stdlib::register_all(&mut registry, host);
        registry
    }

    /// Creates an empty registry
    pub fn empty() -> Self {
        ToolRegistry {
            tools: BTreeMap::new(),
            macros: HashSet::new(),
        }
    }

    /// Registers a tool, replacing any tool of the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.macros.remove(&name);
        self.tools.insert(name, Arc::new(tool));
    }

    /// Registers a tool whose Var is flagged as a macro
    ///
    /// Macro tools receive the call form and a nil environment ahead of their arguments.
    pub fn register_macro<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name.clone(), Arc::new(tool));
        self.macros.insert(name);
    }

    /// Tool by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnresolvedSymbol {
                name: name.to_string(),
            })
    }

    /// Whether a tool named `name` exists
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Whether `name` is registered as a macro
    pub fn is_macro(&self, name: &str) -> bool {
        self.macros.contains(name)
    }

    /// All tool names, sorted
    pub fn list_tools(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Number of tools
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// Interns every tool into `ns`, binding its root and flagging macros
    pub fn install(&self, ns: &Namespace) {
        for (name, tool) in &self.tools {
            let var = ns.intern_simple(&Symbol::simple(name));
            var.bind_root(Value::Native(tool.clone()));
            if !tool.description().is_empty() {
                let mut meta = var.meta();
                meta.insert(Value::keyword("doc"), Value::string(tool.description()));
                var.set_meta(meta);
            }
            if self.macros.contains(name) {
                var.set_macro(true);
            }
        }
        debug!(ns = %ns.name(), count = self.tools.len(), "installed native tools");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestTool;

    impl Tool for TestTool {
        fn name(&self) -> &str {
            "test"
        }

        fn description(&self) -> &str {
            "A test tool"
        }

        fn execute(&self, args: &[Value]) -> Result<Value> {
            if args.is_empty() {
                Ok(Value::Int(42))
            } else {
                Ok(args[0].clone())
            }
        }
    }

    #[test]
    fn test_tool_registration() {
        let mut registry = ToolRegistry::empty();
        registry.register(TestTool);

        assert!(registry.has("test"));
        assert!(!registry.has("unknown"));
        assert!(registry.get("unknown").is_err());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_tool_execution() {
        let tool = TestTool;
        assert_eq!(tool.execute(&[]).unwrap(), Value::Int(42));
        assert_eq!(
            tool.execute(&[Value::string("hello")]).unwrap(),
            Value::string("hello")
        );
    }

    #[test]
    fn test_native_fn_checks_arity() {
        let inc = NativeFn::new("inc1", Some(1), |args| Ok(Value::Int(args[0].as_int()? + 1)));
        assert_eq!(inc.execute(&[Value::Int(1)]).unwrap(), Value::Int(2));
        let err = inc.execute(&[]).unwrap_err();
        assert!(err.to_string().contains("wrong number of arguments (0)"));
    }

    #[test]
    fn test_install_interns_vars() {
        let mut registry = ToolRegistry::empty();
        registry.register(TestTool);
        registry.register_macro(NativeFn::new("m", None, |_| Ok(Value::Nil)));

        let ns = Namespace::new(Symbol::simple("clojure.core"));
        registry.install(&ns);

        let var = ns.find_var("test").unwrap();
        assert!(var.get().unwrap().is_fn());
        assert!(!var.is_macro());
        assert!(ns.find_var("m").unwrap().is_macro());
        assert_eq!(
            var.meta().get(&Value::keyword("doc")),
            Some(&Value::string("A test tool"))
        );
    }
}
