//! Tree-walking evaluator
//!
//! One handler per node operation. Nodes that can sit in tail position (`do`, `if`, `let*`,
//! `letfn*`, `case*`, `loop*`, `recur`) evaluate to a [`Flow`] so that `recur` can travel back
//! to its loop as a value instead of a host-stack call.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::collections::Meta;
use super::environment::{Environment, RecurTarget};
use super::function::{apply, Closure};
use super::Value;
use crate::ast::*;
use crate::error::{Error, Result, StackFrame};

/// Remaining host stack below which evaluation moves to a fresh segment
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each additional stack segment
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Outcome of evaluating a node in tail position
pub(crate) enum Flow {
    /// Ordinary result
    Value(Value),
    /// Control transfer to the loop or fn method identified by `target`
    Recur {
        target: RecurTarget,
        args: Vec<Value>,
    },
}

impl Environment {
    /// Evaluates `node` to a value
    pub fn eval(&self, node: &Node) -> Result<Value> {
        match self.eval_flow(node)? {
            Flow::Value(value) => Ok(value),
            Flow::Recur { .. } => Err(Error::runtime("can only recur from tail position")),
        }
    }

    /// Evaluates `node` in tail position, growing the host stack when it runs low
    pub(crate) fn eval_flow(&self, node: &Node) -> Result<Flow> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_node(node))
    }

    fn eval_node(&self, node: &Node) -> Result<Flow> {
        match &node.kind {
            NodeKind::Do(n) => self.eval_do(n),
            NodeKind::If(n) => self.eval_if(n),
            NodeKind::Let(n) => self.eval_let(n),
            NodeKind::LetFn(n) => self.eval_letfn(n),
            NodeKind::Loop(n) => self.eval_loop(n),
            NodeKind::Recur(n) => self.eval_recur(n),
            NodeKind::Case(n) => self.eval_case(n),

            NodeKind::Const(n) => Ok(Flow::Value(n.value.clone())),
            NodeKind::Quote(n) => Ok(Flow::Value(n.value.clone())),
            NodeKind::Local(n) => self.lookup(n.name.name()).map(Flow::Value),
            NodeKind::Var(n) => n.var.get().map(Flow::Value),
            NodeKind::TheVar(n) => Ok(Flow::Value(Value::Var(n.var.clone()))),
            NodeKind::Fn(n) => Ok(Flow::Value(self.make_fn(n))),
            NodeKind::Invoke(n) => self.eval_invoke(node, n).map(Flow::Value),
            NodeKind::Def(n) => self.eval_def(n).map(Flow::Value),
            NodeKind::SetBang(n) => self.eval_set_bang(n).map(Flow::Value),
            NodeKind::Try(n) => self.eval_try(n).map(Flow::Value),
            NodeKind::Throw(n) => Err(Error::thrown(self.eval(&n.exception)?)),
            NodeKind::WithMeta(n) => self.eval_with_meta(n).map(Flow::Value),
            NodeKind::Vector(n) => self.eval_vector(n).map(Flow::Value),
            NodeKind::Map(n) => self.eval_map(n).map(Flow::Value),
            NodeKind::Set(n) => self.eval_set(n).map(Flow::Value),
            NodeKind::HostCall(n) => self.eval_host_call(n).map(Flow::Value),
            NodeKind::HostField(n) => self.eval_host_field(n).map(Flow::Value),
            NodeKind::HostInterop(n) => self.eval_host_interop(n).map(Flow::Value),
            NodeKind::MaybeHostForm(n) => self.eval_maybe_host_form(n).map(Flow::Value),
            NodeKind::MaybeClass(n) => self.eval_maybe_class(n).map(Flow::Value),
            NodeKind::New(n) => self.eval_new(n).map(Flow::Value),
        }
    }

    fn eval_all(&self, nodes: &[Node]) -> Result<Vec<Value>> {
        nodes.iter().map(|node| self.eval(node)).collect()
    }

    // Control flow

    fn eval_do(&self, node: &DoNode) -> Result<Flow> {
        for statement in &node.statements {
            self.eval(statement)?;
        }
        self.eval_flow(&node.ret)
    }

    fn eval_if(&self, node: &IfNode) -> Result<Flow> {
        if self.eval(&node.test)?.is_truthy() {
            self.eval_flow(&node.then)
        } else {
            self.eval_flow(&node.else_)
        }
    }

    fn eval_case(&self, node: &CaseNode) -> Result<Flow> {
        let value = self.eval(&node.test)?;
        for entry in &node.entries {
            if self.eval(&entry.test)? == value {
                return self.eval_flow(&entry.then);
            }
        }
        self.eval_flow(&node.default)
    }

    // Binding forms

    fn eval_let(&self, node: &LetNode) -> Result<Flow> {
        let mut env = self.clone();
        for binding in &node.bindings {
            let value = env.eval_init(binding)?;
            env = env.bind(binding.name.name_arc(), value);
        }
        env.eval_flow(&node.body)
    }

    fn eval_letfn(&self, node: &LetFnNode) -> Result<Flow> {
        let env = self.bind_all(
            node.bindings
                .iter()
                .map(|b| (b.name.name_arc(), Value::Nil)),
        );
        for binding in &node.bindings {
            let value = env.eval_init(binding)?;
            env.assign(binding.name.name(), value)?;
        }
        env.eval_flow(&node.body)
    }

    fn eval_init(&self, binding: &BindingNode) -> Result<Value> {
        match &binding.init {
            Some(init) => self.eval(init),
            None => Ok(Value::Nil),
        }
    }

    fn eval_loop(&self, node: &LoopNode) -> Result<Flow> {
        let mut env = self.with_recur_target(None);
        for binding in &node.bindings {
            let value = env.eval_init(binding)?;
            env = env.bind(binding.name.name_arc(), value);
        }

        let target = RecurTarget::fresh();
        let names: Vec<Arc<str>> = node.bindings.iter().map(|b| b.name.name_arc()).collect();
        let mut frame = env.with_recur_target(Some(target));
        loop {
            match frame.eval_flow(&node.body)? {
                Flow::Recur { target: t, args } if t == target => {
                    self.runtime().check_cancelled()?;
                    trace!(loop_id = ?node.loop_id, "recur");
                    frame = self
                        .bind_all(names.iter().cloned().zip(args))
                        .with_recur_target(Some(target));
                }
                other => return Ok(other),
            }
        }
    }

    fn eval_recur(&self, node: &RecurNode) -> Result<Flow> {
        let target = self
            .recur_target()
            .ok_or_else(|| Error::runtime("recur used outside of a loop or fn"))?;
        let args = self.with_recur_target(None).eval_all(&node.exprs)?;
        Ok(Flow::Recur { target, args })
    }

    // Functions

    fn make_fn(&self, node: &Arc<FnNode>) -> Value {
        Value::Fn(Arc::new(Closure::new(
            node.clone(),
            self.with_recur_target(None),
            None,
        )))
    }

    fn eval_invoke(&self, node: &Node, invoke: &InvokeNode) -> Result<Value> {
        let runtime = self.runtime();
        runtime.check_cancelled()?;
        let f = self.eval(&invoke.func)?;
        let args = self.eval_all(&invoke.args)?;
        if runtime.config().trace_invocations {
            trace!(form = %node.form, argc = args.len(), "invoke");
        }
        apply(&f, args).map_err(|err| err.with_frame(StackFrame::for_form(&node.form)))
    }

    // Vars

    fn eval_def(&self, node: &DefNode) -> Result<Value> {
        if let Some(init) = &node.init {
            let value = self.eval(init)?;
            node.var.bind_root(value);
        }
        let meta = match &node.meta {
            Some(meta) => self.eval_meta(meta)?.unwrap_or_default(),
            None => Meta::new(),
        };
        let flag = |key: &str| meta.get(&Value::keyword(key)).map_or(false, Value::is_truthy);
        node.var.set_dynamic(flag("dynamic"));
        let is_macro = flag("macro");
        node.var.set_meta(meta);
        node.var.set_macro(is_macro);
        debug!(var = %node.var, bound = node.var.has_root(), "def");
        Ok(Value::Var(node.var.clone()))
    }

    fn eval_set_bang(&self, node: &SetBangNode) -> Result<Value> {
        let value = self.eval(&node.value)?;
        let host = self.runtime().host();
        match &node.target.kind {
            NodeKind::Var(target) => target.var.set(value),
            NodeKind::HostField(target) => {
                let object = self.eval(&target.target)?;
                host.set_field(&object, target.field.name(), value)
            }
            NodeKind::HostInterop(target) => {
                let object = self.eval(&target.target)?;
                host.set_field(&object, target.member.name(), value)
            }
            _ => Err(Error::illegal_argument(format!(
                "invalid assignment target: {}",
                node.target.form
            ))),
        }
    }

    // Exceptions

    fn eval_try(&self, node: &TryNode) -> Result<Value> {
        let result = match self.eval(&node.body) {
            Ok(value) => Ok(value),
            Err(err) => self.dispatch_catch(node, err),
        };
        let finally = match &node.finally {
            Some(finally) => finally,
            None => return result,
        };
        match (self.eval(finally), result) {
            (Ok(_), result) => result,
            (Err(finally_err), Ok(_)) => Err(finally_err),
            (Err(finally_err), Err(original)) => {
                warn!(error = %finally_err, "finally block failed while unwinding; keeping original error");
                Err(original)
            }
        }
    }

    /// First catch clause whose type admits the failure handles it
    fn dispatch_catch(&self, node: &TryNode, err: Error) -> Result<Value> {
        let host = self.runtime().host().clone();
        let thrown = match err.thrown_value(&host) {
            Some(thrown) => thrown,
            None => return Err(err),
        };
        for clause in &node.catches {
            let matches = match self.eval(&clause.class)? {
                Value::Keyword(k) => k.ns().is_none() && k.name() == "default",
                Value::Class(class) => host.is_instance(&class, &thrown),
                _ => false,
            };
            if matches {
                return self
                    .with_recur_target(None)
                    .bind(clause.local.name.name_arc(), thrown)
                    .eval(&clause.body);
            }
        }
        Err(err)
    }

    // Metadata and literals

    fn eval_meta(&self, node: &Node) -> Result<Option<Meta>> {
        match self.eval(node)? {
            Value::Map(map) => Ok(Some(map.entries.clone())),
            Value::Nil => Ok(None),
            other => Err(Error::type_error("metadata map", &other)),
        }
    }

    fn eval_with_meta(&self, node: &WithMetaNode) -> Result<Value> {
        let meta = self.eval_meta(&node.meta)?;
        self.eval(&node.expr)?.with_meta(meta)
    }

    fn eval_vector(&self, node: &VectorNode) -> Result<Value> {
        Ok(Value::vector(self.eval_all(&node.items)?))
    }

    fn eval_map(&self, node: &MapNode) -> Result<Value> {
        let keys = self.eval_all(&node.keys)?;
        let vals = self.eval_all(&node.vals)?;
        Ok(Value::map(keys.into_iter().zip(vals)))
    }

    fn eval_set(&self, node: &SetNode) -> Result<Value> {
        Ok(Value::set(self.eval_all(&node.items)?))
    }

    // Host interop

    fn eval_host_call(&self, node: &HostCallNode) -> Result<Value> {
        let target = self.eval(&node.target)?;
        let args = self.eval_all(&node.args)?;
        self.runtime()
            .host()
            .call_method(&target, node.method.name(), &args)
    }

    fn eval_host_field(&self, node: &HostFieldNode) -> Result<Value> {
        let target = self.eval(&node.target)?;
        self.runtime().host().field(&target, node.field.name())
    }

    fn eval_host_interop(&self, node: &HostInteropNode) -> Result<Value> {
        let target = self.eval(&node.target)?;
        self.runtime().host().interop(&target, node.member.name())
    }

    fn eval_maybe_host_form(&self, node: &MaybeHostFormNode) -> Result<Value> {
        self.runtime()
            .host()
            .static_member(node.class.name(), node.field.name())
            .ok_or_else(|| Error::UnresolvedSymbol {
                name: format!("{}/{}", node.class.name(), node.field.name()),
            })
    }

    fn eval_maybe_class(&self, node: &MaybeClassNode) -> Result<Value> {
        self.runtime()
            .host()
            .resolve_type(node.class.name())
            .map(Value::Class)
            .ok_or_else(|| Error::UnresolvedSymbol {
                name: node.class.to_string(),
            })
    }

    fn eval_new(&self, node: &NewNode) -> Result<Value> {
        let class = match self.eval(&node.class)? {
            Value::Class(class) => class,
            other => return Err(Error::type_error("class", &other)),
        };
        let args = self.eval_all(&node.args)?;
        self.runtime().host().instantiate(&class, &args)
    }
}
