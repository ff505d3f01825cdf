use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::runtime::{Meta, Symbol, Value, Var};

static NEXT_LOOP_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a `loop*` or fn method, the static target of a `recur`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopId(u64);

impl LoopId {
    /// Allocates an identity no other loop shares
    pub fn fresh() -> Self {
        LoopId(NEXT_LOOP_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Operation tag of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Op {
    Const,
    Local,
    Var,
    Do,
    If,
    Let,
    Loop,
    Recur,
    Fn,
    Invoke,
    Def,
    SetBang,
    Try,
    Throw,
    Case,
    Quote,
    HostCall,
    HostField,
    HostInterop,
    MaybeHostForm,
    New,
    TheVar,
    WithMeta,
    Vector,
    Map,
    Set,
    MaybeClass,
    #[serde(rename = "letfn")]
    LetFn,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        write!(f, ":{}", name)
    }
}

/// Role of a local binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocalKind {
    Let,
    Loop,
    Arg,
    Catch,
    LetFn,
    FnSelf,
}

/// `case*` switch strategy hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchType {
    Compact,
    Sparse,
}

/// `case*` test kind hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestType {
    Int,
    HashIdentity,
    HashEquiv,
}

/// Analyzed form
#[derive(Debug, Clone)]
pub struct Node {
    /// Form this node was analyzed from (after macroexpansion)
    pub form: Value,
    /// Form as written, when macroexpansion changed it
    pub original: Option<Value>,
    /// Operation payload
    pub kind: NodeKind,
}

impl Node {
    /// Node for `form`
    pub fn new(form: Value, kind: NodeKind) -> Self {
        Node {
            form,
            original: None,
            kind,
        }
    }

    /// Records the pre-expansion form
    pub fn with_original(mut self, original: Value) -> Self {
        self.original = Some(original);
        self
    }

    /// The form to report in diagnostics
    pub fn source_form(&self) -> &Value {
        self.original.as_ref().unwrap_or(&self.form)
    }

    /// Operation tag
    pub fn op(&self) -> Op {
        match &self.kind {
            NodeKind::Const(_) => Op::Const,
            NodeKind::Local(_) => Op::Local,
            NodeKind::Var(_) => Op::Var,
            NodeKind::Do(_) => Op::Do,
            NodeKind::If(_) => Op::If,
            NodeKind::Let(_) => Op::Let,
            NodeKind::Loop(_) => Op::Loop,
            NodeKind::Recur(_) => Op::Recur,
            NodeKind::Fn(_) => Op::Fn,
            NodeKind::Invoke(_) => Op::Invoke,
            NodeKind::Def(_) => Op::Def,
            NodeKind::SetBang(_) => Op::SetBang,
            NodeKind::Try(_) => Op::Try,
            NodeKind::Throw(_) => Op::Throw,
            NodeKind::Case(_) => Op::Case,
            NodeKind::Quote(_) => Op::Quote,
            NodeKind::HostCall(_) => Op::HostCall,
            NodeKind::HostField(_) => Op::HostField,
            NodeKind::HostInterop(_) => Op::HostInterop,
            NodeKind::MaybeHostForm(_) => Op::MaybeHostForm,
            NodeKind::New(_) => Op::New,
            NodeKind::TheVar(_) => Op::TheVar,
            NodeKind::WithMeta(_) => Op::WithMeta,
            NodeKind::Vector(_) => Op::Vector,
            NodeKind::Map(_) => Op::Map,
            NodeKind::Set(_) => Op::Set,
            NodeKind::MaybeClass(_) => Op::MaybeClass,
            NodeKind::LetFn(_) => Op::LetFn,
        }
    }
}

/// Node payloads, one per operation
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Literal value
    Const(ConstNode),
    /// Reference to a local binding
    Local(LocalNode),
    /// Dereference of a Var
    Var(VarNode),
    /// `do`
    Do(DoNode),
    /// `if`
    If(IfNode),
    /// `let*`
    Let(LetNode),
    /// `loop*`
    Loop(LoopNode),
    /// `recur`
    Recur(RecurNode),
    /// `fn*`
    Fn(Arc<FnNode>),
    /// Function call
    Invoke(InvokeNode),
    /// `def`
    Def(DefNode),
    /// `set!`
    SetBang(SetBangNode),
    /// `try`
    Try(TryNode),
    /// `throw`
    Throw(ThrowNode),
    /// `case*`
    Case(CaseNode),
    /// `quote`
    Quote(QuoteNode),
    /// `(. target method args*)`
    HostCall(HostCallNode),
    /// `(. target -field)`
    HostField(HostFieldNode),
    /// `(. target member)`, field or zero-arg method
    HostInterop(HostInteropNode),
    /// Unresolved `Type/member`
    MaybeHostForm(MaybeHostFormNode),
    /// `new`
    New(NewNode),
    /// `var`
    TheVar(TheVarNode),
    /// Metadata attached to a literal collection or fn
    WithMeta(WithMetaNode),
    /// Vector literal
    Vector(VectorNode),
    /// Map literal
    Map(MapNode),
    /// Set literal
    Set(SetNode),
    /// Unresolved unqualified symbol, looked up as a host type
    MaybeClass(MaybeClassNode),
    /// `letfn*`
    LetFn(LetFnNode),
}

#[derive(Debug, Clone)]
pub struct ConstNode {
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct LocalNode {
    /// Local name
    pub name: Symbol,
    /// Binding role
    pub local: LocalKind,
    /// Position among fn params, for `arg` locals
    pub arg_id: Option<usize>,
    /// Whether this is the rest param
    pub variadic: bool,
}

#[derive(Debug, Clone)]
pub struct VarNode {
    pub var: Arc<Var>,
}

#[derive(Debug, Clone)]
pub struct DoNode {
    /// Forms evaluated for effect
    pub statements: Vec<Node>,
    /// Form whose value is returned
    pub ret: Box<Node>,
}

#[derive(Debug, Clone)]
pub struct IfNode {
    pub test: Box<Node>,
    pub then: Box<Node>,
    /// Constant nil when the form has no else branch
    pub else_: Box<Node>,
}

/// Local introduced by `let*`, `loop*`, `letfn*`, a fn param, a catch or a fn name
#[derive(Debug, Clone)]
pub struct BindingNode {
    /// Binding symbol as written
    pub form: Value,
    /// Local name
    pub name: Symbol,
    /// Initializer; params and catch locals have none
    pub init: Option<Box<Node>>,
    /// Binding role
    pub local: LocalKind,
    /// Param position
    pub arg_id: Option<usize>,
    /// Rest param flag
    pub variadic: bool,
}

#[derive(Debug, Clone)]
pub struct LetNode {
    pub bindings: Vec<BindingNode>,
    pub body: Box<Node>,
}

#[derive(Debug, Clone)]
pub struct LoopNode {
    /// Identity `recur` forms in the body target
    pub loop_id: LoopId,
    pub bindings: Vec<BindingNode>,
    pub body: Box<Node>,
}

#[derive(Debug, Clone)]
pub struct RecurNode {
    /// New values for the loop locals, in binding order
    pub exprs: Vec<Node>,
    /// Enclosing loop or fn method
    pub loop_id: LoopId,
}

/// `fn*` with one or more arity methods
#[derive(Debug, Clone)]
pub struct FnNode {
    /// Optional self name, visible in every method body
    pub local: Option<BindingNode>,
    /// Methods in declaration order
    pub methods: Vec<FnMethodNode>,
    /// Whether one method takes a rest param
    pub variadic: bool,
    /// Largest fixed arity among the methods
    pub max_fixed_arity: usize,
}

#[derive(Debug, Clone)]
pub struct FnMethodNode {
    /// Method form `([params] body*)`
    pub form: Value,
    /// Params, the rest param last
    pub params: Vec<BindingNode>,
    /// Number of positional params
    pub fixed_arity: usize,
    /// Whether the method takes a rest param
    pub variadic: bool,
    /// Identity `recur` forms in the body target
    pub loop_id: LoopId,
    pub body: Box<Node>,
}

#[derive(Debug, Clone)]
pub struct InvokeNode {
    pub func: Box<Node>,
    pub args: Vec<Node>,
    /// Call-form metadata, kept for diagnostics
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone)]
pub struct DefNode {
    /// Defined symbol
    pub name: Symbol,
    /// Var interned at analysis time
    pub var: Arc<Var>,
    /// Metadata map expression
    pub meta: Option<Box<Node>>,
    /// Initializer; `(def x)` has none
    pub init: Option<Box<Node>>,
    /// Docstring
    pub doc: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SetBangNode {
    /// Var, host field or host interop node
    pub target: Box<Node>,
    pub value: Box<Node>,
}

#[derive(Debug, Clone)]
pub struct CatchNode {
    /// Expression naming the caught type, or `:default`
    pub class: Box<Node>,
    /// Local bound to the caught value
    pub local: BindingNode,
    pub body: Box<Node>,
}

#[derive(Debug, Clone)]
pub struct TryNode {
    pub body: Box<Node>,
    /// Clauses in declaration order
    pub catches: Vec<CatchNode>,
    pub finally: Option<Box<Node>>,
}

#[derive(Debug, Clone)]
pub struct ThrowNode {
    pub exception: Box<Node>,
}

/// One `test => then` arm of `case*`
#[derive(Debug, Clone)]
pub struct CaseEntry {
    /// Literal test
    pub test: Box<Node>,
    pub then: Box<Node>,
}

#[derive(Debug, Clone)]
pub struct CaseNode {
    /// Dispatch expression
    pub test: Box<Node>,
    /// Arms in case-map key order
    pub entries: Vec<CaseEntry>,
    pub default: Box<Node>,
    /// Hash shift hint
    pub shift: i64,
    /// Hash mask hint
    pub mask: i64,
    pub switch_type: SwitchType,
    pub test_type: TestType,
    /// Keys whose arms must not be checked for equality
    pub skip_check: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct QuoteNode {
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct HostCallNode {
    pub target: Box<Node>,
    pub method: Symbol,
    pub args: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct HostFieldNode {
    pub target: Box<Node>,
    /// Field name without the leading `-`
    pub field: Symbol,
}

#[derive(Debug, Clone)]
pub struct HostInteropNode {
    pub target: Box<Node>,
    pub member: Symbol,
}

#[derive(Debug, Clone)]
pub struct MaybeHostFormNode {
    /// Type part of `Type/member`
    pub class: Symbol,
    /// Member part of `Type/member`
    pub field: Symbol,
}

#[derive(Debug, Clone)]
pub struct NewNode {
    pub class: Box<Node>,
    pub args: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct TheVarNode {
    pub var: Arc<Var>,
}

#[derive(Debug, Clone)]
pub struct WithMetaNode {
    pub meta: Box<Node>,
    pub expr: Box<Node>,
}

#[derive(Debug, Clone)]
pub struct VectorNode {
    pub items: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct MapNode {
    pub keys: Vec<Node>,
    pub vals: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct SetNode {
    pub items: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct MaybeClassNode {
    pub class: Symbol,
}

#[derive(Debug, Clone)]
pub struct LetFnNode {
    pub bindings: Vec<BindingNode>,
    pub body: Box<Node>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_display() {
        assert_eq!(Op::SetBang.to_string(), ":set-bang");
        assert_eq!(Op::MaybeHostForm.to_string(), ":maybe-host-form");
    }

    #[test]
    fn test_loop_ids_are_unique() {
        assert_ne!(LoopId::fresh(), LoopId::fresh());
    }

    #[test]
    fn test_source_form_prefers_original() {
        let node = Node::new(
            Value::Int(1),
            NodeKind::Const(ConstNode {
                value: Value::Int(1),
            }),
        )
        .with_original(Value::symbol("one"));
        assert_eq!(node.source_form(), &Value::symbol("one"));
        assert_eq!(node.op(), Op::Const);
    }
}
