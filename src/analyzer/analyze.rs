use std::sync::Arc;

use tracing::debug;

use super::env::{Context, Env};
use super::{is_special, Analyzer};
use crate::ast::*;
use crate::error::{Error, Result};
use crate::runtime::{elide_source_keys, merge_meta, Namespace, Symbol, Value, Var};

impl<'a> Analyzer<'a> {
    pub(super) fn analyze_form(&self, form: &Value, env: &Env) -> Result<Node> {
        match form {
            Value::Symbol(sym) => self.analyze_symbol(form, sym, env),
            Value::List(_) => self.analyze_seq(form, env),
            Value::Vector(v) => {
                let items = self.analyze_all(v.items.iter(), &env.expr())?;
                self.wrap_literal_meta(form, NodeKind::Vector(VectorNode { items }), env)
            }
            Value::Map(m) => {
                let env = env.expr();
                let keys = self.analyze_all(m.entries.keys(), &env)?;
                let vals = self.analyze_all(m.entries.values(), &env)?;
                self.wrap_literal_meta(form, NodeKind::Map(MapNode { keys, vals }), &env)
            }
            Value::Set(s) => {
                let items = self.analyze_all(s.items.iter(), &env.expr())?;
                self.wrap_literal_meta(form, NodeKind::Set(SetNode { items }), env)
            }
            _ => Ok(const_node(form.clone())),
        }
    }

    pub(super) fn analyze_all<'v>(
        &self,
        forms: impl Iterator<Item = &'v Value>,
        env: &Env,
    ) -> Result<Vec<Node>> {
        forms.map(|form| self.analyze_form(form, env)).collect()
    }

    /// Literal collections and fns carrying non-positional metadata evaluate it at runtime
    pub(super) fn wrap_literal_meta(&self, form: &Value, kind: NodeKind, env: &Env) -> Result<Node> {
        let node = Node::new(form.clone(), kind);
        match elide_source_keys(form.meta()) {
            Some(meta) => {
                let meta_form = Value::map(meta);
                let meta = self.analyze_form(&meta_form, &env.expr())?;
                Ok(Node::new(
                    form.clone(),
                    NodeKind::WithMeta(WithMetaNode {
                        meta: Box::new(meta),
                        expr: Box::new(node),
                    }),
                ))
            }
            None => Ok(node),
        }
    }

    // Symbols

    fn analyze_symbol(&self, form: &Value, sym: &Symbol, env: &Env) -> Result<Node> {
        if sym.ns().is_none() {
            if let Some(local) = env.local(sym.name()) {
                return Ok(Node::new(
                    form.clone(),
                    NodeKind::Local(LocalNode {
                        name: local.name.clone(),
                        local: local.local,
                        arg_id: local.arg_id,
                        variadic: local.variadic,
                    }),
                ));
            }
        }

        match self.resolve(sym, env) {
            Some(Value::Var(var)) => {
                if var.is_macro() {
                    return Err(Error::analysis(
                        form,
                        format!("Can't take value of a macro: {}", var),
                    ));
                }
                Ok(Node::new(form.clone(), NodeKind::Var(VarNode { var })))
            }
            Some(value) => Ok(const_node_for(form, value)),
            None => match sym.ns() {
                Some(ns) => Ok(Node::new(
                    form.clone(),
                    NodeKind::MaybeHostForm(MaybeHostFormNode {
                        class: Symbol::simple(ns),
                        field: Symbol::simple(sym.name()),
                    }),
                )),
                None => Ok(Node::new(
                    form.clone(),
                    NodeKind::MaybeClass(MaybeClassNode {
                        class: sym.with_meta(None),
                    }),
                )),
            },
        }
    }

    pub(super) fn current_ns(&self, env: &Env) -> Arc<Namespace> {
        self.runtime.namespaces().find_or_create(&env.ns)
    }

    pub(super) fn resolve(&self, sym: &Symbol, env: &Env) -> Option<Value> {
        self.runtime
            .namespaces()
            .resolve(sym, &self.current_ns(env))
    }

    fn resolve_macro(&self, sym: &Symbol, env: &Env) -> Option<Arc<Var>> {
        match self.resolve(sym, env)? {
            Value::Var(var) if var.is_macro() => Some(var),
            _ => None,
        }
    }

    // Seqs

    fn analyze_seq(&self, form: &Value, env: &Env) -> Result<Node> {
        let items: Vec<Value> = match form.sequential_items() {
            Some(items) if !items.is_empty() => items.iter().cloned().collect(),
            _ => return Ok(const_node(form.clone())),
        };

        if let Some(expanded) = self.expand_once(form, env)? {
            let mut node = self.analyze_form(&expanded, env)?;
            node.original = Some(form.clone());
            return Ok(node);
        }

        if let Value::Symbol(head) = &items[0] {
            if head.ns().is_none() {
                match head.name() {
                    "do" => return self.analyze_do(form, &items, env),
                    "if" => return self.analyze_if(form, &items, env),
                    "new" => return self.analyze_new(form, &items, env),
                    "quote" => return self.analyze_quote(form, &items),
                    "set!" => return self.analyze_set_bang(form, &items, env),
                    "try" => return self.analyze_try(form, &items, env),
                    "throw" => return self.analyze_throw(form, &items, env),
                    "def" => return self.analyze_def(form, &items, env),
                    "." => return self.analyze_dot(form, &items, env),
                    "let*" => return self.analyze_let(form, &items, env, false),
                    "loop*" => return self.analyze_let(form, &items, env, true),
                    "letfn*" => return self.analyze_letfn(form, &items, env),
                    "recur" => return self.analyze_recur(form, &items, env),
                    "fn*" => return self.analyze_fn(form, &items, env),
                    "var" => return self.analyze_the_var(form, &items, env),
                    "case*" => return self.analyze_case(form, &items, env),
                    _ => {}
                }
            }
        }
        self.analyze_invoke(form, &items, env)
    }

    fn analyze_invoke(&self, form: &Value, items: &[Value], env: &Env) -> Result<Node> {
        if items[0].is_nil() {
            return Err(Error::analysis(form, "can't call nil"));
        }
        let env = env.expr();
        let func = self.analyze_form(&items[0], &env)?;
        let args = self.analyze_all(items[1..].iter(), &env)?;
        Ok(Node::new(
            form.clone(),
            NodeKind::Invoke(InvokeNode {
                func: Box::new(func),
                args,
                meta: form.meta().cloned(),
            }),
        ))
    }

    /// Analyzes `forms` as an implicit `do`
    pub(super) fn analyze_body(&self, forms: &[Value], env: &Env) -> Result<Node> {
        let form = Value::list(std::iter::once(Value::symbol("do")).chain(forms.iter().cloned()));
        self.build_do(&form, forms, env)
    }

    pub(super) fn build_do(&self, form: &Value, forms: &[Value], env: &Env) -> Result<Node> {
        let (last, init) = match forms.split_last() {
            Some(split) => split,
            None => {
                return Ok(Node::new(
                    form.clone(),
                    NodeKind::Do(DoNode {
                        statements: Vec::new(),
                        ret: Box::new(const_node(Value::Nil)),
                    }),
                ))
            }
        };
        let statement_env = env.statement();
        let statements = self.analyze_all(init.iter(), &statement_env)?;
        let ret = self.analyze_form(last, env)?;
        Ok(Node::new(
            form.clone(),
            NodeKind::Do(DoNode {
                statements,
                ret: Box::new(ret),
            }),
        ))
    }

    // Macroexpansion

    /// One expansion step; `None` when `form` is not a macro call or interop sugar
    pub(super) fn expand_once(&self, form: &Value, env: &Env) -> Result<Option<Value>> {
        let items = match form {
            Value::List(list) if !list.items.is_empty() => &list.items,
            _ => return Ok(None),
        };
        let head = match &items[0] {
            Value::Symbol(sym) => sym,
            _ => return Ok(None),
        };
        if head.ns().is_none() && (is_special(head.name()) || env.local(head.name()).is_some()) {
            return Ok(None);
        }

        if let Some(var) = self.resolve_macro(head, env) {
            let macro_fn = var.get()?;
            debug!(macro_var = %var, "macroexpand");
            let args: Vec<Value> = items.iter().skip(1).cloned().collect();
            let expanded = self.invoker.invoke_macro(&macro_fn, form, args)?;
            return Ok(Some(carry_position(form, expanded)?));
        }

        let name = head.name();
        if head.ns().is_none() && name.len() > 1 {
            if name.starts_with('.') && !name[1..].starts_with('.') {
                if items.len() < 2 {
                    return Err(Error::analysis(
                        form,
                        "Malformed member expression, expecting (.member target ...)",
                    ));
                }
                let member = Value::symbol(&name[1..]);
                let rewritten = Value::list(
                    [Value::symbol("."), items[1].clone(), member]
                        .into_iter()
                        .chain(items.iter().skip(2).cloned()),
                );
                return Ok(Some(rewritten.with_meta(form.meta().cloned())?));
            }
            if let Some(type_name) = name.strip_suffix('.') {
                if !type_name.ends_with('.') {
                    let rewritten = Value::list(
                        [Value::symbol("new"), Value::symbol(type_name)]
                            .into_iter()
                            .chain(items.iter().skip(1).cloned()),
                    );
                    return Ok(Some(rewritten.with_meta(form.meta().cloned())?));
                }
            }
        }
        Ok(None)
    }
}

/// Copies the call form's metadata onto a list expansion
fn carry_position(form: &Value, expanded: Value) -> Result<Value> {
    match (&expanded, form.meta()) {
        (Value::List(_), Some(meta)) => {
            let merged = merge_meta(expanded.meta(), Some(meta));
            expanded.with_meta(merged)
        }
        _ => Ok(expanded),
    }
}

pub(super) fn const_node(value: Value) -> Node {
    Node::new(value.clone(), NodeKind::Const(ConstNode { value }))
}

fn const_node_for(form: &Value, value: Value) -> Node {
    Node::new(form.clone(), NodeKind::Const(ConstNode { value }))
}

pub(super) fn expect_context(env: &Env, context: Context) -> bool {
    env.context == context
}
