//! Analysis of the special forms

use std::collections::HashSet;
use std::sync::Arc;

use super::analyze::{const_node, expect_context};
use super::env::{Context, Env, LocalBinding};
use super::Analyzer;
use crate::ast::*;
use crate::error::{Error, Result};
use crate::runtime::{Meta, Symbol, Value};

fn operand_count(items: &[Value]) -> usize {
    items.len().saturating_sub(1)
}

fn wrong_args(form: &Value, op: &str, items: &[Value]) -> Error {
    Error::analysis(
        form,
        format!("wrong number of args to {}, had: {}", op, operand_count(items)),
    )
}

/// A symbol usable as a local name
fn binding_symbol(form: &Value, candidate: &Value) -> Result<Symbol> {
    match candidate {
        Value::Symbol(sym) if sym.is_valid_binding() => Ok(sym.clone()),
        other => Err(Error::analysis(form, format!("bad binding form: {}", other))),
    }
}

fn binding_node(sym: &Symbol, local: LocalKind, init: Option<Node>) -> BindingNode {
    BindingNode {
        form: Value::Symbol(sym.clone()),
        name: sym.with_meta(None),
        init: init.map(Box::new),
        local,
        arg_id: None,
        variadic: false,
    }
}

fn local_for(binding: &BindingNode) -> LocalBinding {
    LocalBinding {
        name: binding.name.clone(),
        local: binding.local,
        arg_id: binding.arg_id,
        variadic: binding.variadic,
    }
}

/// `(catch ...)` or `(finally ...)` clause of a `try`
fn clause_name(form: &Value) -> Option<&str> {
    let items = match form {
        Value::List(list) => &list.items,
        _ => return None,
    };
    match items.front() {
        Some(Value::Symbol(sym)) if sym.ns().is_none() => match sym.name() {
            "catch" => Some("catch"),
            "finally" => Some("finally"),
            _ => None,
        },
        _ => None,
    }
}

impl<'a> Analyzer<'a> {
    pub(super) fn analyze_do(&self, form: &Value, items: &[Value], env: &Env) -> Result<Node> {
        self.build_do(form, &items[1..], env)
    }

    pub(super) fn analyze_if(&self, form: &Value, items: &[Value], env: &Env) -> Result<Node> {
        if !(3..=4).contains(&items.len()) {
            return Err(wrong_args(form, "if", items));
        }
        let test = self.analyze_form(&items[1], &env.expr())?;
        let then = self.analyze_form(&items[2], env)?;
        let else_ = match items.get(3) {
            Some(else_form) => self.analyze_form(else_form, env)?,
            None => const_node(Value::Nil),
        };
        Ok(Node::new(
            form.clone(),
            NodeKind::If(IfNode {
                test: Box::new(test),
                then: Box::new(then),
                else_: Box::new(else_),
            }),
        ))
    }

    pub(super) fn analyze_quote(&self, form: &Value, items: &[Value]) -> Result<Node> {
        if items.len() != 2 {
            return Err(wrong_args(form, "quote", items));
        }
        Ok(Node::new(
            form.clone(),
            NodeKind::Quote(QuoteNode {
                value: items[1].clone(),
            }),
        ))
    }

    // Binding forms

    fn binding_pairs(&self, form: &Value, op: &str, bindings: Option<&Value>) -> Result<Vec<Value>> {
        let items: Vec<Value> = match bindings {
            Some(Value::Vector(v)) => v.items.iter().cloned().collect(),
            Some(other) => {
                return Err(Error::analysis(
                    form,
                    format!("{} requires a vector for its bindings, had: {}", op, other.type_name()),
                ))
            }
            None => {
                return Err(Error::analysis(
                    form,
                    format!("{} requires a vector for its bindings, had: nil", op),
                ))
            }
        };
        if items.len() % 2 != 0 {
            return Err(Error::analysis(
                form,
                format!(
                    "{} requires an even number of forms in binding vector, had: {}",
                    op,
                    items.len()
                ),
            ));
        }
        Ok(items)
    }

    pub(super) fn analyze_let(
        &self,
        form: &Value,
        items: &[Value],
        env: &Env,
        is_loop: bool,
    ) -> Result<Node> {
        let op = if is_loop { "loop*" } else { "let*" };
        let pairs = self.binding_pairs(form, op, items.get(1))?;
        let kind = if is_loop { LocalKind::Loop } else { LocalKind::Let };

        let mut scope = env.clone();
        let mut bindings = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks(2) {
            let sym = binding_symbol(form, &pair[0])?;
            let init = self.analyze_form(&pair[1], &scope.expr())?;
            let binding = binding_node(&sym, kind, Some(init));
            scope = scope.with_local(local_for(&binding));
            bindings.push(binding);
        }

        let body_forms = &items[2..];
        if is_loop {
            let loop_id = LoopId::fresh();
            let body_env = scope.ret().with_loop(loop_id, bindings.len());
            let body = self.analyze_body(body_forms, &body_env)?;
            Ok(Node::new(
                form.clone(),
                NodeKind::Loop(LoopNode {
                    loop_id,
                    bindings,
                    body: Box::new(body),
                }),
            ))
        } else {
            let body = self.analyze_body(body_forms, &scope.with_context(env.context))?;
            Ok(Node::new(
                form.clone(),
                NodeKind::Let(LetNode {
                    bindings,
                    body: Box::new(body),
                }),
            ))
        }
    }

    pub(super) fn analyze_letfn(&self, form: &Value, items: &[Value], env: &Env) -> Result<Node> {
        let pairs = self.binding_pairs(form, "letfn*", items.get(1))?;

        let mut scope = env.clone();
        let mut names = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks(2) {
            let sym = binding_symbol(form, &pair[0])?;
            scope = scope.with_local(LocalBinding::new(sym.with_meta(None), LocalKind::LetFn));
            names.push(sym);
        }

        let init_env = scope.expr();
        let mut bindings = Vec::with_capacity(names.len());
        for (sym, pair) in names.iter().zip(pairs.chunks(2)) {
            let init = self.analyze_form(&pair[1], &init_env)?;
            bindings.push(binding_node(sym, LocalKind::LetFn, Some(init)));
        }
        let body = self.analyze_body(&items[2..], &scope.with_context(env.context))?;
        Ok(Node::new(
            form.clone(),
            NodeKind::LetFn(LetFnNode {
                bindings,
                body: Box::new(body),
            }),
        ))
    }

    pub(super) fn analyze_recur(&self, form: &Value, items: &[Value], env: &Env) -> Result<Node> {
        let (loop_id, arity) = match (env.loop_id, env.loop_locals) {
            (Some(id), Some(arity)) if expect_context(env, Context::Return) => (id, arity),
            _ => return Err(Error::analysis(form, "can only recur from tail position")),
        };
        if env.in_try {
            return Err(Error::analysis(form, "cannot recur across try"));
        }
        let argc = operand_count(items);
        if argc != arity {
            return Err(Error::analysis(
                form,
                format!(
                    "mismatched argument count to recur, expected: {} args, had: {}",
                    arity, argc
                ),
            ));
        }
        let exprs = self.analyze_all(items[1..].iter(), &env.expr())?;
        Ok(Node::new(
            form.clone(),
            NodeKind::Recur(RecurNode { exprs, loop_id }),
        ))
    }

    // Functions

    pub(super) fn analyze_fn(&self, form: &Value, items: &[Value], env: &Env) -> Result<Node> {
        let mut rest = &items[1..];
        let mut fn_env = env.expr();

        let local = match rest.first() {
            Some(Value::Symbol(sym)) => {
                let sym = binding_symbol(form, &Value::Symbol(sym.clone()))?;
                rest = &rest[1..];
                let binding = binding_node(&sym, LocalKind::FnSelf, None);
                fn_env = fn_env.with_local(local_for(&binding));
                Some(binding)
            }
            _ => None,
        };

        let method_forms: Vec<Value> = match rest.first() {
            Some(Value::Vector(_)) => vec![Value::list(rest.iter().cloned())],
            _ => rest.to_vec(),
        };
        if method_forms.is_empty() {
            return Err(Error::analysis(form, "invalid fn method"));
        }

        let methods = method_forms
            .iter()
            .map(|method| self.analyze_fn_method(method, &fn_env))
            .collect::<Result<Vec<_>>>()?;

        let variadic: Vec<&FnMethodNode> = methods.iter().filter(|m| m.variadic).collect();
        if variadic.len() > 1 {
            return Err(Error::analysis(form, "can't have more than 1 variadic overload"));
        }
        let mut seen = HashSet::new();
        for method in methods.iter().filter(|m| !m.variadic) {
            if !seen.insert(method.fixed_arity) {
                return Err(Error::analysis(
                    form,
                    "can't have 2 or more overloads with the same arity",
                ));
            }
        }
        if let Some(v) = variadic.first() {
            if methods
                .iter()
                .any(|m| !m.variadic && m.fixed_arity > v.fixed_arity)
            {
                return Err(Error::analysis(
                    form,
                    "can't have fixed arity overload with more params than variadic overload",
                ));
            }
        }

        let is_variadic = !variadic.is_empty();
        let max_fixed_arity = methods.iter().map(|m| m.fixed_arity).max().unwrap_or(0);
        let fn_node = FnNode {
            local,
            methods,
            variadic: is_variadic,
            max_fixed_arity,
        };
        self.wrap_literal_meta(form, NodeKind::Fn(Arc::new(fn_node)), env)
    }

    fn analyze_fn_method(&self, method: &Value, env: &Env) -> Result<FnMethodNode> {
        let items: Vec<Value> = match method {
            Value::List(list) => list.items.iter().cloned().collect(),
            other => return Err(Error::analysis(other, "invalid fn method")),
        };
        let params = match items.first() {
            Some(Value::Vector(v)) => v.items.iter().cloned().collect::<Vec<_>>(),
            _ => return Err(Error::analysis(method, "parameter declaration should be a vector")),
        };

        let mut bindings = Vec::with_capacity(params.len());
        let mut variadic = false;
        for (idx, param) in params.iter().enumerate() {
            let sym = match param {
                Value::Symbol(sym) if sym.is_valid_binding() => sym,
                other => {
                    return Err(Error::analysis(
                        method,
                        format!("params must be valid binding symbols, had: {}", other),
                    ))
                }
            };
            if sym.name() == "&" {
                let rest: Vec<&Value> = params[idx + 1..].iter().collect();
                if rest.len() != 1 {
                    return Err(Error::analysis(
                        method,
                        "variadic method must have exactly 1 param",
                    ));
                }
                let rest_sym = match rest[0] {
                    Value::Symbol(s) if s.name() == "&" => {
                        return Err(Error::analysis(
                            method,
                            "can't have more than 1 variadic param",
                        ))
                    }
                    Value::Symbol(s) if s.is_valid_binding() => s,
                    other => {
                        return Err(Error::analysis(
                            method,
                            format!("params must be valid binding symbols, had: {}", other),
                        ))
                    }
                };
                let mut binding = binding_node(rest_sym, LocalKind::Arg, None);
                binding.arg_id = Some(bindings.len());
                binding.variadic = true;
                bindings.push(binding);
                variadic = true;
                break;
            }
            let mut binding = binding_node(sym, LocalKind::Arg, None);
            binding.arg_id = Some(idx);
            bindings.push(binding);
        }

        let fixed_arity = if variadic {
            bindings.len() - 1
        } else {
            bindings.len()
        };
        let loop_id = LoopId::fresh();
        let mut body_env = env.clone();
        for binding in &bindings {
            body_env = body_env.with_local(local_for(binding));
        }
        let body_env = body_env.ret().with_loop(loop_id, bindings.len());
        let body = self.analyze_body(&items[1..], &body_env)?;

        Ok(FnMethodNode {
            form: method.clone(),
            params: bindings,
            fixed_arity,
            variadic,
            loop_id,
            body: Box::new(body),
        })
    }

    // Vars

    pub(super) fn analyze_def(&self, form: &Value, items: &[Value], env: &Env) -> Result<Node> {
        if items.len() > 4 {
            return Err(Error::analysis(form, "invalid def"));
        }
        let sym = match items.get(1) {
            Some(Value::Symbol(sym)) => sym.clone(),
            _ => return Err(Error::analysis(form, "first argument to def must be a symbol")),
        };
        if let Some(ns) = sym.ns() {
            if ns != env.ns.name() {
                return Err(Error::analysis(form, "can't def namespace-qualified symbol"));
            }
        }

        let (doc, init_form) = match items.len() {
            4 => match &items[2] {
                Value::String(doc) => (Some(doc.to_string()), Some(&items[3])),
                _ => return Err(Error::analysis(form, "doc must be a string")),
            },
            3 => (None, Some(&items[2])),
            _ => (None, None),
        };

        let var = self
            .current_ns(env)
            .intern(&sym.without_ns())
            .map_err(|e| Error::analysis(form, e.to_string()))?;

        let mut meta: Meta = sym.meta().cloned().unwrap_or_default();
        if let Some(doc) = &doc {
            meta.insert(Value::keyword("doc"), Value::string(doc));
        }
        if let Some(arglists) = init_form.and_then(arglists_of) {
            meta.insert(
                Value::keyword("arglists"),
                Value::list([Value::symbol("quote"), arglists]),
            );
        }
        if let Some(line) = form.meta().and_then(|m| m.get(&Value::keyword("line"))) {
            let key = Value::keyword("line");
            if !meta.contains_key(&key) {
                meta.insert(key, line.clone());
            }
        }

        let meta_node = if meta.is_empty() {
            None
        } else {
            Some(Box::new(self.analyze_form(&Value::map(meta), &env.expr())?))
        };
        let init = match init_form {
            Some(init) => Some(Box::new(self.analyze_form(init, &env.expr())?)),
            None => None,
        };

        Ok(Node::new(
            form.clone(),
            NodeKind::Def(DefNode {
                name: sym.without_ns().with_meta(None),
                var,
                meta: meta_node,
                init,
                doc,
            }),
        ))
    }

    pub(super) fn analyze_set_bang(&self, form: &Value, items: &[Value], env: &Env) -> Result<Node> {
        if items.len() != 3 {
            return Err(wrong_args(form, "set!", items));
        }
        let env = env.expr();
        let target = self.analyze_form(&items[1], &env)?;
        let value = self.analyze_form(&items[2], &env)?;
        Ok(Node::new(
            form.clone(),
            NodeKind::SetBang(SetBangNode {
                target: Box::new(target),
                value: Box::new(value),
            }),
        ))
    }

    pub(super) fn analyze_the_var(&self, form: &Value, items: &[Value], env: &Env) -> Result<Node> {
        if items.len() != 2 {
            return Err(wrong_args(form, "var", items));
        }
        let var = match &items[1] {
            Value::Symbol(sym) => match self.resolve(sym, env) {
                Some(Value::Var(var)) => var,
                _ => return Err(Error::analysis(form, format!("var not found: {}", sym))),
            },
            other => return Err(Error::analysis(form, format!("var not found: {}", other))),
        };
        Ok(Node::new(form.clone(), NodeKind::TheVar(TheVarNode { var })))
    }

    // Exceptions

    pub(super) fn analyze_try(&self, form: &Value, items: &[Value], env: &Env) -> Result<Node> {
        let mut body_forms = Vec::new();
        let mut catch_forms = Vec::new();
        let mut finally_form: Option<&Value> = None;

        for item in &items[1..] {
            match clause_name(item) {
                Some("catch") => {
                    if finally_form.is_some() {
                        return Err(Error::analysis(
                            form,
                            "only catch or finally clause can follow catch in try expression",
                        ));
                    }
                    catch_forms.push(item);
                }
                Some(_) => {
                    if finally_form.is_some() {
                        return Err(Error::analysis(
                            form,
                            "only one finally clause allowed in try expression",
                        ));
                    }
                    finally_form = Some(item);
                }
                None => {
                    if !catch_forms.is_empty() || finally_form.is_some() {
                        return Err(Error::analysis(
                            form,
                            "only catch or finally clause can follow catch in try expression",
                        ));
                    }
                    body_forms.push(item.clone());
                }
            }
        }

        let body = self.analyze_body(&body_forms, &env.in_try())?;
        let catches = catch_forms
            .into_iter()
            .map(|clause| self.analyze_catch(clause, env))
            .collect::<Result<Vec<_>>>()?;
        let finally = match finally_form.and_then(|f| f.sequential_items()) {
            Some(clause) => {
                let forms: Vec<Value> = clause.iter().skip(1).cloned().collect();
                Some(Box::new(self.analyze_body(&forms, &env.statement())?))
            }
            None => None,
        };

        Ok(Node::new(
            form.clone(),
            NodeKind::Try(TryNode {
                body: Box::new(body),
                catches,
                finally,
            }),
        ))
    }

    fn analyze_catch(&self, clause: &Value, env: &Env) -> Result<CatchNode> {
        let items: Vec<Value> = clause
            .sequential_items()
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default();
        if items.len() < 3 {
            return Err(Error::analysis(
                clause,
                format!("bad binding form: {}", items.get(2).unwrap_or(&Value::Nil)),
            ));
        }
        let class = self.analyze_form(&items[1], &env.without_locals().expr())?;
        let sym = binding_symbol(clause, &items[2])?;
        let local = binding_node(&sym, LocalKind::Catch, None);
        let body_env = env.expr().outside_try().with_local(local_for(&local));
        let body = self.analyze_body(&items[3..], &body_env)?;
        Ok(CatchNode {
            class: Box::new(class),
            local,
            body: Box::new(body),
        })
    }

    pub(super) fn analyze_throw(&self, form: &Value, items: &[Value], env: &Env) -> Result<Node> {
        if items.len() != 2 {
            return Err(wrong_args(form, "throw", items));
        }
        let exception = self.analyze_form(&items[1], &env.expr())?;
        Ok(Node::new(
            form.clone(),
            NodeKind::Throw(ThrowNode {
                exception: Box::new(exception),
            }),
        ))
    }

    // Dispatch

    pub(super) fn analyze_case(&self, form: &Value, items: &[Value], env: &Env) -> Result<Node> {
        // seven operands, plus an optional skip-check set
        if !(8..=9).contains(&items.len()) {
            return Err(wrong_args(form, "case*", items));
        }
        let int_at = |idx: usize| match &items[idx] {
            Value::Int(n) => Ok(*n),
            other => Err(Error::analysis(
                form,
                format!("case* expects an integer, had: {}", other),
            )),
        };
        let shift = int_at(2)?;
        let mask = int_at(3)?;

        let switch_type = match &items[6] {
            Value::Keyword(k) if k.name() == "compact" => SwitchType::Compact,
            Value::Keyword(k) if k.name() == "sparse" => SwitchType::Sparse,
            other => {
                return Err(Error::analysis(
                    form,
                    format!("unexpected shift type: {}", other),
                ))
            }
        };
        let test_type = match &items[7] {
            Value::Keyword(k) if k.name() == "int" => TestType::Int,
            Value::Keyword(k) if k.name() == "hash-identity" => TestType::HashIdentity,
            Value::Keyword(k) if k.name() == "hash-equiv" => TestType::HashEquiv,
            other => {
                return Err(Error::analysis(
                    form,
                    format!("unexpected test type: {}", other),
                ))
            }
        };

        let case_map = match &items[5] {
            Value::Map(map) => map.entries.clone(),
            other => {
                return Err(Error::analysis(
                    form,
                    format!("case* expects a map of tests, had: {}", other.type_name()),
                ))
            }
        };

        let test = self.analyze_form(&items[1], &env.expr())?;
        let default = self.analyze_form(&items[4], env)?;
        let mut entries = Vec::with_capacity(case_map.len());
        for (_, entry) in case_map.iter() {
            let pair = match entry.sequential_items() {
                Some(pair) if pair.len() == 2 => pair,
                _ => {
                    return Err(Error::analysis(
                        form,
                        format!("case* entries must be [test then] pairs, had: {}", entry),
                    ))
                }
            };
            entries.push(CaseEntry {
                test: Box::new(const_node(pair[0].clone())),
                then: Box::new(self.analyze_form(&pair[1], env)?),
            });
        }

        Ok(Node::new(
            form.clone(),
            NodeKind::Case(CaseNode {
                test: Box::new(test),
                entries,
                default: Box::new(default),
                shift,
                mask,
                switch_type,
                test_type,
                skip_check: items.get(8).cloned(),
            }),
        ))
    }

    // Host interop

    pub(super) fn analyze_new(&self, form: &Value, items: &[Value], env: &Env) -> Result<Node> {
        if items.len() < 2 {
            return Err(wrong_args(form, "new", items));
        }
        let class = self.analyze_form(&items[1], &env.without_locals().expr())?;
        let args = self.analyze_all(items[2..].iter(), &env.expr())?;
        Ok(Node::new(
            form.clone(),
            NodeKind::New(NewNode {
                class: Box::new(class),
                args,
            }),
        ))
    }

    pub(super) fn analyze_dot(&self, form: &Value, items: &[Value], env: &Env) -> Result<Node> {
        if items.len() < 3 {
            return Err(Error::analysis(
                form,
                "Malformed member expression, expecting (. target member ...)",
            ));
        }
        let env = env.expr();
        let target = Box::new(self.analyze_form(&items[1], &env)?);
        let method_name = |value: &Value| match value {
            Value::Symbol(sym) => Ok(sym.with_meta(None)),
            other => Err(Error::analysis(
                form,
                format!("method name must be a symbol, had: {}", other.type_name()),
            )),
        };

        // (. target (method args*))
        if let Value::List(call) = &items[2] {
            let method = method_name(call.items.front().unwrap_or(&Value::Nil))?;
            let args = self.analyze_all(call.items.iter().skip(1), &env)?;
            return Ok(Node::new(
                form.clone(),
                NodeKind::HostCall(HostCallNode {
                    target,
                    method,
                    args,
                }),
            ));
        }

        let member = method_name(&items[2])?;
        if items.len() > 3 {
            let args = self.analyze_all(items[3..].iter(), &env)?;
            return Ok(Node::new(
                form.clone(),
                NodeKind::HostCall(HostCallNode {
                    target,
                    method: member,
                    args,
                }),
            ));
        }
        if let Some(field) = member.name().strip_prefix('-') {
            return Ok(Node::new(
                form.clone(),
                NodeKind::HostField(HostFieldNode {
                    target,
                    field: Symbol::simple(field),
                }),
            ));
        }
        Ok(Node::new(
            form.clone(),
            NodeKind::HostInterop(HostInteropNode { target, member }),
        ))
    }
}

/// `([x] [x y])` for an initializer of the form `(fn* ...)`
fn arglists_of(init: &Value) -> Option<Value> {
    let items = init.sequential_items()?;
    match items.front() {
        Some(Value::Symbol(sym)) if sym.ns().is_none() && sym.name() == "fn*" => {}
        _ => return None,
    }
    let mut rest: Vec<Value> = items.iter().skip(1).cloned().collect();
    if let Some(Value::Symbol(_)) = rest.first() {
        rest.remove(0);
    }
    let params: Vec<Value> = match rest.first() {
        Some(v @ Value::Vector(_)) => vec![v.clone()],
        _ => rest
            .iter()
            .filter_map(|method| method.sequential_items()?.front().cloned())
            .collect(),
    };
    Some(Value::list(params))
}
