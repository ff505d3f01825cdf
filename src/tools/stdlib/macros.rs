//! Bootstrap macros
//!
//! Each macro is a native fn flagged as a macro on its Var. Like user macros, it receives the
//! whole call form and a (nil) environment ahead of its operands and returns the expansion.

use im::OrdMap;

use crate::error::{Error, Result};
use crate::runtime::{merge_meta, Meta, Symbol, Value};
use crate::tools::{NativeFn, ToolRegistry};

/// Register bootstrap macros
pub fn register(registry: &mut ToolRegistry) {
    define(registry, "let", |ops| rename("let*", ops));
    define(registry, "loop", |ops| rename("loop*", ops));
    define(registry, "fn", |ops| rename("fn*", ops));
    define(registry, "defn", |ops| expand_defn("defn", ops, false));
    define(registry, "defmacro", |ops| expand_defn("defmacro", ops, true));
    define(registry, "letfn", expand_letfn);
    define(registry, "when", |ops| {
        let (test, body) = ops.split_first().ok_or_else(|| arity("when", ops))?;
        Ok(if_form(test.clone(), do_form(body), Value::Nil))
    });
    define(registry, "when-not", |ops| {
        let (test, body) = ops.split_first().ok_or_else(|| arity("when-not", ops))?;
        Ok(if_form(test.clone(), Value::Nil, do_form(body)))
    });
    define(registry, "if-not", |ops| match ops {
        [test, then] => Ok(if_form(test.clone(), Value::Nil, then.clone())),
        [test, then, otherwise] => Ok(if_form(test.clone(), otherwise.clone(), then.clone())),
        _ => Err(arity("if-not", ops)),
    });
    define(registry, "if-let", |ops| expand_if_let("if-let", ops));
    define(registry, "when-let", |ops| {
        let (bindings, body) = ops.split_first().ok_or_else(|| arity("when-let", ops))?;
        expand_if_let("when-let", &[bindings.clone(), do_form(body)])
    });
    define(registry, "cond", expand_cond);
    define(registry, "and", |ops| expand_logical(ops, true));
    define(registry, "or", |ops| expand_logical(ops, false));
    define(registry, "declare", |ops| {
        let defs = ops
            .iter()
            .map(|name| match name {
                Value::Symbol(_) => Ok(list([sym("def"), name.clone()])),
                other => Err(Error::illegal_argument(format!(
                    "declare expects symbols, had: {}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(do_form(&defs))
    });
    define(registry, "->", |ops| expand_thread(ops, false));
    define(registry, "->>", |ops| expand_thread(ops, true));
    define(registry, "case", expand_case);
    define(registry, "binding", expand_binding);
    define(registry, "dotimes", expand_dotimes);
    define(registry, "comment", |_| Ok(Value::Nil));
}

fn define(registry: &mut ToolRegistry, name: &str, expand: fn(&[Value]) -> Result<Value>) {
    let macro_name = name.to_string();
    registry.register_macro(NativeFn::new(name, None, move |args| {
        // args[0] is the call form and args[1] the environment
        let operands = args.get(2..).ok_or_else(|| {
            Error::illegal_argument(format!(
                "macro {} called without &form and &env",
                macro_name
            ))
        })?;
        expand(operands)
    }));
}

fn arity(name: &str, ops: &[Value]) -> Error {
    Error::illegal_argument(format!(
        "wrong number of arguments ({}) passed to {}",
        ops.len(),
        name
    ))
}

fn sym(name: &str) -> Value {
    Value::symbol(name)
}

fn list(items: impl IntoIterator<Item = Value>) -> Value {
    Value::list(items)
}

fn gensym(prefix: &str) -> Value {
    Value::Symbol(Symbol::gensym(prefix))
}

fn do_form(body: &[Value]) -> Value {
    list(std::iter::once(sym("do")).chain(body.iter().cloned()))
}

fn if_form(test: Value, then: Value, otherwise: Value) -> Value {
    list([sym("if"), test, then, otherwise])
}

fn rename(head: &str, ops: &[Value]) -> Result<Value> {
    Ok(list(std::iter::once(sym(head)).chain(ops.iter().cloned())))
}

fn binding_vector<'a>(name: &str, v: &'a Value) -> Result<&'a im::Vector<Value>> {
    match v {
        Value::Vector(v) => Ok(&v.items),
        _ => Err(Error::illegal_argument(format!(
            "{} requires a vector for its binding",
            name
        ))),
    }
}

// Definitions

/// `(defn name doc? attr-map? [params] body...)` and the multi-arity form
fn expand_defn(macro_name: &str, ops: &[Value], is_macro: bool) -> Result<Value> {
    let name = match ops.first() {
        Some(Value::Symbol(name)) => name.clone(),
        _ => {
            return Err(Error::illegal_argument(format!(
                "First argument to {} must be a symbol",
                macro_name
            )))
        }
    };

    let mut rest = &ops[1..];
    let mut extra = Meta::new();
    if let Some(Value::String(_)) = rest.first() {
        extra.insert(Value::keyword("doc"), rest[0].clone());
        rest = &rest[1..];
    }
    if let Some(Value::Map(attrs)) = rest.first() {
        extra = attrs.entries.clone().union(extra);
        rest = &rest[1..];
    }
    if rest.is_empty() {
        return Err(Error::illegal_argument(format!(
            "Parameter declaration missing in {} {}",
            macro_name, name
        )));
    }
    if is_macro {
        extra.insert(Value::keyword("macro"), Value::Bool(true));
    }

    let methods = if is_macro {
        with_macro_params(rest)?
    } else {
        rest.to_vec()
    };

    let self_name = Value::Symbol(name.with_meta(None));
    let fn_form = list([sym("fn*"), self_name].into_iter().chain(methods));
    let def_name = Value::Symbol(name.with_meta(merge_meta(name.meta(), Some(&extra))));
    Ok(list([sym("def"), def_name, fn_form]))
}

/// Prepends `&form` and `&env` to every parameter vector
fn with_macro_params(methods: &[Value]) -> Result<Vec<Value>> {
    let prepend = |params: &Value| -> Result<Value> {
        let items = match params {
            Value::Vector(v) => &v.items,
            other => {
                return Err(Error::illegal_argument(format!(
                    "Parameter declaration {} should be a vector",
                    other
                )))
            }
        };
        Ok(Value::vector(
            [sym("&form"), sym("&env")]
                .into_iter()
                .chain(items.iter().cloned()),
        ))
    };

    match methods.first() {
        Some(Value::Vector(_)) => {
            let mut out = vec![prepend(&methods[0])?];
            out.extend(methods[1..].iter().cloned());
            Ok(out)
        }
        _ => methods
            .iter()
            .map(|method| match method {
                Value::List(l) if !l.items.is_empty() => Ok(list(
                    std::iter::once(prepend(&l.items[0])?).chain(l.items.iter().skip(1).cloned()),
                )),
                other => Err(Error::illegal_argument(format!(
                    "Invalid macro method: {}",
                    other
                ))),
            })
            .collect(),
    }
}

/// `(letfn [(f [x] ...) ...] body...)`
fn expand_letfn(ops: &[Value]) -> Result<Value> {
    let (specs, body) = ops.split_first().ok_or_else(|| arity("letfn", ops))?;
    let mut bindings = Vec::new();
    for spec in binding_vector("letfn", specs)? {
        match spec {
            Value::List(l) if matches!(l.items.front(), Some(Value::Symbol(_))) => {
                let name = l.items[0].clone();
                bindings.push(name.clone());
                bindings.push(list(
                    [sym("fn*"), name]
                        .into_iter()
                        .chain(l.items.iter().skip(1).cloned()),
                ));
            }
            other => {
                return Err(Error::illegal_argument(format!(
                    "letfn expects (name [params] body) specs, had: {}",
                    other
                )))
            }
        }
    }
    Ok(list(
        [sym("letfn*"), Value::vector(bindings)]
            .into_iter()
            .chain(body.iter().cloned()),
    ))
}

// Control flow

fn expand_cond(ops: &[Value]) -> Result<Value> {
    if ops.len() % 2 != 0 {
        return Err(Error::illegal_argument(
            "cond requires an even number of forms",
        ));
    }
    Ok(ops
        .chunks(2)
        .rev()
        .fold(Value::Nil, |otherwise, clause| {
            if_form(clause[0].clone(), clause[1].clone(), otherwise)
        }))
}

/// `and` when `conjunction`, else `or`
fn expand_logical(ops: &[Value], conjunction: bool) -> Result<Value> {
    let (last, init) = match ops.split_last() {
        Some(split) => split,
        None => return Ok(if conjunction { Value::Bool(true) } else { Value::Nil }),
    };
    Ok(init.iter().rev().fold(last.clone(), |acc, x| {
        let g = gensym(if conjunction { "and__" } else { "or__" });
        let test = if conjunction {
            if_form(g.clone(), acc, g.clone())
        } else {
            if_form(g.clone(), g.clone(), acc)
        };
        list([sym("let*"), Value::vector([g, x.clone()]), test])
    }))
}

fn expand_if_let(name: &str, ops: &[Value]) -> Result<Value> {
    let (bindings, then, otherwise) = match ops {
        [b, then] => (b, then, Value::Nil),
        [b, then, otherwise] => (b, then, otherwise.clone()),
        _ => return Err(arity(name, ops)),
    };
    let pair = binding_vector(name, bindings)?;
    if pair.len() != 2 {
        return Err(Error::illegal_argument(format!(
            "{} requires exactly 2 forms in binding vector",
            name
        )));
    }
    let g = gensym("temp__");
    let bound = list([
        sym("let*"),
        Value::vector([pair[0].clone(), g.clone()]),
        then.clone(),
    ]);
    Ok(list([
        sym("let*"),
        Value::vector([g.clone(), pair[1].clone()]),
        if_form(g, bound, otherwise),
    ]))
}

fn expand_thread(ops: &[Value], last: bool) -> Result<Value> {
    let (init, steps) = ops.split_first().ok_or_else(|| arity("->", ops))?;
    steps.iter().try_fold(init.clone(), |acc, step| {
        Ok(match step {
            Value::List(l) if !l.items.is_empty() => {
                let mut items = l.items.clone();
                if last {
                    items.push_back(acc);
                } else {
                    items.insert(1, acc);
                }
                list(items).with_meta(l.meta.clone())?
            }
            other => list([other.clone(), acc]),
        })
    })
}

/// `(case e test then ... default?)` as a `case*` scanning tests in clause order
fn expand_case(ops: &[Value]) -> Result<Value> {
    let (expr, clauses) = ops.split_first().ok_or_else(|| arity("case", ops))?;
    let g = gensym("case__");

    let (pairs, default) = if clauses.len() % 2 == 1 {
        (&clauses[..clauses.len() - 1], clauses[clauses.len() - 1].clone())
    } else {
        let message = list([
            sym("str"),
            Value::string("No matching clause: "),
            g.clone(),
        ]);
        let ex = list([
            sym("ex-info"),
            message,
            Value::map(Vec::<(Value, Value)>::new()),
        ]);
        (clauses, list([sym("throw"), ex]))
    };

    let mut table = OrdMap::new();
    let mut seen = Vec::new();
    for clause in pairs.chunks(2) {
        // A list of constants shares one result
        let tests: Vec<Value> = match &clause[0] {
            Value::List(l) => l.items.iter().cloned().collect(),
            test => vec![test.clone()],
        };
        for test in tests {
            if seen.contains(&test) {
                return Err(Error::illegal_argument(format!(
                    "Duplicate case test constant: {}",
                    test
                )));
            }
            seen.push(test.clone());
            let key = Value::Int(table.len() as i64);
            table.insert(key, Value::vector([test, clause[1].clone()]));
        }
    }

    let case_star = list([
        sym("case*"),
        g.clone(),
        Value::Int(0),
        Value::Int(0),
        default,
        Value::map(table),
        Value::keyword("compact"),
        Value::keyword("hash-equiv"),
        Value::Nil,
    ]);
    Ok(list([
        sym("let*"),
        Value::vector([g, expr.clone()]),
        case_star,
    ]))
}

/// `(binding [var val ...] body...)`
fn expand_binding(ops: &[Value]) -> Result<Value> {
    let (bindings, body) = ops.split_first().ok_or_else(|| arity("binding", ops))?;
    let pairs = binding_vector("binding", bindings)?;
    if pairs.len() % 2 != 0 {
        return Err(Error::illegal_argument(
            "binding requires an even number of forms in binding vector",
        ));
    }

    let mut map_args = vec![sym("hash-map")];
    for (i, item) in pairs.iter().enumerate() {
        map_args.push(if i % 2 == 0 {
            list([sym("var"), item.clone()])
        } else {
            item.clone()
        });
    }

    let finally = list([sym("finally"), list([sym("pop-thread-bindings")])]);
    let guarded = list(
        std::iter::once(sym("try"))
            .chain(body.iter().cloned())
            .chain(std::iter::once(finally)),
    );
    Ok(list([
        sym("do"),
        list([sym("push-thread-bindings"), list(map_args)]),
        guarded,
    ]))
}

/// `(dotimes [i n] body...)`
fn expand_dotimes(ops: &[Value]) -> Result<Value> {
    let (bindings, body) = ops.split_first().ok_or_else(|| arity("dotimes", ops))?;
    let pair = binding_vector("dotimes", bindings)?;
    if pair.len() != 2 {
        return Err(Error::illegal_argument(
            "dotimes requires exactly 2 forms in binding vector",
        ));
    }
    let n = gensym("n__");
    let i = pair[0].clone();
    let step = list([sym("recur"), list([sym("inc"), i.clone()])]);
    let looped = list([
        sym("loop*"),
        Value::vector([i.clone(), Value::Int(0)]),
        if_form(
            list([sym("<"), i, n.clone()]),
            list(
                std::iter::once(sym("do"))
                    .chain(body.iter().cloned())
                    .chain(std::iter::once(step)),
            ),
            Value::Nil,
        ),
    ]);
    Ok(list([
        sym("let*"),
        Value::vector([n, pair[1].clone()]),
        looped,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;

    fn expand(name: &str, ops: &[Value]) -> Result<Value> {
        let mut registry = ToolRegistry::empty();
        register(&mut registry);
        let mut args = vec![Value::Nil, Value::Nil];
        args.extend(ops.iter().cloned());
        registry.get(name).unwrap().execute(&args)
    }

    fn read(source: &str) -> Value {
        crate::parser::read_str(source, "test").unwrap().remove(0)
    }

    #[test]
    fn test_all_registered_as_macros() {
        let mut registry = ToolRegistry::empty();
        register(&mut registry);
        for name in ["let", "defn", "defmacro", "case", "binding", "->"] {
            assert!(registry.is_macro(name), "{} should be a macro", name);
        }
    }

    #[test]
    fn test_when_and_cond() {
        let when = expand("when", &[sym("t"), Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(when.to_string(), "(if t (do 1 2) nil)");

        let cond = expand("cond", &[sym("a"), Value::Int(1), sym("b"), Value::Int(2)]).unwrap();
        assert_eq!(cond.to_string(), "(if a 1 (if b 2 nil))");
        assert!(expand("cond", &[sym("a")]).is_err());
    }

    #[test]
    fn test_defn_carries_doc_and_name() {
        let form = read("(defn f \"adds\" [x] (+ x 1))");
        let items: Vec<Value> = form.seq_items().unwrap();
        let expanded = expand("defn", &items[1..]).unwrap();
        assert_eq!(expanded.to_string(), "(def f (fn* f [x] (+ x 1)))");

        let def_items = expanded.seq_items().unwrap();
        let meta = def_items[1].meta().unwrap();
        assert_eq!(meta.get(&Value::keyword("doc")), Some(&Value::string("adds")));
    }

    #[test]
    fn test_defmacro_adds_implicit_params() {
        let form = read("(defmacro m [x] x)");
        let items = form.seq_items().unwrap();
        let expanded = expand("defmacro", &items[1..]).unwrap();
        assert_eq!(expanded.to_string(), "(def m (fn* m [&form &env x] x))");
        let name = &expanded.seq_items().unwrap()[1];
        assert_eq!(
            name.meta().unwrap().get(&Value::keyword("macro")),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn test_threading() {
        let first = read("(-> x (f 1) g)").seq_items().unwrap();
        assert_eq!(expand("->", &first[1..]).unwrap().to_string(), "(g (f x 1))");
        let last = read("(->> x (f 1) g)").seq_items().unwrap();
        assert_eq!(expand("->>", &last[1..]).unwrap().to_string(), "(g (f 1 x))");
    }

    #[test]
    fn test_case_rejects_duplicate_constants() {
        let form = read("(case x 1 :a 1 :b)").seq_items().unwrap();
        assert!(expand("case", &form[1..]).is_err());
    }

    #[test]
    fn test_binding_pops_in_finally() {
        let form = read("(binding [*x* 1] (f))").seq_items().unwrap();
        let text = expand("binding", &form[1..]).unwrap().to_string();
        assert_eq!(
            text,
            "(do (push-thread-bindings (hash-map (var *x*) 1)) (try (f) (finally (pop-thread-bindings))))"
        );
    }
}
