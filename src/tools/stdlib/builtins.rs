//! Builtin fns: predicates, strings, exceptions, Vars and dynamic bindings

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::runtime::{apply, bindings, Exception, HostRegistry, Keyword, Symbol, Value, Var};
use crate::tools::{NativeFn, ToolRegistry};

/// Register core tools
pub fn register(registry: &mut ToolRegistry, host: &Arc<HostRegistry>) {
    register_predicates(registry);
    register_text(registry);
    register_types(registry, host);
    register_exceptions(registry, host);
    register_vars(registry);
}

fn predicate(registry: &mut ToolRegistry, name: &str, test: fn(&Value) -> bool) {
    registry.register(NativeFn::new(name, Some(1), move |args| {
        Ok(Value::Bool(test(&args[0])))
    }));
}

fn register_predicates(registry: &mut ToolRegistry) {
    predicate(registry, "not", |v| !v.is_truthy());
    predicate(registry, "nil?", Value::is_nil);
    predicate(registry, "some?", |v| !v.is_nil());
    predicate(registry, "true?", |v| matches!(v, Value::Bool(true)));
    predicate(registry, "false?", |v| matches!(v, Value::Bool(false)));
    predicate(registry, "boolean?", |v| matches!(v, Value::Bool(_)));
    predicate(registry, "number?", |v| matches!(v, Value::Int(_) | Value::Float(_)));
    predicate(registry, "integer?", |v| matches!(v, Value::Int(_)));
    predicate(registry, "float?", |v| matches!(v, Value::Float(_)));
    predicate(registry, "string?", |v| matches!(v, Value::String(_)));
    predicate(registry, "char?", |v| matches!(v, Value::Char(_)));
    predicate(registry, "symbol?", |v| matches!(v, Value::Symbol(_)));
    predicate(registry, "keyword?", |v| matches!(v, Value::Keyword(_)));
    predicate(registry, "fn?", Value::is_fn);
    predicate(registry, "list?", Value::is_list);
    predicate(registry, "seq?", Value::is_list);
    predicate(registry, "vector?", |v| matches!(v, Value::Vector(_)));
    predicate(registry, "map?", |v| matches!(v, Value::Map(_)));
    predicate(registry, "set?", |v| matches!(v, Value::Set(_)));
    predicate(registry, "sequential?", Value::is_sequential);
    predicate(registry, "coll?", |v| {
        matches!(
            v,
            Value::List(_) | Value::Vector(_) | Value::Map(_) | Value::Set(_)
        )
    });
    predicate(registry, "var?", |v| matches!(v, Value::Var(_)));

    registry.register(NativeFn::new("identity", Some(1), |args| Ok(args[0].clone())));
    registry.register(NativeFn::new("boolean", Some(1), |args| {
        Ok(Value::Bool(args[0].is_truthy()))
    }));
    registry.register(NativeFn::new("=", None, |args| {
        if args.is_empty() {
            return Err(Error::illegal_argument(
                "wrong number of arguments (0) passed to =",
            ));
        }
        Ok(Value::Bool(args.windows(2).all(|pair| pair[0] == pair[1])))
    }));
    registry.register(NativeFn::new("not=", None, |args| {
        if args.is_empty() {
            return Err(Error::illegal_argument(
                "wrong number of arguments (0) passed to not=",
            ));
        }
        Ok(Value::Bool(!args.windows(2).all(|pair| pair[0] == pair[1])))
    }));
    registry.register(NativeFn::new("compare", Some(2), |args| {
        Ok(Value::Int(match args[0].cmp(&args[1]) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }))
    }));
}

fn register_text(registry: &mut ToolRegistry) {
    registry.register(
        NativeFn::new("str", None, |args| {
            Ok(Value::string(
                args.iter().map(Value::to_str_value).collect::<String>(),
            ))
        })
        .with_description("Concatenation of the text of each argument; nil is empty"),
    );
    registry.register(NativeFn::new("pr-str", None, |args| {
        let printed: Vec<String> = args.iter().map(Value::to_string).collect();
        Ok(Value::string(printed.join(" ")))
    }));
    registry.register(NativeFn::new("name", Some(1), |args| match &args[0] {
        Value::String(_) => Ok(args[0].clone()),
        Value::Symbol(s) => Ok(Value::string(s.name())),
        Value::Keyword(k) => Ok(Value::string(k.name())),
        other => Err(Error::type_error("named value", other)),
    }));
    registry.register(NativeFn::new("namespace", Some(1), |args| {
        let ns = match &args[0] {
            Value::Symbol(s) => s.ns(),
            Value::Keyword(k) => k.ns(),
            other => return Err(Error::type_error("named value", other)),
        };
        Ok(ns.map_or(Value::Nil, Value::string))
    }));
    registry.register(NativeFn::new("keyword", None, |args| match args {
        [Value::Keyword(_)] => Ok(args[0].clone()),
        [Value::Symbol(s)] => Ok(Value::Keyword(Keyword::intern(&s.to_string()))),
        [Value::String(s)] => Ok(Value::Keyword(Keyword::intern(s))),
        [Value::Nil, name] => Ok(Value::Keyword(Keyword::intern(
            name_of(name).ok_or_else(|| Error::type_error("name", name))?,
        ))),
        [Value::String(ns), name] => Ok(Value::Keyword(Keyword::intern(&format!(
            "{}/{}",
            ns,
            name_of(name).ok_or_else(|| Error::type_error("name", name))?
        )))),
        _ => Err(Error::illegal_argument("keyword expects a name or a namespace and name")),
    }));
    registry.register(NativeFn::new("symbol", None, |args| match args {
        [Value::Symbol(_)] => Ok(args[0].clone()),
        [Value::String(s)] => Ok(Value::Symbol(Symbol::intern(s))),
        [Value::Keyword(k)] => Ok(Value::Symbol(match k.ns() {
            Some(ns) => Symbol::qualified(ns, k.name()),
            None => Symbol::simple(k.name()),
        })),
        [Value::Nil, name] => Ok(Value::Symbol(Symbol::simple(name.as_str()?))),
        [Value::String(ns), name] => Ok(Value::Symbol(Symbol::qualified(ns, name.as_str()?))),
        _ => Err(Error::illegal_argument("symbol expects a name or a namespace and name")),
    }));
    registry.register(
        NativeFn::new("gensym", None, |args| {
            let prefix = match args {
                [] => "G__".to_string(),
                [prefix] => prefix.to_str_value(),
                _ => {
                    return Err(Error::illegal_argument(format!(
                        "wrong number of arguments ({}) passed to gensym",
                        args.len()
                    )))
                }
            };
            Ok(Value::Symbol(Symbol::gensym(&prefix)))
        })
        .with_description("Fresh symbol with a unique numeric suffix"),
    );
}

fn name_of(v: &Value) -> Option<&str> {
    match v {
        Value::String(s) => Some(s),
        Value::Symbol(s) => Some(s.name()),
        _ => None,
    }
}

fn register_types(registry: &mut ToolRegistry, host: &Arc<HostRegistry>) {
    let types = host.clone();
    registry.register(NativeFn::new("type", Some(1), move |args| {
        Ok(types.type_of(&args[0]).map_or(Value::Nil, Value::Class))
    }));
    let types = host.clone();
    registry.register(NativeFn::new("class", Some(1), move |args| {
        Ok(types.type_of(&args[0]).map_or(Value::Nil, Value::Class))
    }));
    let types = host.clone();
    registry.register(
        NativeFn::new("instance?", Some(2), move |args| match &args[0] {
            Value::Class(class) => Ok(Value::Bool(types.is_instance(class, &args[1]))),
            other => Err(Error::type_error("Class", other)),
        })
        .with_description("Whether x is an instance of class c or one of its subtypes"),
    );
    registry.register(NativeFn::new("meta", Some(1), |args| {
        Ok(match &args[0] {
            Value::Var(var) => Value::map(var.meta()),
            other => other.meta().cloned().map_or(Value::Nil, Value::map),
        })
    }));
    registry.register(NativeFn::new("with-meta", Some(2), |args| {
        let meta = match &args[1] {
            Value::Nil => None,
            Value::Map(m) => Some(m.entries.clone()),
            other => return Err(Error::type_error("map", other)),
        };
        args[0].with_meta(meta)
    }));
}

fn register_exceptions(registry: &mut ToolRegistry, host: &Arc<HostRegistry>) {
    let types = host.clone();
    registry.register(
        NativeFn::new("ex-info", None, move |args| {
            let (message, data, cause) = match args {
                [message, data] => (message, data, None),
                [message, data, cause] => (message, data, Some(cause.clone())),
                _ => {
                    return Err(Error::illegal_argument(format!(
                        "wrong number of arguments ({}) passed to ex-info",
                        args.len()
                    )))
                }
            };
            let data = match data {
                Value::Map(_) => data.clone(),
                Value::Nil => Value::map(Vec::<(Value, Value)>::new()),
                other => return Err(Error::type_error("map", other)),
            };
            let ty = types
                .resolve_type("ExceptionInfo")
                .ok_or_else(|| Error::runtime("ExceptionInfo type is not registered"))?;
            Ok(Value::Exception(Arc::new(Exception::new(
                ty,
                Some(message.to_str_value()),
                Some(data),
                cause,
            ))))
        })
        .with_description("Exception carrying a message and a data map"),
    );
    registry.register(NativeFn::new("ex-message", Some(1), |args| {
        Ok(match &args[0] {
            Value::Exception(e) => e.message().map_or(Value::Nil, Value::string),
            _ => Value::Nil,
        })
    }));
    registry.register(NativeFn::new("ex-data", Some(1), |args| {
        Ok(match &args[0] {
            Value::Exception(e) => e.data().cloned().unwrap_or(Value::Nil),
            _ => Value::Nil,
        })
    }));
    registry.register(NativeFn::new("ex-cause", Some(1), |args| {
        Ok(match &args[0] {
            Value::Exception(e) => e.cause().cloned().unwrap_or(Value::Nil),
            _ => Value::Nil,
        })
    }));
}

fn as_var(v: &Value) -> Result<&Arc<Var>> {
    match v {
        Value::Var(var) => Ok(var),
        other => Err(Error::type_error("Var", other)),
    }
}

fn register_vars(registry: &mut ToolRegistry) {
    registry.register(NativeFn::new("var-get", Some(1), |args| as_var(&args[0])?.get()));
    registry.register(NativeFn::new("var-set", Some(2), |args| {
        as_var(&args[0])?.set(args[1].clone())
    }));
    registry.register(NativeFn::new("deref", Some(1), |args| match &args[0] {
        Value::Var(var) => var.get(),
        other => Err(Error::type_error("Var", other)),
    }));
    registry.register(NativeFn::new("bound?", Some(1), |args| {
        Ok(Value::Bool(as_var(&args[0])?.is_bound()))
    }));
    registry.register(NativeFn::new("thread-bound?", Some(1), |args| {
        Ok(Value::Bool(bindings::lookup(as_var(&args[0])?).is_some()))
    }));
    registry.register(
        NativeFn::new("alter-var-root", None, |args| {
            let (var, f, extra) = match args {
                [var, f, extra @ ..] => (as_var(var)?, f, extra),
                _ => {
                    return Err(Error::illegal_argument(format!(
                        "wrong number of arguments ({}) passed to alter-var-root",
                        args.len()
                    )))
                }
            };
            var.alter_root(|old| {
                let mut call_args = vec![old.unwrap_or(Value::Nil)];
                call_args.extend(extra.iter().cloned());
                apply(f, call_args)
            })
        })
        .with_description("Atomically replaces the root of v with (apply f root args)"),
    );
    registry.register(
        NativeFn::new("push-thread-bindings", Some(1), |args| {
            let map = match &args[0] {
                Value::Map(m) => m,
                other => return Err(Error::type_error("map of Var to value", other)),
            };
            let frame = map
                .entries
                .iter()
                .map(|(k, v)| Ok((as_var(k)?.clone(), v.clone())))
                .collect::<Result<Vec<_>>>()?;
            bindings::push_thread_bindings(frame)?;
            Ok(Value::Nil)
        })
        .with_description("Pushes a frame of dynamic bindings; pair with pop-thread-bindings"),
    );
    registry.register(NativeFn::new("pop-thread-bindings", Some(0), |_| {
        bindings::pop_thread_bindings()?;
        Ok(Value::Nil)
    }));
}
