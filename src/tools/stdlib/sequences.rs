//! Collection and sequence functions
//!
//! There are no lazy seqs: every sequence operation realizes its result as a list.

use im::{OrdMap, OrdSet, Vector as ImVector};

use crate::error::{Error, Result};
use crate::runtime::{apply, function, Value};
use crate::tools::{NativeFn, Tool, ToolRegistry};

/// Register sequence tools
pub fn register(registry: &mut ToolRegistry) {
    register_constructors(registry);
    register_access(registry);
    register_update(registry);
    register_higher_order(registry);
}

fn arity(name: &str, argc: usize) -> Error {
    Error::illegal_argument(format!(
        "wrong number of arguments ({}) passed to {}",
        argc, name
    ))
}

/// Items of `coll` as a list, or nil when empty
fn seq(coll: &Value) -> Result<Value> {
    let items = coll.seq_items()?;
    Ok(if items.is_empty() {
        Value::Nil
    } else {
        Value::list(items)
    })
}

fn register_constructors(registry: &mut ToolRegistry) {
    registry.register(NativeFn::new("list", None, |args| {
        Ok(Value::list(args.iter().cloned()))
    }));
    registry.register(NativeFn::new("vector", None, |args| {
        Ok(Value::vector(args.iter().cloned()))
    }));
    registry.register(NativeFn::new("vec", Some(1), |args| {
        Ok(Value::vector(args[0].seq_items()?))
    }));
    registry.register(NativeFn::new("hash-map", None, |args| {
        if args.len() % 2 != 0 {
            return Err(Error::illegal_argument(
                "No value supplied for key: hash-map takes an even number of arguments",
            ));
        }
        Ok(Value::map(
            args.chunks(2).map(|kv| (kv[0].clone(), kv[1].clone())),
        ))
    }));
    registry.register(NativeFn::new("hash-set", None, |args| {
        Ok(Value::set(args.iter().cloned()))
    }));
    registry.register(NativeFn::new("set", Some(1), |args| {
        Ok(Value::set(args[0].seq_items()?))
    }));
    registry.register(NativeFn::new("range", None, |args| {
        let (start, end, step) = match args {
            [end] => (0, end.as_int()?, 1),
            [start, end] => (start.as_int()?, end.as_int()?, 1),
            [start, end, step] => (start.as_int()?, end.as_int()?, step.as_int()?),
            _ => return Err(arity("range", args.len())),
        };
        if step == 0 {
            return Err(Error::illegal_argument("range step must not be zero"));
        }
        let mut items = ImVector::new();
        let mut i = start;
        while (step > 0 && i < end) || (step < 0 && i > end) {
            items.push_back(Value::Int(i));
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(Value::list(items))
    }));
}

fn register_access(registry: &mut ToolRegistry) {
    registry.register(NativeFn::new("seq", Some(1), |args| seq(&args[0])));
    registry.register(NativeFn::new("count", Some(1), |args| {
        Ok(Value::Int(args[0].count()? as i64))
    }));
    registry.register(NativeFn::new("empty?", Some(1), |args| {
        Ok(Value::Bool(args[0].count()? == 0))
    }));
    registry.register(NativeFn::new("first", Some(1), |args| {
        Ok(args[0].seq_items()?.into_iter().next().unwrap_or(Value::Nil))
    }));
    registry.register(NativeFn::new("second", Some(1), |args| {
        Ok(args[0].seq_items()?.into_iter().nth(1).unwrap_or(Value::Nil))
    }));
    registry.register(NativeFn::new("last", Some(1), |args| {
        Ok(args[0].seq_items()?.pop().unwrap_or(Value::Nil))
    }));
    registry.register(NativeFn::new("rest", Some(1), |args| {
        Ok(Value::list(args[0].seq_items()?.into_iter().skip(1)))
    }));
    registry.register(NativeFn::new("next", Some(1), |args| {
        let rest: Vec<Value> = args[0].seq_items()?.into_iter().skip(1).collect();
        Ok(if rest.is_empty() {
            Value::Nil
        } else {
            Value::list(rest)
        })
    }));
    registry.register(NativeFn::new("nth", None, |args| {
        let (coll, index, default) = match args {
            [coll, index] => (coll, index.as_int()?, None),
            [coll, index, default] => (coll, index.as_int()?, Some(default.clone())),
            _ => return Err(arity("nth", args.len())),
        };
        let items = coll.seq_items()?;
        match usize::try_from(index).ok().and_then(|i| items.get(i)) {
            Some(item) => Ok(item.clone()),
            None => default.ok_or(Error::IndexOutOfBounds {
                index,
                length: items.len(),
            }),
        }
    }));
    registry.register(NativeFn::new("get", None, |args| match args {
        [coll, key] => Ok(function::lookup(coll, key).unwrap_or(Value::Nil)),
        [coll, key, default] => Ok(function::lookup(coll, key).unwrap_or_else(|| default.clone())),
        _ => Err(arity("get", args.len())),
    }));
    registry.register(NativeFn::new("contains?", Some(2), |args| {
        Ok(Value::Bool(match &args[0] {
            Value::Map(m) => m.entries.contains_key(&args[1]),
            Value::Set(s) => s.items.contains(&args[1]),
            Value::Vector(v) => matches!(&args[1], Value::Int(i) if *i >= 0 && (*i as usize) < v.items.len()),
            Value::Nil => false,
            other => return Err(Error::type_error("associative collection", other)),
        }))
    }));
    registry.register(NativeFn::new("keys", Some(1), |args| match &args[0] {
        Value::Map(m) if !m.entries.is_empty() => Ok(Value::list(m.entries.keys().cloned())),
        Value::Map(_) | Value::Nil => Ok(Value::Nil),
        other => Err(Error::type_error("map", other)),
    }));
    registry.register(NativeFn::new("vals", Some(1), |args| match &args[0] {
        Value::Map(m) if !m.entries.is_empty() => Ok(Value::list(m.entries.values().cloned())),
        Value::Map(_) | Value::Nil => Ok(Value::Nil),
        other => Err(Error::type_error("map", other)),
    }));
}

fn conj_one(coll: Value, x: Value) -> Result<Value> {
    Ok(match coll {
        Value::Nil => Value::list([x]),
        Value::List(l) => {
            let mut items = l.items.clone();
            items.push_front(x);
            Value::list(items).with_meta(l.meta.clone())?
        }
        Value::Vector(v) => {
            let mut items = v.items.clone();
            items.push_back(x);
            Value::vector(items).with_meta(v.meta.clone())?
        }
        Value::Set(s) => {
            let mut items = s.items.clone();
            items.insert(x);
            Value::set(items).with_meta(s.meta.clone())?
        }
        Value::Map(m) => {
            let mut entries = m.entries.clone();
            match &x {
                Value::Vector(pair) if pair.items.len() == 2 => {
                    entries.insert(pair.items[0].clone(), pair.items[1].clone());
                }
                Value::Map(other) => entries.extend(other.entries.clone()),
                other => return Err(Error::type_error("map entry", other)),
            }
            Value::map(entries).with_meta(m.meta.clone())?
        }
        other => return Err(Error::type_error("collection", &other)),
    })
}

fn register_update(registry: &mut ToolRegistry) {
    registry.register(NativeFn::new("cons", Some(2), |args| {
        let mut items: ImVector<Value> = args[1].seq_items()?.into_iter().collect();
        items.push_front(args[0].clone());
        Ok(Value::list(items))
    }));
    registry.register(NativeFn::new("conj", None, |args| match args {
        [] => Ok(Value::vector(Vec::new())),
        [coll, xs @ ..] => xs
            .iter()
            .try_fold(coll.clone(), |acc, x| conj_one(acc, x.clone())),
    }));
    registry.register(NativeFn::new("concat", None, |args| {
        let mut items = ImVector::new();
        for coll in args {
            items.extend(coll.seq_items()?);
        }
        Ok(Value::list(items))
    }));
    registry.register(NativeFn::new("into", Some(2), |args| {
        args[1]
            .seq_items()?
            .into_iter()
            .try_fold(args[0].clone(), conj_one)
    }));
    registry.register(NativeFn::new("reverse", Some(1), |args| {
        let mut items = args[0].seq_items()?;
        items.reverse();
        Ok(Value::list(items))
    }));
    registry.register(NativeFn::new("take", Some(2), |args| {
        let n = usize::try_from(args[0].as_int()?).unwrap_or(0);
        Ok(Value::list(args[1].seq_items()?.into_iter().take(n)))
    }));
    registry.register(NativeFn::new("drop", Some(2), |args| {
        let n = usize::try_from(args[0].as_int()?).unwrap_or(0);
        Ok(Value::list(args[1].seq_items()?.into_iter().skip(n)))
    }));
    registry.register(NativeFn::new("assoc", None, |args| {
        let (coll, kvs) = match args {
            [coll, kvs @ ..] if !kvs.is_empty() && kvs.len() % 2 == 0 => (coll, kvs),
            _ => return Err(arity("assoc", args.len())),
        };
        kvs.chunks(2).try_fold(coll.clone(), |acc, kv| assoc(acc, &kv[0], &kv[1]))
    }));
    registry.register(NativeFn::new("dissoc", None, |args| match args {
        [Value::Nil, ..] => Ok(Value::Nil),
        [Value::Map(m), keys @ ..] => {
            let mut entries = m.entries.clone();
            for key in keys {
                entries.remove(key);
            }
            Value::map(entries).with_meta(m.meta.clone())
        }
        [other, ..] => Err(Error::type_error("map", other)),
        [] => Err(arity("dissoc", 0)),
    }));
}

fn assoc(coll: Value, key: &Value, val: &Value) -> Result<Value> {
    match coll {
        Value::Nil => Ok(Value::map([(key.clone(), val.clone())])),
        Value::Map(m) => {
            let mut entries: OrdMap<Value, Value> = m.entries.clone();
            entries.insert(key.clone(), val.clone());
            Value::map(entries).with_meta(m.meta.clone())
        }
        Value::Vector(v) => {
            let index = key.as_int()?;
            let mut items = v.items.clone();
            match usize::try_from(index) {
                Ok(i) if i < items.len() => {
                    items.set(i, val.clone());
                }
                Ok(i) if i == items.len() => items.push_back(val.clone()),
                _ => {
                    return Err(Error::IndexOutOfBounds {
                        index,
                        length: items.len(),
                    })
                }
            }
            Value::vector(items).with_meta(v.meta.clone())
        }
        other => Err(Error::type_error("associative collection", &other)),
    }
}

/// `(apply f args... coll)`
pub struct ApplyTool;

impl Tool for ApplyTool {
    fn name(&self) -> &str {
        "apply"
    }

    fn description(&self) -> &str {
        "Calls f with the leading args followed by the items of the last argument"
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        let (f, rest) = match args {
            [f, rest @ ..] if !rest.is_empty() => (f, rest),
            _ => return Err(arity("apply", args.len())),
        };
        let (spread, leading) = rest
            .split_last()
            .ok_or_else(|| arity("apply", args.len()))?;
        let mut call_args = leading.to_vec();
        call_args.extend(spread.seq_items()?);
        apply(f, call_args)
    }
}

fn register_higher_order(registry: &mut ToolRegistry) {
    registry.register(ApplyTool);
    registry.register(NativeFn::new("map", None, |args| {
        let (f, colls) = match args {
            [f, colls @ ..] if !colls.is_empty() => (f, colls),
            _ => return Err(arity("map", args.len())),
        };
        let columns = colls
            .iter()
            .map(Value::seq_items)
            .collect::<Result<Vec<_>>>()?;
        let len = columns.iter().map(Vec::len).min().unwrap_or(0);
        let mut out = ImVector::new();
        for i in 0..len {
            let call_args = columns.iter().map(|col| col[i].clone()).collect();
            out.push_back(apply(f, call_args)?);
        }
        Ok(Value::list(out))
    }));
    registry.register(NativeFn::new("mapv", Some(2), |args| {
        let out = args[1]
            .seq_items()?
            .into_iter()
            .map(|x| apply(&args[0], vec![x]))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::vector(out))
    }));
    registry.register(NativeFn::new("filter", Some(2), |args| {
        filter(&args[0], &args[1], true)
    }));
    registry.register(NativeFn::new("remove", Some(2), |args| {
        filter(&args[0], &args[1], false)
    }));
    registry.register(NativeFn::new("every?", Some(2), |args| {
        for x in args[1].seq_items()? {
            if !apply(&args[0], vec![x])?.is_truthy() {
                return Ok(Value::Bool(false));
            }
        }
        Ok(Value::Bool(true))
    }));
    registry.register(NativeFn::new("some", Some(2), |args| {
        for x in args[1].seq_items()? {
            let result = apply(&args[0], vec![x])?;
            if result.is_truthy() {
                return Ok(result);
            }
        }
        Ok(Value::Nil)
    }));
    registry.register(NativeFn::new("reduce", None, |args| {
        let (f, init, mut items) = match args {
            [f, coll] => {
                let mut items = coll.seq_items()?.into_iter();
                match items.next() {
                    Some(first) => (f, first, items),
                    None => return apply(f, Vec::new()),
                }
            }
            [f, init, coll] => (f, init.clone(), coll.seq_items()?.into_iter()),
            _ => return Err(arity("reduce", args.len())),
        };
        items.try_fold(init, |acc, x| apply(f, vec![acc, x]))
    }));
}

fn filter(pred: &Value, coll: &Value, keep: bool) -> Result<Value> {
    let mut out = ImVector::new();
    for x in coll.seq_items()? {
        if apply(pred, vec![x.clone()])?.is_truthy() == keep {
            out.push_back(x);
        }
    }
    Ok(Value::list(out))
}
