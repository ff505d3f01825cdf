//! Arithmetic and comparison
//!
//! Integer arithmetic is checked: overflow raises an `ArithmeticException` instead of wrapping.
//! Mixing an integer with a float promotes to float.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::runtime::Value;
use crate::tools::{NativeFn, Tool, ToolRegistry};

/// Register math tools
pub fn register(registry: &mut ToolRegistry) {
    registry.register(AddTool);
    registry.register(MultiplyTool);
    registry.register(SubtractTool);
    registry.register(DivideTool);

    registry.register(NativeFn::new("inc", Some(1), |args| {
        add(&args[0], &Value::Int(1))
    }));
    registry.register(NativeFn::new("dec", Some(1), |args| {
        sub(&args[0], &Value::Int(1))
    }));
    registry.register(NativeFn::new("quot", Some(2), |args| {
        integer_division("quot", &args[0], &args[1], i64::checked_div)
    }));
    registry.register(NativeFn::new("rem", Some(2), |args| {
        integer_division("rem", &args[0], &args[1], i64::checked_rem)
    }));
    registry.register(NativeFn::new("mod", Some(2), |args| {
        integer_division("mod", &args[0], &args[1], |a, b| {
            a.checked_rem(b).map(|r| if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        })
    }));
    registry.register(NativeFn::new("abs", Some(1), |args| match &args[0] {
        Value::Int(n) => n.checked_abs().map(Value::Int).ok_or_else(overflow),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(Error::type_error("number", other)),
    }));
    registry.register(NativeFn::new("max", None, |args| extremum("max", args, Ordering::Greater)));
    registry.register(NativeFn::new("min", None, |args| extremum("min", args, Ordering::Less)));

    registry.register(NativeFn::new("<", None, |args| {
        compare_chain("<", args, |o| o == Ordering::Less)
    }));
    registry.register(NativeFn::new(">", None, |args| {
        compare_chain(">", args, |o| o == Ordering::Greater)
    }));
    registry.register(NativeFn::new("<=", None, |args| {
        compare_chain("<=", args, |o| o != Ordering::Greater)
    }));
    registry.register(NativeFn::new(">=", None, |args| {
        compare_chain(">=", args, |o| o != Ordering::Less)
    }));
    registry.register(NativeFn::new("==", None, |args| {
        compare_chain("==", args, |o| o == Ordering::Equal)
    }));

    registry.register(NativeFn::new("zero?", Some(1), |args| {
        sign_test(&args[0], |o| o == Ordering::Equal)
    }));
    registry.register(NativeFn::new("pos?", Some(1), |args| {
        sign_test(&args[0], |o| o == Ordering::Greater)
    }));
    registry.register(NativeFn::new("neg?", Some(1), |args| {
        sign_test(&args[0], |o| o == Ordering::Less)
    }));
    registry.register(NativeFn::new("even?", Some(1), |args| {
        Ok(Value::Bool(integer(&args[0])? % 2 == 0))
    }));
    registry.register(NativeFn::new("odd?", Some(1), |args| {
        Ok(Value::Bool(integer(&args[0])? % 2 != 0))
    }));
}

/// `(+ & nums)`
pub struct AddTool;

impl Tool for AddTool {
    fn name(&self) -> &str {
        "+"
    }

    fn description(&self) -> &str {
        "Sum of nums; (+) returns 0"
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        args.iter().try_fold(Value::Int(0), |acc, x| add(&acc, x))
    }
}

/// `(* & nums)`
pub struct MultiplyTool;

impl Tool for MultiplyTool {
    fn name(&self) -> &str {
        "*"
    }

    fn description(&self) -> &str {
        "Product of nums; (*) returns 1"
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        args.iter().try_fold(Value::Int(1), |acc, x| mul(&acc, x))
    }
}

/// `(- x & ys)`
pub struct SubtractTool;

impl Tool for SubtractTool {
    fn name(&self) -> &str {
        "-"
    }

    fn description(&self) -> &str {
        "Negation of x, or x minus each y"
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        match args {
            [] => Err(arity("-", 0)),
            [x] => sub(&Value::Int(0), x),
            [x, ys @ ..] => ys.iter().try_fold(x.clone(), |acc, y| sub(&acc, y)),
        }
    }
}

/// `(/ x & ys)`
pub struct DivideTool;

impl Tool for DivideTool {
    fn name(&self) -> &str {
        "/"
    }

    fn description(&self) -> &str {
        "Reciprocal of x, or x divided by each y"
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        match args {
            [] => Err(arity("/", 0)),
            [x] => div(&Value::Int(1), x),
            [x, ys @ ..] => ys.iter().try_fold(x.clone(), |acc, y| div(&acc, y)),
        }
    }
}

fn overflow() -> Error {
    Error::Arithmetic("integer overflow".to_string())
}

fn arity(name: &str, argc: usize) -> Error {
    Error::illegal_argument(format!(
        "wrong number of arguments ({}) passed to {}",
        argc, name
    ))
}

fn integer(v: &Value) -> Result<i64> {
    match v {
        Value::Int(n) => Ok(*n),
        other => Err(Error::type_error("integer", other)),
    }
}

fn float(v: &Value) -> Result<f64> {
    match v {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        other => Err(Error::type_error("number", other)),
    }
}

fn arith(
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => int_op(*x, *y).map(Value::Int).ok_or_else(overflow),
        _ => Ok(Value::Float(float_op(float(a)?, float(b)?))),
    }
}

fn add(a: &Value, b: &Value) -> Result<Value> {
    arith(a, b, i64::checked_add, |x, y| x + y)
}

fn sub(a: &Value, b: &Value) -> Result<Value> {
    arith(a, b, i64::checked_sub, |x, y| x - y)
}

fn mul(a: &Value, b: &Value) -> Result<Value> {
    arith(a, b, i64::checked_mul, |x, y| x * y)
}

/// Integer division stays integral when exact; otherwise the result is a float
fn div(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(Error::DivisionByZero),
        (Value::Int(x), Value::Int(y)) => match x.checked_rem(*y) {
            Some(0) => x.checked_div(*y).map(Value::Int).ok_or_else(overflow),
            Some(_) => Ok(Value::Float(*x as f64 / *y as f64)),
            None => Err(overflow()),
        },
        _ => Ok(Value::Float(float(a)? / float(b)?)),
    }
}

fn integer_division(
    name: &str,
    a: &Value,
    b: &Value,
    op: impl Fn(i64, i64) -> Option<i64>,
) -> Result<Value> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(Error::DivisionByZero),
        (Value::Int(x), Value::Int(y)) => op(*x, *y).map(Value::Int).ok_or_else(overflow),
        _ => {
            let (x, y) = (float(a)?, float(b)?);
            if y == 0.0 {
                return Err(Error::DivisionByZero);
            }
            Ok(Value::Float(match name {
                "quot" => (x / y).trunc(),
                "rem" => x % y,
                _ => x - y * (x / y).floor(),
            }))
        }
    }
}

fn compare_numbers(a: &Value, b: &Value) -> Result<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        _ => {
            let (x, y) = (float(a)?, float(b)?);
            x.partial_cmp(&y)
                .ok_or_else(|| Error::Arithmetic("NaN is not comparable".to_string()))
        }
    }
}

fn compare_chain(name: &str, args: &[Value], accept: fn(Ordering) -> bool) -> Result<Value> {
    if args.is_empty() {
        return Err(arity(name, 0));
    }
    for pair in args.windows(2) {
        if !accept(compare_numbers(&pair[0], &pair[1])?) {
            return Ok(Value::Bool(false));
        }
    }
    // A single argument must still be a number
    float(&args[0])?;
    Ok(Value::Bool(true))
}

fn extremum(name: &str, args: &[Value], keep: Ordering) -> Result<Value> {
    let (first, rest) = args.split_first().ok_or_else(|| arity(name, 0))?;
    float(first)?;
    rest.iter().try_fold(first.clone(), |best, x| {
        Ok(if compare_numbers(x, &best)? == keep {
            x.clone()
        } else {
            best
        })
    })
}

fn sign_test(v: &Value, accept: fn(Ordering) -> bool) -> Result<Value> {
    Ok(Value::Bool(accept(compare_numbers(v, &Value::Int(0))?)))
}
