//! Tests for host interop: static members, methods, fields and `new`

use jolt::runtime::HostType;
use jolt::{Error, Interpreter, Value};

fn eval_clj(source: &str) -> jolt::Result<Value> {
    Interpreter::new().eval_str(source)
}

fn interp_with_point() -> Interpreter {
    let interp = Interpreter::new();
    interp.register_type(
        HostType::builder("Point")
            .field("x", Value::Int(0))
            .field("y", Value::Int(0))
            .method("sum", |this, _| match this {
                Value::Object(o) => {
                    let x = o.get_field("x").unwrap_or(Value::Nil).as_int()?;
                    let y = o.get_field("y").unwrap_or(Value::Nil).as_int()?;
                    Ok(Value::Int(x + y))
                }
                other => Err(Error::type_error("Point", other)),
            })
            .build(),
    );
    interp
}

// ====================
// Static Members
// ====================

#[test]
fn test_static_field() {
    assert_eq!(
        eval_clj("Math/PI").unwrap(),
        Value::Float(std::f64::consts::PI)
    );
    assert_eq!(eval_clj("Long/MAX_VALUE").unwrap(), Value::Int(i64::MAX));
}

#[test]
fn test_static_method_call() {
    assert_eq!(eval_clj("(Math/abs -3)").unwrap(), Value::Int(3));
    assert_eq!(eval_clj("(Math/abs -2.5)").unwrap(), Value::Float(2.5));
}

#[test]
fn test_unknown_static_member() {
    let err = eval_clj("Math/TAU").unwrap_err();
    assert!(matches!(err.root(), Error::UnresolvedSymbol { .. }));
}

#[test]
fn test_class_symbol_evaluates_to_class() {
    let result = eval_clj("String").unwrap();
    assert!(matches!(result, Value::Class(_)));
    assert_eq!(result.to_string(), "String");
}

// ====================
// Instance Methods
// ====================

#[test]
fn test_method_sugar() {
    assert_eq!(
        eval_clj("(.toUpperCase \"shout\")").unwrap(),
        Value::string("SHOUT")
    );
    assert_eq!(eval_clj("(.length \"four\")").unwrap(), Value::Int(4));
}

#[test]
fn test_dot_form_with_args() {
    assert_eq!(
        eval_clj("(. \"hello\" substring 1 3)").unwrap(),
        Value::string("el")
    );
    assert_eq!(
        eval_clj("(. \"hello\" (substring 2))").unwrap(),
        Value::string("llo")
    );
}

#[test]
fn test_missing_method() {
    let err = eval_clj("(.frobnicate \"x\")").unwrap_err();
    assert!(matches!(err.root(), Error::IllegalArgument(_)));
    assert!(err.root().to_string().contains("no matching method frobnicate"));
}

#[test]
fn test_malformed_member_expression() {
    let err = eval_clj("(.length)").unwrap_err();
    assert!(matches!(err, Error::Analysis { .. }));
}

// ====================
// Objects
// ====================

#[test]
fn test_new_and_fields() {
    let interp = interp_with_point();
    let source = r#"
(let [p (new Point)]
  (set! (. p -x) 3)
  (set! (. p -y) 4)
  [(. p -x) (.-y p) (.sum p)])
"#;
    assert_eq!(
        interp.eval_str(source).unwrap(),
        Value::vector([Value::Int(3), Value::Int(4), Value::Int(7)])
    );
}

#[test]
fn test_constructor_sugar() {
    let interp = interp_with_point();
    let result = interp.eval_str("(Point.)").unwrap();
    assert!(matches!(result, Value::Object(_)));
    assert_eq!(
        interp.eval_str("(instance? Point (Point.))").unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_field_access_by_plain_member() {
    let interp = interp_with_point();
    assert_eq!(interp.eval_str("(. (Point.) x)").unwrap(), Value::Int(0));
}

#[test]
fn test_unknown_field() {
    let interp = interp_with_point();
    let err = interp.eval_str("(. (Point.) -z)").unwrap_err();
    assert!(err.root().to_string().contains("no such field: z"));
}

#[test]
fn test_new_with_args_unsupported() {
    let interp = interp_with_point();
    let err = interp.eval_str("(new Point 1 2)").unwrap_err();
    assert!(matches!(err.root(), Error::Unsupported(_)));
}

#[test]
fn test_new_exception_is_throwable() {
    let source = r#"
(try
  (throw (new IllegalStateException))
  (catch RuntimeException e :caught))
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::keyword("caught"));
}

#[test]
fn test_new_of_non_class() {
    let err = eval_clj("(let [c 1] (new c))").unwrap_err();
    assert!(matches!(err.root(), Error::UnresolvedSymbol { .. }));
}

// ====================
// Types
// ====================

#[test]
fn test_instance_checks() {
    let source = r#"
[(instance? Long 1)
 (instance? Number 1)
 (instance? String "s")
 (instance? RuntimeException (ex-info "x" {}))
 (instance? Object nil)]
"#;
    // Number is not a registered type
    assert!(eval_clj(source).is_err());

    let source = r#"
[(instance? Long 1)
 (instance? String "s")
 (instance? RuntimeException (ex-info "x" {}))
 (instance? Object :k)
 (instance? Object nil)]
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([
            Value::Bool(true),
            Value::Bool(true),
            Value::Bool(true),
            Value::Bool(true),
            Value::Bool(false)
        ])
    );
}

#[test]
fn test_class_of_values() {
    assert_eq!(eval_clj("(str (class 1))").unwrap(), Value::string("Long"));
    assert_eq!(eval_clj("(class nil)").unwrap(), Value::Nil);
}
