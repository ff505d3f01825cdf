//! Tests for throw and try/catch/finally

use jolt::{Error, Interpreter, Value};

fn eval_clj(source: &str) -> jolt::Result<Value> {
    Interpreter::new().eval_str(source)
}

// ====================
// Basic Catching
// ====================

#[test]
fn test_try_without_error_returns_body() {
    assert_eq!(
        eval_clj("(try (+ 1 2) (catch Exception e :caught))").unwrap(),
        Value::Int(3)
    );
}

#[test]
fn test_catch_ex_info() {
    let source = r#"
(try
  (throw (ex-info "bad input" {:field :age}))
  (catch ExceptionInfo e
    [(ex-message e) (:field (ex-data e))]))
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([Value::string("bad input"), Value::keyword("age")])
    );
}

#[test]
fn test_throw_any_value() {
    assert_eq!(
        eval_clj("(try (throw 42) (catch Long n (inc n)))").unwrap(),
        Value::Int(43)
    );
}

#[test]
fn test_uncaught_throw_surfaces() {
    let err = eval_clj("(throw :oops)").unwrap_err();
    match err.root() {
        Error::Thrown(value) => assert_eq!(**value, Value::keyword("oops")),
        other => panic!("expected thrown value, got {:?}", other),
    }
}

// ====================
// Typed Dispatch
// ====================

#[test]
fn test_first_matching_clause_wins() {
    let source = r#"
(try
  (throw (ex-info "x" {}))
  (catch Long n :long)
  (catch RuntimeException e :runtime)
  (catch ExceptionInfo e :info))
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::keyword("runtime"));
}

#[test]
fn test_non_matching_clauses_propagate() {
    let source = r#"
(try
  (throw (ex-info "x" {}))
  (catch Long n :long))
"#;
    let err = eval_clj(source).unwrap_err();
    assert!(matches!(err.root(), Error::Thrown(_)));
}

#[test]
fn test_long_versus_ex_info() {
    let source = r#"
(defn classify [v]
  (try
    (throw v)
    (catch Long n :long)
    (catch ExceptionInfo e :info)
    (catch :default x :other)))
[(classify 1) (classify (ex-info "m" {})) (classify "s")]
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([
            Value::keyword("long"),
            Value::keyword("info"),
            Value::keyword("other")
        ])
    );
}

#[test]
fn test_object_catches_everything() {
    assert_eq!(
        eval_clj("(try (throw \"s\") (catch Object o o))").unwrap(),
        Value::string("s")
    );
}

#[test]
fn test_internal_errors_are_typed() {
    let source = r#"
[(try (/ 1 0) (catch ArithmeticException e (ex-message e)))
 (try (nth [1] 5) (catch IndexOutOfBoundsException e :oob))
 (try ((fn [x] x)) (catch IllegalArgumentException e :arity))
 (try (+ 1 "a") (catch ClassCastException e :cast))]
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([
            Value::string("Divide by zero"),
            Value::keyword("oob"),
            Value::keyword("arity"),
            Value::keyword("cast")
        ])
    );
}

#[test]
fn test_internal_errors_caught_as_exception() {
    assert_eq!(
        eval_clj("(try (/ 1 0) (catch Exception e :caught))").unwrap(),
        Value::keyword("caught")
    );
}

#[test]
fn test_unknown_catch_class_rejected() {
    let err = eval_clj("(try (throw 1) (catch NoSuchThing e 2))").unwrap_err();
    assert!(matches!(err.root(), Error::UnresolvedSymbol { .. }));
}

#[test]
fn test_analysis_errors_are_not_catchable() {
    let err = eval_clj("(try (if) (catch :default e :caught))").unwrap_err();
    assert!(matches!(err, Error::Analysis { .. }));
}

#[test]
fn test_catch_binding_is_local() {
    let source = r#"
(def e :global)
(try (throw 1) (catch Long e (inc e)))
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::Int(2));
}

// ====================
// finally
// ====================

#[test]
fn test_finally_runs_once_on_success() {
    let source = r#"
(def ^:dynamic *log* [])
(binding [*log* []]
  (try
    (set! *log* (conj *log* :body))
    (finally (set! *log* (conj *log* :finally))))
  *log*)
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([Value::keyword("body"), Value::keyword("finally")])
    );
}

#[test]
fn test_finally_runs_once_when_caught() {
    let source = r#"
(def ^:dynamic *log* [])
(binding [*log* []]
  (try
    (throw (ex-info "x" {}))
    (catch ExceptionInfo e (set! *log* (conj *log* :catch)))
    (finally (set! *log* (conj *log* :finally))))
  *log*)
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([Value::keyword("catch"), Value::keyword("finally")])
    );
}

#[test]
fn test_finally_runs_when_uncaught() {
    // Root updates survive the unwinding; thread bindings do not
    let interp = Interpreter::new();
    interp.eval_str("(def runs 0)").unwrap();
    let err = interp
        .eval_str("(try (throw :x) (finally (alter-var-root #'runs inc)))")
        .unwrap_err();
    assert!(matches!(err.root(), Error::Thrown(_)));
    assert_eq!(interp.eval_str("runs").unwrap(), Value::Int(1));
}

#[test]
fn test_finally_value_is_discarded() {
    assert_eq!(
        eval_clj("(try :body (finally :ignored))").unwrap(),
        Value::keyword("body")
    );
}

#[test]
fn test_finally_error_keeps_original() {
    let err = eval_clj("(try (throw :first) (finally (throw :second)))").unwrap_err();
    match err.root() {
        Error::Thrown(value) => assert_eq!(**value, Value::keyword("first")),
        other => panic!("expected thrown value, got {:?}", other),
    }
}

#[test]
fn test_catch_rethrow_runs_finally() {
    let interp = Interpreter::new();
    interp.eval_str("(def runs 0)").unwrap();
    let err = interp
        .eval_str(
            r#"
(try
  (throw (ex-info "inner" {}))
  (catch ExceptionInfo e (throw (ex-info "outer" {} e)))
  (finally (alter-var-root #'runs inc)))
"#,
        )
        .unwrap_err();
    assert!(matches!(err.root(), Error::Thrown(_)));
    assert_eq!(interp.eval_str("runs").unwrap(), Value::Int(1));
}

// ====================
// Nesting
// ====================

#[test]
fn test_nested_try_inner_handles() {
    let source = r#"
(try
  (try (throw 1) (catch Long n :inner))
  (catch Long n :outer))
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::keyword("inner"));
}

#[test]
fn test_nested_try_outer_handles() {
    let source = r#"
(try
  (try (throw "s") (catch Long n :inner))
  (catch String s :outer))
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::keyword("outer"));
}

#[test]
fn test_throw_from_called_fn() {
    let source = r#"
(defn risky [x]
  (if (neg? x) (throw (ex-info "negative" {:x x})) x))
(defn safe [x]
  (try (risky x) (catch ExceptionInfo e (:x (ex-data e)))))
[(safe 5) (safe -3)]
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([Value::Int(5), Value::Int(-3)])
    );
}

#[test]
fn test_ex_cause_chain() {
    let source = r#"
(let [inner (ex-info "inner" {})
      outer (ex-info "outer" {} inner)]
  (ex-message (ex-cause outer)))
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::string("inner"));
}

#[test]
fn test_catch_after_finally_rejected() {
    assert!(eval_clj("(try 1 (finally 2) (catch Exception e 3))").is_err());
}

#[test]
fn test_catch_outside_try_rejected() {
    assert!(eval_clj("(catch Exception e 1)").is_err());
}
