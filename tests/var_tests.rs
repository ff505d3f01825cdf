//! Tests for Vars: roots, dynamic bindings and namespaces

use std::thread;

use jolt::{Error, Interpreter, Value};

fn eval_clj(source: &str) -> jolt::Result<Value> {
    Interpreter::new().eval_str(source)
}

// ====================
// Dynamic Binding
// ====================

#[test]
fn test_binding_shadows_root() {
    let source = r#"
(def ^:dynamic *level* :root)
(defn current [] *level*)
[(current) (binding [*level* :bound] (current)) (current)]
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([
            Value::keyword("root"),
            Value::keyword("bound"),
            Value::keyword("root")
        ])
    );
}

#[test]
fn test_nested_binding_frames() {
    let source = r#"
(def ^:dynamic *x* 0)
(binding [*x* 1]
  [*x* (binding [*x* 2] *x*) *x*])
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([Value::Int(1), Value::Int(2), Value::Int(1)])
    );
}

#[test]
fn test_set_in_inner_frame_updates_enclosing_binding() {
    let source = r#"
(def ^:dynamic *x* 0)
[(binding [*x* 1]
   (binding [] (set! *x* 5))
   *x*)
 (binding [*x* 1]
   (binding [*x* 2] (set! *x* 9))
   *x*)
 *x*]
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([Value::Int(5), Value::Int(1), Value::Int(0)])
    );
}

#[test]
fn test_binding_restored_after_throw() {
    let interp = Interpreter::new();
    interp.eval_str("(def ^:dynamic *mode* :normal)").unwrap();
    let result = interp.eval_str(
        r#"
(try
  (binding [*mode* :special]
    (throw (ex-info "fail" {})))
  (catch ExceptionInfo e *mode*))
"#,
    );
    assert_eq!(result.unwrap(), Value::keyword("normal"));
    assert!(interp.eval_str("(binding [*mode* :x] (throw :y))").is_err());
    assert_eq!(interp.eval_str("*mode*").unwrap(), Value::keyword("normal"));
}

#[test]
fn test_binding_non_dynamic_var_fails() {
    let source = r#"
(def plain 1)
(binding [plain 2] plain)
"#;
    let err = eval_clj(source).unwrap_err();
    assert!(matches!(err.root(), Error::IllegalState(_)));
    assert!(err.to_string().contains("non-dynamic"));
}

#[test]
fn test_binding_multiple_vars_in_parallel() {
    let source = r#"
(def ^:dynamic *a* 1)
(def ^:dynamic *b* 2)
(binding [*a* 10 *b* *a*] [*a* *b*])
"#;
    // Init expressions see the outer values
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([Value::Int(10), Value::Int(1)])
    );
}

#[test]
fn test_thread_bound_predicate() {
    let source = r#"
(def ^:dynamic *d* 0)
[(thread-bound? #'*d*) (binding [*d* 1] (thread-bound? #'*d*))]
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([Value::Bool(false), Value::Bool(true)])
    );
}

#[test]
fn test_bindings_are_thread_local() {
    let interp = Interpreter::new();
    interp.eval_str("(def ^:dynamic *who* :main)").unwrap();
    let var = match interp.eval_str("#'*who*").unwrap() {
        Value::Var(var) => var,
        other => panic!("expected var, got {}", other),
    };
    let seen = interp
        .eval_str("(binding [*who* :bound] *who*)")
        .unwrap();
    assert_eq!(seen, Value::keyword("bound"));

    interp.eval_str("(push-thread-bindings {#'*who* :held})").unwrap();
    let other = thread::spawn(move || var.get().unwrap()).join().unwrap();
    assert_eq!(other, Value::keyword("main"));
    assert_eq!(interp.eval_str("*who*").unwrap(), Value::keyword("held"));
    interp.eval_str("(pop-thread-bindings)").unwrap();
    assert_eq!(interp.eval_str("*who*").unwrap(), Value::keyword("main"));
}

// ====================
// Roots
// ====================

#[test]
fn test_alter_var_root() {
    let source = r#"
(def counter 10)
(alter-var-root #'counter + 5)
counter
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::Int(15));
}

#[test]
fn test_alter_var_root_ignores_thread_binding() {
    let source = r#"
(def ^:dynamic *n* 1)
(binding [*n* 100]
  (alter-var-root #'*n* inc))
*n*
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::Int(2));
}

#[test]
fn test_redef_replaces_root() {
    let source = r#"
(def v 1)
(def v 2)
v
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::Int(2));
}

#[test]
fn test_def_dynamic_meta() {
    let source = r#"
(def ^:dynamic *flag* true)
(:dynamic (meta #'*flag*))
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::Bool(true));
}

#[test]
fn test_bound_predicate() {
    let source = r#"
(def a 1)
(def b)
[(bound? #'a) (bound? #'b)]
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([Value::Bool(true), Value::Bool(false)])
    );
}

// ====================
// Namespaces
// ====================

#[test]
fn test_core_fns_visible_from_user() {
    assert_eq!(eval_clj("(clojure.core/inc 1)").unwrap(), Value::Int(2));
}

#[test]
fn test_unresolved_symbol() {
    let err = eval_clj("undefined-thing").unwrap_err();
    assert!(matches!(err.root(), Error::UnresolvedSymbol { .. }));
}

#[test]
fn test_qualified_reference_across_namespaces() {
    let interp = Interpreter::new();
    interp.in_ns("geometry");
    interp.eval_str("(defn area [r] (* r r 3))").unwrap();
    interp.in_ns("user");
    assert_eq!(interp.eval_str("(geometry/area 2)").unwrap(), Value::Int(12));
    assert!(interp.eval_str("(area 2)").is_err());
}

#[test]
fn test_user_def_shadows_core_name() {
    let source = r#"
(def inc (fn [x] (+ x 100)))
(inc 1)
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::Int(101));
}

#[test]
fn test_var_deref_and_call() {
    let source = r#"
(def f (fn [] :called))
[(deref #'f) (#'f)]
"#;
    let result = eval_clj(source).unwrap();
    match result {
        Value::Vector(v) => {
            assert!(v.items[0].is_fn());
            assert_eq!(v.items[1], Value::keyword("called"));
        }
        other => panic!("expected vector, got {}", other),
    }
}
