//! Tests for fn*: arities, variadic params, closures and letfn*

use jolt::{Error, Interpreter, Value};

fn eval_clj(source: &str) -> jolt::Result<Value> {
    Interpreter::new().eval_str(source)
}

fn ints(values: &[i64]) -> Value {
    Value::vector(values.iter().map(|n| Value::Int(*n)))
}

// ====================
// Basic Invocation
// ====================

#[test]
fn test_anonymous_fn() {
    assert_eq!(eval_clj("((fn [x y] (+ x y)) 3 4)").unwrap(), Value::Int(7));
}

#[test]
fn test_defn_and_call() {
    let source = r#"
(defn square [x] (* x x))
(square 9)
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::Int(81));
}

#[test]
fn test_defn_docstring() {
    let source = r#"
(defn greet "Says hello" [name] (str "Hello, " name))
[(greet "Ada") (:doc (meta #'greet))]
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([Value::string("Hello, Ada"), Value::string("Says hello")])
    );
}

#[test]
fn test_fn_value_type() {
    assert_eq!(eval_clj("(fn? (fn [] 1))").unwrap(), Value::Bool(true));
    assert_eq!(eval_clj("(fn? inc)").unwrap(), Value::Bool(true));
}

// ====================
// Multi-arity
// ====================

#[test]
fn test_multi_arity_dispatch() {
    let source = r#"
(defn area
  ([side] (area side side))
  ([w h] (* w h)))
[(area 3) (area 2 5)]
"#;
    assert_eq!(eval_clj(source).unwrap(), ints(&[9, 10]));
}

#[test]
fn test_fixed_arity_preferred_over_variadic() {
    let source = r#"
(defn pick
  ([a] :one)
  ([a & more] :many))
[(pick 1) (pick 1 2) (pick 1 2 3)]
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([
            Value::keyword("one"),
            Value::keyword("many"),
            Value::keyword("many")
        ])
    );
}

#[test]
fn test_duplicate_arity_rejected() {
    let err = eval_clj("(fn* ([x] x) ([y] y))").unwrap_err();
    assert!(matches!(err, Error::Analysis { .. }));
}

#[test]
fn test_two_variadic_overloads_rejected() {
    let err = eval_clj("(fn* ([& a] a) ([x & b] b))").unwrap_err();
    assert!(err.to_string().contains("more than 1 variadic overload"));
}

#[test]
fn test_fixed_arity_above_variadic_rejected() {
    assert!(eval_clj("(fn* ([a b c] a) ([a & r] r))").is_err());
}

#[test]
fn test_too_many_arguments() {
    let err = eval_clj("((fn [x] x) 1 2)").unwrap_err();
    assert!(matches!(err.root(), Error::IllegalArgument(_)));
    assert!(err.root().to_string().contains("too many arguments"));
}

#[test]
fn test_too_few_arguments() {
    let err = eval_clj("((fn [x y] x) 1)").unwrap_err();
    assert!(err.root().to_string().contains("wrong number of arguments (1)"));
}

// ====================
// Variadic
// ====================

#[test]
fn test_rest_is_nil_at_minimum_arity() {
    assert_eq!(eval_clj("((fn [a & more] more) 1)").unwrap(), Value::Nil);
}

#[test]
fn test_rest_collects_extra_args() {
    assert_eq!(
        eval_clj("((fn [a & more] more) 1 2 3)").unwrap(),
        Value::list([Value::Int(2), Value::Int(3)])
    );
}

#[test]
fn test_only_rest_param() {
    assert_eq!(
        eval_clj("((fn [& xs] (count xs)) 1 2 3 4)").unwrap(),
        Value::Int(4)
    );
}

#[test]
fn test_apply_with_variadic() {
    let source = r#"
(defn total [& xs] (reduce + 0 xs))
(apply total 1 2 [3 4])
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::Int(10));
}

#[test]
fn test_ampersand_without_rest_rejected() {
    assert!(eval_clj("(fn [a &] a)").is_err());
}

// ====================
// Closures
// ====================

#[test]
fn test_closure_captures_local() {
    let source = r#"
(defn adder [n] (fn [x] (+ x n)))
(let [add5 (adder 5)
      add10 (adder 10)]
  [(add5 1) (add10 1)])
"#;
    assert_eq!(eval_clj(source).unwrap(), ints(&[6, 11]));
}

#[test]
fn test_closure_sees_later_var_root() {
    let source = r#"
(def base 1)
(defn plus-base [x] (+ x base))
(def base 100)
(plus-base 1)
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::Int(101));
}

#[test]
fn test_named_fn_self_reference() {
    let source = r#"
((fn fact [n] (if (<= n 1) 1 (* n (fact (dec n))))) 10)
"#;
    assert_eq!(eval_clj(source).unwrap(), Value::Int(3628800));
}

#[test]
fn test_higher_order_fns() {
    let source = r#"
(defn compose [f g] (fn [x] (f (g x))))
(map (compose inc (fn [x] (* x 2))) [1 2 3])
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::list([Value::Int(3), Value::Int(5), Value::Int(7)])
    );
}

#[test]
fn test_fn_with_meta_keeps_behaviour() {
    let source = r#"
(let [f (with-meta (fn [x] (* 3 x)) {:tag :tripler})]
  [(f 2) (:tag (meta f))])
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([Value::Int(6), Value::keyword("tripler")])
    );
}

// ====================
// letfn
// ====================

#[test]
fn test_letfn_mutual_recursion() {
    let source = r#"
(letfn [(ev? [n] (if (= n 0) true (od? (dec n))))
        (od? [n] (if (= n 0) false (ev? (dec n))))]
  [(ev? 10) (od? 7) (ev? 3)])
"#;
    assert_eq!(
        eval_clj(source).unwrap(),
        Value::vector([Value::Bool(true), Value::Bool(true), Value::Bool(false)])
    );
}

#[test]
fn test_letfn_fn_sees_itself() {
    let source = r#"
(letfn [(countdown [n acc] (if (= n 0) acc (countdown (dec n) (conj acc n))))]
  (countdown 3 []))
"#;
    assert_eq!(eval_clj(source).unwrap(), ints(&[3, 2, 1]));
}

// ====================
// Invocable values
// ====================

#[test]
fn test_keyword_and_map_invocation() {
    assert_eq!(eval_clj("(:a {:a 1})").unwrap(), Value::Int(1));
    assert_eq!(eval_clj("({:a 1} :b 2)").unwrap(), Value::Int(2));
    assert_eq!(eval_clj("(#{:x} :x)").unwrap(), Value::keyword("x"));
    assert_eq!(eval_clj("([10 20] 1)").unwrap(), Value::Int(20));
}

#[test]
fn test_calling_non_fn() {
    let err = eval_clj("(1 2)").unwrap_err();
    assert!(matches!(err.root(), Error::NotCallable { .. }));
}

#[test]
fn test_error_carries_call_frames() {
    let source = r#"
(defn inner [x] (/ x 0))
(defn outer [x] (inner x))
(outer 1)
"#;
    let err = eval_clj(source).unwrap_err();
    assert!(matches!(err.root(), Error::DivisionByZero));
    assert!(!err.stack().is_empty());
}
