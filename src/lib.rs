//! # Jolt - A Clojure Analyzer and Evaluator
//!
//! Jolt reads Clojure source, analyzes each form into a typed AST and evaluates it with a
//! tree-walking interpreter. The analyzer resolves symbols against a namespace/Var store,
//! expands macros and rejects malformed special forms before anything runs; the evaluator
//! then executes the AST with closures, multi-arity fns, a stack-safe `recur`,
//! `try`/`catch`/`finally` and dynamically bound Vars.
//!
//! ## Quick Start
//!
//! ```rust
//! use jolt::{Interpreter, Value};
//!
//! # fn main() -> jolt::Result<()> {
//! let interp = Interpreter::new();
//! let result = interp.eval_str(r#"
//!     (defn sum-to [n]
//!       (loop [i n acc 0]
//!         (if (= i 0) acc (recur (dec i) (+ acc i)))))
//!     (sum-to 10)
//! "#)?;
//!
//! assert_eq!(result, Value::Int(55));
//! # Ok(())
//! # }
//! ```
//!
//! ### Step by Step
//!
//! Each stage is usable on its own: scan, read, analyze, evaluate.
//!
//! ```rust
//! use jolt::{Interpreter, Parser, Scanner, Value};
//!
//! # fn main() -> jolt::Result<()> {
//! let tokens = Scanner::new("(if (< 1 2) :yes :no)").scan_tokens()?;
//! let forms = Parser::new(tokens).parse()?;
//!
//! let interp = Interpreter::new();
//! let node = interp.analyze_form(&forms[0])?;
//! assert_eq!(node.op().to_string(), ":if");
//! assert_eq!(interp.eval_form(&forms[0])?, Value::keyword("yes"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Analysis errors are returned before evaluation starts. Runtime failures can be caught by
//! `try`; uncaught ones carry one stack frame per call they unwound through.
//!
//! ```rust
//! use jolt::{Error, Interpreter, Value};
//!
//! let interp = Interpreter::new();
//!
//! // Malformed special form: rejected by the analyzer
//! let err = interp.eval_str("(fn* ([x] x) ([y] y))").unwrap_err();
//! assert!(matches!(err, Error::Analysis { .. }));
//!
//! // Thrown values are caught by type
//! let caught = interp.eval_str(r#"
//!     (try (throw (ex-info "boom" {:code 7}))
//!       (catch ExceptionInfo e (:code (ex-data e))))
//! "#).unwrap();
//! assert_eq!(caught, Value::Int(7));
//! ```
//!
//! ## Architecture
//!
//! - [`lexer`] - Source text to tokens
//! - [`parser`] - Tokens to forms, with reader macros expanded
//! - [`analyzer`] - Forms to [`ast::Node`] trees
//! - [`runtime`] - Values, Vars, namespaces and the evaluator
//! - [`tools`] - Native fns and bootstrap macros of `clojure.core`

// Allow specific clippy warnings that are false positives or intentional design choices
#![allow(clippy::only_used_in_recursion)] // False positive for recursive helper functions
#![allow(clippy::large_enum_variant)] // Node payloads are boxed where it matters

/// Version of the Jolt interpreter
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod analyzer;
pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod tools;

// Re-export main types
pub use analyzer::{Analyzer, MacroInvoker};
pub use ast::{Node, NodeKind, Op};
pub use error::{Error, Result};
pub use lexer::{SExprScanner, Token, TokenKind};
pub use parser::SExprParser;
pub use runtime::{EvalConfig, Interpreter, Keyword, Runtime, Symbol, Value};
pub use tools::{NativeFn, Tool, ToolRegistry};

/// Type alias for the scanner (lexer).
/// Converts raw source text into tokens for the reader.
pub type Scanner = SExprScanner;

/// Type alias for the reader.
/// Converts tokens into forms.
pub type Parser = SExprParser;

/// Type alias for the interpreter.
/// Analyzes and executes forms and produces runtime values.
pub type Evaluator = Interpreter;
