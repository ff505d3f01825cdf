//! Error types for the Jolt analyzer and evaluator

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runtime::{HostRegistry, Value};

/// Jolt errors
///
/// Reader and analysis errors are static: they are returned as-is and never reach a `catch`
/// clause. Everything under "Runtime errors" is dynamic and can be caught by `try`.
#[derive(Error, Debug, Clone)]
pub enum Error {
    // Reader errors
    /// Syntax error encountered while reading source text
    ///
    /// **Triggered by:** Unbalanced delimiters, bad escapes, malformed literals
    /// **Example:** `(if (> x 10)` (missing closing parenthesis)
    #[error("Syntax error at line {line}, column {col}: {message}")]
    SyntaxError {
        /// Line number where error occurred
        line: usize,
        /// Column number where error occurred
        col: usize,
        /// Error description
        message: String,
    },

    /// General parse error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Unexpected end of input while reading a form
    #[error("Unexpected end of file")]
    UnexpectedEof,

    // Analysis errors
    /// Malformed special form or invalid binding detected during analysis
    ///
    /// **Triggered by:** Shape violations decidable without running code
    /// **Example:** `(fn* ([x] x) ([y] y))` (two overloads with the same arity)
    #[error("{location}: {message}")]
    Analysis {
        /// Source position of the offending form
        location: SourceLocation,
        /// Error description
        message: String,
    },

    // Runtime errors
    /// Symbol that is neither local, a Var, nor a known host type
    #[error("unable to resolve symbol: {name}")]
    UnresolvedSymbol {
        /// Symbol as written
        name: String,
    },

    /// Dereference of a Var with no root and no thread binding
    #[error("Var {name} is unbound")]
    UnboundVar {
        /// Fully qualified Var name
        name: String,
    },

    /// Type mismatch error
    ///
    /// **Triggered by:** Operation expecting one type but receiving another
    /// **Example:** `(+ "hello" 5)`
    #[error("Type error: expected {expected}, got {got}")]
    TypeError {
        /// Expected type
        expected: String,
        /// Actual type
        got: String,
    },

    /// Attempt to call a non-callable value
    #[error("{type_name} cannot be invoked as a function")]
    NotCallable {
        /// Type of non-callable value
        type_name: String,
    },

    /// Illegal argument, including wrong arity at call time
    ///
    /// **Triggered by:** Calling a fn with an argument count no method accepts
    /// **Example:** `((fn* [x] x) 1 2)` gives `wrong number of arguments (2)`
    #[error("{0}")]
    IllegalArgument(String),

    /// Operation not legal in the current state
    #[error("{0}")]
    IllegalState(String),

    /// Division by zero error
    #[error("Divide by zero")]
    DivisionByZero,

    /// Integer overflow and other arithmetic failures
    #[error("{0}")]
    Arithmetic(String),

    /// Sequential index out of bounds
    #[error("Index out of bounds: {index} for collection of length {length}")]
    IndexOutOfBounds {
        /// Requested index
        index: i64,
        /// Collection length
        length: usize,
    },

    /// Host operation the runtime does not support
    #[error("{0}")]
    Unsupported(String),

    /// General runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// Value raised by `throw`, propagating until a matching `catch`
    #[error("Uncaught exception: {0}")]
    Thrown(Box<Value>),

    /// Failure annotated with the call sites it unwound through
    #[error("{0}")]
    Eval(Box<EvalError>),

    // Resource errors
    /// Evaluation stopped by a cancellation token
    #[error("Evaluation cancelled")]
    Cancelled,

    /// Non-tail call depth exceeded the configured limit
    #[error("Call depth limit exceeded (max: {limit})")]
    ExecutionLimitExceeded {
        /// Maximum allowed call depth
        limit: usize,
    },
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Aborts the current top-level evaluation; no `catch` can observe it
    Fatal,
    /// Dynamic failure a `catch` clause may handle
    Recoverable,
}

impl Error {
    /// Create a runtime error with a message
    pub fn runtime(msg: impl Into<String>) -> Self {
        Error::RuntimeError(msg.into())
    }

    /// Create an illegal argument error with a message
    pub fn illegal_argument(msg: impl Into<String>) -> Self {
        Error::IllegalArgument(msg.into())
    }

    /// Create an analysis error located at `form`
    pub fn analysis(form: &Value, msg: impl Into<String>) -> Self {
        Error::Analysis {
            location: SourceLocation::of(form),
            message: msg.into(),
        }
    }

    /// Create a type error from the expected type and the offending value
    pub fn type_error(expected: impl Into<String>, got: &Value) -> Self {
        Error::TypeError {
            expected: expected.into(),
            got: got.type_name().to_string(),
        }
    }

    /// Raise `value` as a thrown value
    pub fn thrown(value: Value) -> Self {
        Error::Thrown(Box::new(value))
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::SyntaxError { .. }
            | Error::ParseError(_)
            | Error::UnexpectedEof
            | Error::Analysis { .. }
            | Error::Cancelled => ErrorSeverity::Fatal,
            Error::Eval(inner) => inner.error.classify(),
            _ => ErrorSeverity::Recoverable,
        }
    }

    /// Whether a `catch` clause may observe this error
    pub fn is_catchable(&self) -> bool {
        self.classify() == ErrorSeverity::Recoverable
    }

    /// The original failure beneath any call-site annotation
    pub fn root(&self) -> &Error {
        match self {
            Error::Eval(inner) => inner.error.root(),
            other => other,
        }
    }

    /// Call-site frames accumulated while unwinding, innermost first
    pub fn stack(&self) -> &[StackFrame] {
        match self {
            Error::Eval(inner) => &inner.stack,
            _ => &[],
        }
    }

    /// Record that this error unwound through the call site `frame`
    pub fn with_frame(self, frame: StackFrame) -> Self {
        match self {
            Error::Eval(mut inner) => {
                inner.stack.push(frame);
                Error::Eval(inner)
            }
            other => Error::Eval(Box::new(EvalError {
                error: other,
                stack: vec![frame],
            })),
        }
    }

    /// The value a `catch` clause binds when this error is caught
    ///
    /// Thrown values are handed over unchanged. Internal failures become exception objects
    /// whose host type mirrors the failure class.
    pub fn thrown_value(&self, host: &HostRegistry) -> Option<Value> {
        if !self.is_catchable() {
            return None;
        }
        let root = self.root();
        let type_name = match root {
            Error::Thrown(value) => return Some((**value).clone()),
            Error::IllegalArgument(_) => "IllegalArgumentException",
            Error::TypeError { .. } | Error::NotCallable { .. } => "ClassCastException",
            Error::UnboundVar { .. } | Error::IllegalState(_) => "IllegalStateException",
            Error::DivisionByZero | Error::Arithmetic(_) => "ArithmeticException",
            Error::IndexOutOfBounds { .. } => "IndexOutOfBoundsException",
            Error::Unsupported(_) => "UnsupportedOperationException",
            Error::ExecutionLimitExceeded { .. } => "StackOverflowError",
            _ => "RuntimeException",
        };
        Some(host.new_exception(type_name, root.to_string(), None))
    }
}

/// Source position attached to reader forms as `:file`, `:line` and `:column` metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source name
    pub file: Option<String>,
    /// Line number (1-indexed)
    pub line: Option<i64>,
    /// Column number (1-indexed)
    pub column: Option<i64>,
}

impl SourceLocation {
    /// Reads the position from a form's metadata; missing keys stay `None`
    pub fn of(form: &Value) -> Self {
        let meta = match form.meta() {
            Some(meta) => meta,
            None => return SourceLocation::default(),
        };
        let int_at = |key: &str| match meta.get(&Value::keyword(key)) {
            Some(Value::Int(n)) => Some(*n),
            _ => None,
        };
        SourceLocation {
            file: match meta.get(&Value::keyword("file")) {
                Some(Value::String(s)) => Some(s.to_string()),
                _ => None,
            },
            line: int_at("line"),
            column: int_at("column"),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_unknown<T: fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map_or_else(|| "?".to_string(), |v| v.to_string())
        }
        write!(
            f,
            "{}:{}:{}",
            or_unknown(&self.file),
            or_unknown(&self.line),
            or_unknown(&self.column)
        )
    }
}

/// One Invoke boundary an uncaught failure unwound through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Position of the call form
    pub location: SourceLocation,
    /// Printed call form
    pub form: String,
}

impl StackFrame {
    /// Builds a frame for the call form `form`
    pub fn for_form(form: &Value) -> Self {
        StackFrame {
            location: SourceLocation::of(form),
            form: form.to_string(),
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.form)
    }
}

/// Failure annotated with the call sites it unwound through
#[derive(Debug, Clone)]
pub struct EvalError {
    /// The original failure
    pub error: Error,
    /// Frames, innermost call first
    pub stack: Vec<StackFrame>,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\n", self.error)?;
        for frame in &self.stack {
            writeln!(f, "{}", frame)?;
        }
        Ok(())
    }
}

/// Result type for Jolt operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display_uses_placeholders() {
        let loc = SourceLocation {
            file: None,
            line: Some(3),
            column: None,
        };
        assert_eq!(loc.to_string(), "?:3:?");
    }

    #[test]
    fn test_with_frame_accumulates() {
        let frame = |line| StackFrame {
            location: SourceLocation {
                file: Some("t.clj".to_string()),
                line: Some(line),
                column: Some(1),
            },
            form: "(f)".to_string(),
        };
        let err = Error::illegal_argument("wrong number of arguments (2)")
            .with_frame(frame(1))
            .with_frame(frame(2));

        assert_eq!(err.stack().len(), 2);
        assert_eq!(err.stack()[0].location.line, Some(1));
        assert!(matches!(err.root(), Error::IllegalArgument(_)));
        assert!(err.to_string().contains("t.clj:2:1: (f)"));
    }

    #[test]
    fn test_cancelled_is_not_catchable() {
        assert!(!Error::Cancelled.is_catchable());
        assert!(!Error::Cancelled.with_frame(StackFrame::for_form(&Value::Nil)).is_catchable());
        assert!(Error::DivisionByZero.is_catchable());
    }
}
