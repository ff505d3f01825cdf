//! Runtime: values, the Var/namespace store and the tree-walking evaluator

pub mod bindings;
mod collections;
mod config;
mod context;
mod environment;
mod evaluator;
pub mod function;
pub mod host;
mod interpreter;
pub mod namespace;
pub mod symbol;
mod value;
pub mod var;

pub use collections::{elide_source_keys, merge_meta, List, Map, Meta, Set, Vector};
pub use config::EvalConfig;
pub use context::{CancellationToken, Runtime};
pub use environment::{Environment, RecurTarget};
pub use function::{apply, Closure};
pub use host::{Exception, HostObject, HostRegistry, HostType};
pub use interpreter::Interpreter;
pub use namespace::{Namespace, NamespaceRegistry, CORE_NS, DEFAULT_NS};
pub use symbol::{Keyword, Symbol};
pub use value::Value;
pub use var::Var;
