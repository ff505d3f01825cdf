//! Standard library: the native contents of `clojure.core`

pub mod builtins;
pub mod macros;
pub mod math;
pub mod sequences;

use std::sync::Arc;

use crate::runtime::HostRegistry;
use crate::tools::ToolRegistry;

/// Register all standard library tools
pub fn register_all(registry: &mut ToolRegistry, host: &Arc<HostRegistry>) {
    builtins::register(registry, host);
    math::register(registry);
    sequences::register(registry);
    macros::register(registry);
}
