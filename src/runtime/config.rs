use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Evaluator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Maximum nesting of non-tail fn invocations before evaluation fails
    pub max_call_depth: usize,
    /// Source name the reader records as `:file`
    pub source_name: String,
    /// Emit a `trace!` event for every invocation
    pub trace_invocations: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_call_depth: 512,
            source_name: "NO_SOURCE_FILE".to_string(),
            trace_invocations: false,
        }
    }
}

impl EvalConfig {
    /// Loads settings from JSON; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::ParseError(format!("invalid config: {}", e)))
    }
}
