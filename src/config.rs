use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::ast::SchemaRegistry;
use crate::error::Result;

pub const POLICY_NAME: &str = "org.thingpedia.dialogue.transaction";

/// Results at or above this size are "large": the agent should ask a
/// search question instead of listing them.
pub const LARGE_RESULT_THRESHOLD: usize = 50;

/// Session-wide knobs, passed explicitly to whatever needs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    pub policy_name: String,
    /// When set, a new request must switch to a different device than the
    /// current statement.
    pub strict_multidomain: bool,
    pub large_result_threshold: usize,
    /// Function invoked by the `init` state, e.g. `org.thingpedia.builtin.thingengine.builtin:get_time`.
    pub initial_function: Option<String>,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            policy_name: POLICY_NAME.to_string(),
            strict_multidomain: false,
            large_result_threshold: LARGE_RESULT_THRESHOLD,
            initial_function: None,
        }
    }
}

impl DialogueConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}

/// What every context is built against: the function signatures and the
/// session configuration. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DialogueEnv {
    pub registry: Arc<dyn SchemaRegistry>,
    pub config: Arc<DialogueConfig>,
}

impl DialogueEnv {
    pub fn new(registry: Arc<dyn SchemaRegistry>, config: DialogueConfig) -> Self {
        Self { registry, config: Arc::new(config) }
    }
}
