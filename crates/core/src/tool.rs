//! Tool types — what the streaming layer hands to the tool runtime.
//!
//! The engine never executes tools. It only reconstructs [`ToolInvocation`]s
//! from the LLM output; the agent worker loop executes them.

use serde::{Deserialize, Serialize};

/// A reconstructed, named call with argument values.
///
/// Created exactly once per completed tool-call segment and never mutated
/// afterwards. `id` is the id of the segment it was reconstructed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Originating segment id
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON object
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolInvocation {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Look up a string argument.
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}
