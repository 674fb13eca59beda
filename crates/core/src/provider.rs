//! Provider-side shapes consumed by the streaming layer.
//!
//! The LLM clients live elsewhere; this module only names the providers (the
//! handler factory uses the provider as a tie-breaker when picking a
//! tool-call format) and describes one chunk of a provider stream.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The LLM vendor a response stream comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
    Gemini,
    Mistral,
    DeepSeek,
    Ollama,
    Other,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Mistral => "mistral",
            Self::DeepSeek => "deepseek",
            Self::Ollama => "ollama",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = std::convert::Infallible;

    /// Unknown names map to [`LlmProvider::Other`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Self::Anthropic,
            "openai" | "open_ai" | "azure" => Self::OpenAi,
            "gemini" | "google" => Self::Gemini,
            "mistral" => Self::Mistral,
            "deepseek" => Self::DeepSeek,
            "ollama" => Self::Ollama,
            _ => Self::Other,
        })
    }
}

/// How tool calls are encoded in an LLM response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallFormat {
    /// `<tool name="...">...</tool>` tags in the text stream
    Xml,
    /// Bare JSON objects recognised by signature prefixes
    Json,
    /// `[TOOL_CALL] ... [/TOOL_CALL]` delimited JSON
    Sentinel,
    /// Structured tool-call deltas from the provider API
    ApiToolCall,
}

impl ToolCallFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Json => "json",
            Self::Sentinel => "sentinel",
            Self::ApiToolCall => "api_tool_call",
        }
    }
}

impl fmt::Display for ToolCallFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolCallFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xml" => Ok(Self::Xml),
            "json" => Ok(Self::Json),
            "sentinel" => Ok(Self::Sentinel),
            "api_tool_call" | "api" | "native" => Ok(Self::ApiToolCall),
            other => Err(format!("unknown tool call format '{other}'")),
        }
    }
}

/// A partial native tool call, as emitted by providers with structured
/// tool-call streaming.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Position of the call within the response
    pub index: usize,

    /// Provider call id (usually only on the first delta of a call)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Tool name (usually only on the first delta of a call)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Fragment of the JSON-encoded arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments_delta: Option<String>,
}

/// A single chunk of an LLM response stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Partial tool call deltas
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallDelta>,
}

impl ResponseChunk {
    /// A chunk carrying only text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// A chunk carrying only native tool-call deltas.
    pub fn tool_calls(tool_calls: Vec<ToolCallDelta>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }
}

impl From<&str> for ResponseChunk {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for ResponseChunk {
    fn from(s: String) -> Self {
        Self::text(s)
    }
}
