//! Parser configuration. Fixed once a [`ParserContext`](crate::ParserContext)
//! is built from it.

use crate::json_parsers::{DefaultJsonToolParser, JsonToolParsingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// JSON prefixes that mark the start of a tool call in plain text.
/// Compared with whitespace removed.
pub const DEFAULT_JSON_TOOL_PATTERNS: &[&str] = &[
    r#"{"tool":"#,
    r#"{"tool_name":"#,
    r#"{"function":"#,
    r#"{"name":"#,
    r#"{"tool_calls":"#,
    r#"[{"tool":"#,
    r#"[{"tool_name":"#,
    r#"[{"function":"#,
    r#"[{"name":"#,
];

pub const DEFAULT_COMPACT_THRESHOLD: usize = 4096;
pub const DEFAULT_MAX_OPENER_LEN: usize = 1024;

/// Which opener families the parser sniffs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategyKind {
    XmlTag,
    JsonTool,
    Sentinel,
}

impl DetectionStrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::XmlTag => "xml_tag",
            Self::JsonTool => "json_tool",
            Self::Sentinel => "sentinel",
        }
    }
}

impl fmt::Display for DetectionStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xml_tag" | "xml" => Ok(Self::XmlTag),
            "json_tool" | "json" => Ok(Self::JsonTool),
            "sentinel" => Ok(Self::Sentinel),
            other => Err(format!("unknown detection strategy: {other}")),
        }
    }
}

#[derive(Clone)]
pub struct ParserConfig {
    /// Recognise generic tool calls (`<tool>`, JSON, sentinel). Custom
    /// shorthand tags are parsed regardless.
    pub parse_tool_calls: bool,
    pub json_tool_patterns: Vec<String>,
    /// Strategy handed to the invocation adapter; `None` means default.
    pub json_tool_parser: Option<Arc<dyn JsonToolParsingStrategy>>,
    /// Earlier strategies win when several match the same opener.
    pub strategy_order: Vec<DetectionStrategyKind>,
    /// Prepended to every segment id.
    pub segment_id_prefix: Option<String>,
    /// Consumed bytes retained before the scanner compacts.
    pub compact_threshold: usize,
    /// Longest opener buffered before giving up and emitting it as text.
    pub max_opener_len: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            parse_tool_calls: true,
            json_tool_patterns: DEFAULT_JSON_TOOL_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            json_tool_parser: None,
            strategy_order: vec![DetectionStrategyKind::XmlTag],
            segment_id_prefix: None,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            max_opener_len: DEFAULT_MAX_OPENER_LEN,
        }
    }
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfig")
            .field("parse_tool_calls", &self.parse_tool_calls)
            .field("json_tool_patterns", &self.json_tool_patterns)
            .field(
                "json_tool_parser",
                &self.json_tool_parser.as_ref().map(|p| p.name()),
            )
            .field("strategy_order", &self.strategy_order)
            .field("segment_id_prefix", &self.segment_id_prefix)
            .field("compact_threshold", &self.compact_threshold)
            .field("max_opener_len", &self.max_opener_len)
            .finish()
    }
}

impl ParserConfig {
    pub fn with_parse_tool_calls(mut self, enabled: bool) -> Self {
        self.parse_tool_calls = enabled;
        self
    }

    /// Replace the JSON signatures. An empty list keeps the defaults.
    pub fn with_json_tool_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        if !patterns.is_empty() {
            self.json_tool_patterns = patterns;
        }
        self
    }

    pub fn with_json_tool_parser(mut self, parser: Arc<dyn JsonToolParsingStrategy>) -> Self {
        self.json_tool_parser = Some(parser);
        self
    }

    pub fn with_strategy_order(mut self, order: Vec<DetectionStrategyKind>) -> Self {
        self.strategy_order = order;
        self
    }

    pub fn with_segment_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.segment_id_prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    pub fn with_compact_threshold(mut self, threshold: usize) -> Self {
        self.compact_threshold = threshold;
        self
    }

    pub fn with_max_opener_len(mut self, len: usize) -> Self {
        self.max_opener_len = len.max(1);
        self
    }

    /// The configured JSON strategy, or the default one.
    pub fn json_parser(&self) -> Arc<dyn JsonToolParsingStrategy> {
        self.json_tool_parser
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultJsonToolParser))
    }
}
