//! Segment events — the engine's only output besides tool invocations.
//!
//! Every segment produces exactly one `START`, zero or more `CONTENT`
//! and exactly one `END`, all sharing one `segment_id`. Concatenating the
//! `CONTENT` deltas of a segment yields its raw content byte-for-byte.

use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON object used for segment metadata and tool arguments.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentEventType {
    Start,
    Content,
    End,
}

/// What kind of span a segment is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    Text,
    ToolCall,
    WriteFile,
    RunBash,
    PatchFile,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::ToolCall => "tool_call",
            Self::WriteFile => "write_file",
            Self::RunBash => "run_bash",
            Self::PatchFile => "patch_file",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentPayload {
    /// Content appended by a `CONTENT` event (never the accumulated buffer)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentEvent {
    pub event_type: SegmentEventType,
    pub segment_id: String,
    pub segment_type: SegmentType,
    #[serde(default)]
    pub payload: SegmentPayload,
}

impl SegmentEvent {
    pub fn start(segment_id: impl Into<String>, segment_type: SegmentType, metadata: Option<Metadata>) -> Self {
        Self {
            event_type: SegmentEventType::Start,
            segment_id: segment_id.into(),
            segment_type,
            payload: SegmentPayload { delta: None, metadata },
        }
    }

    pub fn content(
        segment_id: impl Into<String>,
        segment_type: SegmentType,
        delta: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> Self {
        Self {
            event_type: SegmentEventType::Content,
            segment_id: segment_id.into(),
            segment_type,
            payload: SegmentPayload {
                delta: Some(delta.into()),
                metadata,
            },
        }
    }

    pub fn end(segment_id: impl Into<String>, segment_type: SegmentType, metadata: Option<Metadata>) -> Self {
        Self {
            event_type: SegmentEventType::End,
            segment_id: segment_id.into(),
            segment_type,
            payload: SegmentPayload { delta: None, metadata },
        }
    }

    pub fn delta(&self) -> Option<&str> {
        self.payload.delta.as_deref()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.payload.metadata.as_ref()
    }

    /// A string-valued metadata entry.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata()?.get(key)?.as_str()
    }
}
