use super::DelimitedHooks;
use crate::context::ParserContext;
use crate::events::{Metadata, SegmentType};

/// `[TOOL_CALL] ... [/TOOL_CALL]`. The sentinels stay in CONTENT.
#[derive(Debug, Default)]
pub struct SentinelHooks;

impl DelimitedHooks for SentinelHooks {
    fn start(&mut self, _ctx: &ParserContext, _opening: &str) -> Option<(SegmentType, Metadata)> {
        let mut metadata = Metadata::new();
        metadata.insert("syntax".into(), "sentinel".into());
        Some((SegmentType::ToolCall, metadata))
    }

    fn include_delimiters(&self) -> bool {
        true
    }
}
