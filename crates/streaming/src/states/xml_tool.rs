use super::DelimitedHooks;
use crate::context::ParserContext;
use crate::events::{Metadata, SegmentType};
use crate::xml_args::parse_attributes;
use serde_json::Value;
use tracing::debug;

/// `<tool name="...">...</tool>`.
///
/// The tags stay in CONTENT so the raw call round-trips; the adapter strips
/// them when it builds arguments.
#[derive(Debug, Default)]
pub struct XmlToolHooks;

impl DelimitedHooks for XmlToolHooks {
    fn start(&mut self, ctx: &ParserContext, opening: &str) -> Option<(SegmentType, Metadata)> {
        let attrs = parse_attributes(opening);
        let Some(name) = attrs
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
        else {
            debug!(opener = %opening, "Tool tag without a name");
            return None;
        };

        let segment_type = ctx.registries.tool_states.segment_type_for(name);
        let mut metadata = Metadata::new();
        metadata.insert("tool_name".into(), name.into());
        metadata.insert("syntax".into(), "xml".into());
        Some((segment_type, metadata))
    }

    fn include_delimiters(&self) -> bool {
        true
    }
}
