use super::DelimitedHooks;
use crate::context::ParserContext;
use crate::events::{Metadata, SegmentType};
use crate::syntax::ToolSyntaxSpec;
use crate::xml_args::{parse_attributes, tag_name};
use std::sync::Arc;
use tracing::debug;

/// Shorthand tags such as `<write_file path="...">`.
///
/// Attributes become START metadata. CONTENT carries the tag verbatim,
/// delimiters included, and the delimiters are also recorded as
/// `opening_tag` / `closing_tag` metadata so the body can be recovered.
#[derive(Debug)]
pub struct CustomTagHooks {
    spec: Arc<ToolSyntaxSpec>,
}

impl CustomTagHooks {
    pub fn new(spec: Arc<ToolSyntaxSpec>) -> Self {
        Self { spec }
    }
}

impl DelimitedHooks for CustomTagHooks {
    fn start(&mut self, ctx: &ParserContext, opening: &str) -> Option<(SegmentType, Metadata)> {
        let tag = tag_name(opening);
        let Some(spec) = ctx.registries.syntax.get(&tag) else {
            debug!(tag = %tag, "No syntax registered for tag");
            return None;
        };
        self.spec = spec;

        let mut metadata = parse_attributes(opening);
        metadata.insert("tag".into(), self.spec.tag_name.clone().into());
        metadata.insert("opening_tag".into(), opening.into());
        Some((self.spec.segment_type, metadata))
    }

    fn include_delimiters(&self) -> bool {
        true
    }

    fn on_complete(&mut self, closer: &str) -> Option<Metadata> {
        if closer.is_empty() {
            return None;
        }
        let mut metadata = Metadata::new();
        metadata.insert("closing_tag".into(), closer.into());
        Some(metadata)
    }
}
