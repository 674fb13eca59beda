use super::{ParserState, Step, TextState};
use crate::context::ParserContext;
use crate::events::{Metadata, SegmentType};
use crate::json_extractor::JsonStringFieldExtractor;
use agentflux_core::StreamError;
use serde_json::Value;
use tracing::debug;

const NAME_FIELDS: [&str; 4] = ["name", "tool_name", "function", "tool"];

/// A bare JSON tool call recognised by its signature prefix.
///
/// The segment runs until the bracket depth returns to zero. Brackets inside
/// strings are ignored, so the only thing that can end the segment early is
/// malformed JSON, which the adapter then tolerates.
#[derive(Debug)]
pub struct JsonToolParsingState {
    seed: String,
    started: bool,
    depth: usize,
    in_string: bool,
    escaped: bool,
    extractor: JsonStringFieldExtractor,
}

impl JsonToolParsingState {
    pub fn new(seed: String) -> Self {
        Self {
            seed,
            started: false,
            depth: 0,
            in_string: false,
            escaped: false,
            extractor: JsonStringFieldExtractor::new(Vec::<String>::new(), NAME_FIELDS),
        }
    }

    pub fn run(&mut self, ctx: &mut ParserContext) -> Result<Step, StreamError> {
        if !self.started {
            let mut metadata = Metadata::new();
            metadata.insert("syntax".into(), "json".into());
            let segment_id = ctx.emitter.start_segment(SegmentType::ToolCall, metadata)?;
            debug!(segment_id = %segment_id, "JSON tool call started");
            self.started = true;

            let seed = std::mem::take(&mut self.seed);
            if let Some(end) = self.track(&seed) {
                // Only a signature that closes itself gets here.
                ctx.emitter.emit_content(&seed[..end])?;
                let step = self.finish(ctx)?;
                ctx.emitter.append_text(&seed[end..])?;
                return Ok(step);
            }
            ctx.emitter.emit_content(&seed)?;
        }

        let new = ctx.scanner.consume_remaining();
        if new.is_empty() {
            return Ok(Step::Stay);
        }
        match self.track(&new) {
            Some(end) => {
                ctx.emitter.emit_content(&new[..end])?;
                let back = new.len() - end;
                ctx.scanner.set_position(ctx.scanner.position() - back);
                self.finish(ctx)
            }
            None => {
                ctx.emitter.emit_content(&new)?;
                Ok(Step::Stay)
            }
        }
    }

    pub fn finalize(&mut self, ctx: &mut ParserContext) -> Result<(), StreamError> {
        if !self.started {
            return ctx.emitter.append_text(&self.seed);
        }
        let mut metadata = self.end_metadata();
        metadata.insert("incomplete".into(), Value::Bool(true));
        ctx.emitter.end_segment(Some(metadata))?;
        Ok(())
    }

    /// Advance the bracket tracker over `text`. Returns the byte offset just
    /// past the bracket that closes the top-level value, if it is in `text`.
    fn track(&mut self, text: &str) -> Option<usize> {
        for (i, c) in text.char_indices() {
            if self.in_string {
                match c {
                    _ if self.escaped => self.escaped = false,
                    '\\' => self.escaped = true,
                    '"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => self.in_string = true,
                '{' | '[' => self.depth += 1,
                '}' | ']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        let end = i + c.len_utf8();
                        self.extractor.feed(&text[..end]);
                        return Some(end);
                    }
                }
                _ => {}
            }
        }
        self.extractor.feed(text);
        None
    }

    fn end_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        if let Some(name) = NAME_FIELDS
            .iter()
            .find_map(|field| self.extractor.completed_value(field))
        {
            metadata.insert("tool_name".into(), name.into());
        }
        metadata
    }

    fn finish(&mut self, ctx: &mut ParserContext) -> Result<Step, StreamError> {
        let segment_id = ctx.emitter.end_segment(Some(self.end_metadata()))?;
        debug!(segment_id = %segment_id, "JSON tool call closed");
        Ok(Step::Goto(ParserState::Text(TextState)))
    }
}
