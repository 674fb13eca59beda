use super::{ParserState, Step, TextState};
use crate::context::ParserContext;
use crate::events::{Metadata, SegmentType};
use agentflux_core::StreamError;
use serde_json::Value;
use tracing::debug;

/// Per-syntax behaviour plugged into [`DelimitedContentState`].
pub trait DelimitedHooks {
    /// Segment type and START metadata for the opener, or `None` to veto the
    /// opener, in which case it is emitted as plain text.
    fn start(&mut self, ctx: &ParserContext, opening: &str) -> Option<(SegmentType, Metadata)>;

    /// Whether the opening and closing delimiters are part of CONTENT.
    fn include_delimiters(&self) -> bool;

    /// END metadata once `closer` (as it appeared in the stream) was found.
    fn on_complete(&mut self, _closer: &str) -> Option<Metadata> {
        None
    }
}

/// Streams everything between an opener and a closer as one segment.
///
/// The closer is searched case-insensitively over the held-back tail plus
/// the new input. Up to `holdback` trailing characters that could be the
/// beginning of a split closer are retained until more input arrives, so a
/// closer straddling two chunks is never emitted as content.
#[derive(Debug)]
pub struct DelimitedContentState<H> {
    opening: String,
    closer: String,
    holdback: usize,
    tail: String,
    started: bool,
    hooks: H,
}

impl<H: DelimitedHooks> DelimitedContentState<H> {
    pub fn new(opening: String, closer: &str, hooks: H) -> Self {
        Self {
            opening,
            closer: closer.to_ascii_lowercase(),
            holdback: closer.chars().count().saturating_sub(1),
            tail: String::new(),
            started: false,
            hooks,
        }
    }

    pub fn run(&mut self, ctx: &mut ParserContext) -> Result<Step, StreamError> {
        if !self.started {
            let Some((segment_type, metadata)) = self.hooks.start(ctx, &self.opening) else {
                debug!(opener = %self.opening, "Opener vetoed, emitting as text");
                ctx.emitter.append_text(&self.opening)?;
                return Ok(Step::Goto(ParserState::Text(TextState)));
            };
            let segment_id = ctx.emitter.start_segment(segment_type, metadata)?;
            debug!(segment_id = %segment_id, segment_type = %segment_type, "Segment started");
            self.started = true;
            if self.hooks.include_delimiters() {
                ctx.emitter.emit_content(&self.opening)?;
            }
            if is_self_closing(&self.opening) {
                ctx.emitter.end_segment(self.hooks.on_complete(""))?;
                return Ok(Step::Goto(ParserState::Text(TextState)));
            }
        }

        let start_pos = ctx.scanner.position();
        let new = ctx.scanner.consume_remaining();
        if new.is_empty() {
            return Ok(Step::Stay);
        }

        let tail_len = self.tail.len();
        let window = std::mem::take(&mut self.tail) + &new;
        match window.to_ascii_lowercase().find(&self.closer) {
            Some(idx) => {
                let match_end = idx + self.closer.len();
                ctx.emitter.emit_content(&window[..idx])?;
                let closer = &window[idx..match_end];
                if self.hooks.include_delimiters() {
                    ctx.emitter.emit_content(closer)?;
                }
                // Hand back what followed the closer.
                ctx.scanner
                    .set_position(start_pos + match_end.saturating_sub(tail_len));
                let end_meta = self.hooks.on_complete(closer);
                let segment_id = ctx.emitter.end_segment(end_meta)?;
                debug!(segment_id = %segment_id, "Segment closed");
                Ok(Step::Goto(ParserState::Text(TextState)))
            }
            None => {
                let keep_from = match self.holdback {
                    0 => window.len(),
                    n => window.char_indices().rev().nth(n - 1).map_or(0, |(i, _)| i),
                };
                ctx.emitter.emit_content(&window[..keep_from])?;
                self.tail = window[keep_from..].to_string();
                Ok(Step::Stay)
            }
        }
    }

    /// Flush held-back text and close the segment as incomplete.
    pub fn finalize(&mut self, ctx: &mut ParserContext) -> Result<(), StreamError> {
        if !self.started {
            return ctx.emitter.append_text(&self.opening);
        }
        let rest = std::mem::take(&mut self.tail) + &ctx.scanner.consume_remaining();
        ctx.emitter.emit_content(&rest)?;

        let mut metadata = Metadata::new();
        metadata.insert("incomplete".into(), Value::Bool(true));
        let segment_id = ctx.emitter.end_segment(Some(metadata))?;
        debug!(segment_id = %segment_id, "Stream ended inside segment");
        Ok(())
    }
}

fn is_self_closing(opening: &str) -> bool {
    opening.trim_end().trim_end_matches('>').trim_end().ends_with('/')
}
