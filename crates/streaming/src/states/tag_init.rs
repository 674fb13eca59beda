use super::{ParserState, Step, TextState};
use crate::context::ParserContext;
use crate::detection::{OpenerKind, Sniff};
use agentflux_core::StreamError;
use tracing::debug;

enum Resolution {
    Pending,
    Matched(OpenerKind),
    Rejected,
}

/// Buffers a possible opener until the competing strategies agree on it.
///
/// Every strategy that triggers on the first character sniffs the buffer
/// concurrently. The earliest strategy in priority order wins once it
/// matches and all strategies ahead of it have rejected.
#[derive(Debug)]
pub struct TagInitializationState {
    buffer: String,
    /// Strategy index and the last verdict for it. Only pending entries are
    /// sniffed again.
    candidates: Vec<(usize, Sniff)>,
}

impl TagInitializationState {
    pub fn new(ctx: &ParserContext, trigger: char) -> Self {
        let candidates = ctx
            .strategies
            .iter()
            .enumerate()
            .filter(|(_, s)| s.triggers_on(trigger))
            .map(|(i, _)| (i, Sniff::Pending))
            .collect();
        Self {
            buffer: trigger.to_string(),
            candidates,
        }
    }

    pub fn run(&mut self, ctx: &mut ParserContext) -> Result<Step, StreamError> {
        while let Some(c) = ctx.scanner.peek() {
            ctx.scanner.advance();
            self.buffer.push(c);

            match self.evaluate(ctx) {
                Resolution::Pending if self.buffer.len() > ctx.config.max_opener_len => {
                    debug!(len = self.buffer.len(), "Opener too long, emitting as text");
                    ctx.emitter.append_text(&self.buffer)?;
                    return Ok(Step::Goto(ParserState::Text(TextState)));
                }
                Resolution::Pending => {}
                Resolution::Matched(kind) => {
                    debug!(opener = %self.buffer, "Opener matched");
                    let opening = std::mem::take(&mut self.buffer);
                    return Ok(Step::Goto(ParserState::for_opener(kind, opening)));
                }
                Resolution::Rejected => return self.reject(ctx, c),
            }
        }
        Ok(Step::Stay)
    }

    /// An unfinished opener at end of stream is ordinary text.
    pub fn finalize(&mut self, ctx: &mut ParserContext) -> Result<(), StreamError> {
        let buffer = std::mem::take(&mut self.buffer);
        ctx.emitter.append_text(&buffer)
    }

    fn evaluate(&mut self, ctx: &ParserContext) -> Resolution {
        for (index, verdict) in &mut self.candidates {
            if matches!(verdict, Sniff::Pending) {
                *verdict = ctx.strategies[*index].sniff(&self.buffer);
            }
        }

        for (_, verdict) in &self.candidates {
            match verdict {
                Sniff::Rejected => continue,
                Sniff::Pending => return Resolution::Pending,
                Sniff::Matched(kind) => return Resolution::Matched(kind.clone()),
            }
        }
        Resolution::Rejected
    }

    /// Flush the buffer as text. If the rejecting character could itself
    /// start an opener, sniffing restarts from it.
    fn reject(&mut self, ctx: &mut ParserContext, last: char) -> Result<Step, StreamError> {
        let buffer = std::mem::take(&mut self.buffer);
        let restart = buffer.len() > last.len_utf8() && ctx.is_trigger(last);
        if restart {
            ctx.emitter
                .append_text(&buffer[..buffer.len() - last.len_utf8()])?;
            return Ok(Step::Goto(ParserState::TagInitialization(Self::new(ctx, last))));
        }
        ctx.emitter.append_text(&buffer)?;
        Ok(Step::Goto(ParserState::Text(TextState)))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ParserConfig;
    use crate::context::ParserContext;
    use crate::events::{SegmentEvent, SegmentType};
    use crate::syntax::ParserRegistries;

    fn text_of(events: &[SegmentEvent]) -> String {
        events
            .iter()
            .filter(|e| e.segment_type == SegmentType::Text)
            .filter_map(|e| e.delta())
            .collect()
    }

    #[test]
    fn ambiguous_prefix_is_held_back() {
        let mut ctx = ParserContext::with_defaults();
        let events = ctx.feed("see <too").unwrap();
        assert_eq!(text_of(&events), "see ");
        assert_eq!(ctx.state_name(), "tag_initialization");

        let events = ctx.feed("l name=\"x\">").unwrap();
        assert!(events.iter().any(|e| e.segment_type == SegmentType::ToolCall));
    }

    #[test]
    fn rejected_opener_is_flushed_as_text() {
        let mut ctx = ParserContext::with_defaults();
        let mut events = ctx.feed("<b>bold</b>").unwrap();
        events.extend(ctx.finalize().unwrap());
        assert_eq!(text_of(&events), "<b>bold</b>");
    }

    #[test]
    fn rejecting_trigger_restarts_sniffing() {
        let mut ctx = ParserContext::with_defaults();
        let mut events = ctx.feed("<<tool name=\"a\"></tool>").unwrap();
        events.extend(ctx.finalize().unwrap());
        assert_eq!(text_of(&events), "<");
        assert!(events.iter().any(|e| e.segment_type == SegmentType::ToolCall));
    }

    #[test]
    fn unfinished_opener_flushes_on_finalize() {
        let mut ctx = ParserContext::with_defaults();
        let mut events = ctx.feed("tail <tool name=").unwrap();
        events.extend(ctx.finalize().unwrap());
        assert_eq!(text_of(&events), "tail <tool name=");
    }

    #[test]
    fn overlong_opener_becomes_text() {
        let config = ParserConfig::default().with_max_opener_len(16);
        let mut ctx = ParserContext::new(config, ParserRegistries::default());
        let input = "<tool name=\"aaaaaaaaaaaaaaaaaaaa\">x</tool>";
        let mut events = ctx.feed(input).unwrap();
        events.extend(ctx.finalize().unwrap());
        assert_eq!(text_of(&events), input);
    }

    #[test]
    fn generic_tool_tag_is_text_when_tool_parsing_disabled() {
        let config = ParserConfig::default().with_parse_tool_calls(false);
        let mut ctx = ParserContext::new(config, ParserRegistries::default());
        let input = "<tool name=\"x\">{}</tool>";
        let mut events = ctx.feed(input).unwrap();
        events.extend(ctx.finalize().unwrap());
        assert_eq!(text_of(&events), input);
    }
}
