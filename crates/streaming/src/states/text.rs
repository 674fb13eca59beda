use super::{ParserState, Step, TagInitializationState};
use crate::context::ParserContext;
use agentflux_core::StreamError;

/// Plain text between tool calls.
///
/// Runs of non-trigger characters go straight into the TEXT segment. A
/// trigger character hands over to tag initialization without closing the
/// TEXT segment, since the opener may turn out to be ordinary text.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextState;

impl TextState {
    pub fn run(&mut self, ctx: &mut ParserContext) -> Result<Step, StreamError> {
        let remaining = ctx.scanner.remaining();
        let trigger = remaining
            .char_indices()
            .find(|(_, c)| ctx.is_trigger(*c));

        let Some((offset, c)) = trigger else {
            let text = ctx.scanner.consume_remaining();
            ctx.emitter.append_text(&text)?;
            return Ok(Step::Stay);
        };

        let text = ctx.scanner.consume(offset);
        ctx.emitter.append_text(&text)?;
        ctx.scanner.advance();
        Ok(Step::Goto(ParserState::TagInitialization(
            TagInitializationState::new(ctx, c),
        )))
    }
}

#[cfg(test)]
mod tests {
    use crate::context::ParserContext;
    use crate::events::{SegmentEventType, SegmentType};

    #[test]
    fn plain_text_streams_immediately() {
        let mut ctx = ParserContext::with_defaults();
        let events = ctx.feed("Hello, world").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, SegmentEventType::Start);
        assert_eq!(events[1].delta(), Some("Hello, world"));
        assert_eq!(ctx.state_name(), "text");
    }

    #[test]
    fn trigger_keeps_text_segment_open() {
        let mut ctx = ParserContext::with_defaults();
        let events = ctx.feed("a < b").unwrap();
        // "a " is emitted; "<" is being sniffed, then rejected at " "
        let text: String = events.iter().filter_map(|e| e.delta()).collect();
        assert_eq!(text, "a < b");
        assert!(events.iter().all(|e| e.segment_type == SegmentType::Text));
        assert!(events.iter().all(|e| e.event_type != SegmentEventType::End));
    }
}
