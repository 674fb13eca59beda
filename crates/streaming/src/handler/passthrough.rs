use super::StreamingResponseHandler;
use crate::emitter::SegmentEmitter;
use crate::events::SegmentEvent;
use agentflux_core::{ResponseChunk, StreamError, ToolInvocation};
use tracing::warn;

/// Streams text as-is when no tools are configured.
#[derive(Debug, Default)]
pub struct PassThroughStreamingResponseHandler {
    emitter: SegmentEmitter,
    events: Vec<SegmentEvent>,
    finalized: bool,
}

impl PassThroughStreamingResponseHandler {
    pub fn new(segment_id_prefix: impl Into<String>) -> Self {
        Self {
            emitter: SegmentEmitter::new(segment_id_prefix),
            ..Self::default()
        }
    }

    fn record(&mut self) -> Vec<SegmentEvent> {
        let events = self.emitter.take_events();
        self.events.extend(events.iter().cloned());
        events
    }
}

impl StreamingResponseHandler for PassThroughStreamingResponseHandler {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn feed(&mut self, chunk: ResponseChunk) -> Result<Vec<SegmentEvent>, StreamError> {
        if self.finalized {
            return Err(StreamError::Finalized);
        }
        if !chunk.tool_calls.is_empty() {
            warn!(count = chunk.tool_calls.len(), "Ignoring tool call deltas in pass-through mode");
        }
        if let Some(text) = chunk.content.as_deref() {
            self.emitter.append_text(text)?;
        }
        Ok(self.record())
    }

    fn finalize(&mut self) -> Result<Vec<SegmentEvent>, StreamError> {
        if self.finalized {
            return Ok(Vec::new());
        }
        self.finalized = true;
        self.emitter.end_text_segment()?;
        Ok(self.record())
    }

    fn all_events(&self) -> &[SegmentEvent] {
        &self.events
    }

    fn all_invocations(&self) -> &[ToolInvocation] {
        &[]
    }

    fn reset(&mut self) {
        self.emitter.reset();
        self.events.clear();
        self.finalized = false;
    }
}
