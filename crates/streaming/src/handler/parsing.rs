use super::StreamingResponseHandler;
use crate::adapter::ToolInvocationAdapter;
use crate::config::ParserConfig;
use crate::context::ParserContext;
use crate::events::SegmentEvent;
use crate::syntax::ParserRegistries;
use agentflux_core::{ResponseChunk, StreamError, ToolInvocation};
use tracing::warn;

/// Extracts tool calls embedded in the text stream (XML, JSON or sentinel).
#[derive(Debug)]
pub struct ParsingStreamingResponseHandler {
    parser: ParserContext,
    adapter: ToolInvocationAdapter,
    events: Vec<SegmentEvent>,
    invocations: Vec<ToolInvocation>,
}

impl ParsingStreamingResponseHandler {
    pub fn new(config: ParserConfig, registries: ParserRegistries) -> Self {
        let adapter = ToolInvocationAdapter::new(registries.syntax.clone(), config.json_parser());
        Self {
            parser: ParserContext::new(config, registries),
            adapter,
            events: Vec::new(),
            invocations: Vec::new(),
        }
    }

    fn record(&mut self, events: Vec<SegmentEvent>) -> Vec<SegmentEvent> {
        let invocations = self.adapter.process_events(&events);
        self.invocations.extend(invocations);
        self.events.extend(events.iter().cloned());
        events
    }
}

impl StreamingResponseHandler for ParsingStreamingResponseHandler {
    fn name(&self) -> &'static str {
        "parsing"
    }

    fn feed(&mut self, chunk: ResponseChunk) -> Result<Vec<SegmentEvent>, StreamError> {
        if !chunk.tool_calls.is_empty() {
            warn!(count = chunk.tool_calls.len(), "Ignoring native tool call deltas in text parsing mode");
        }
        let text = chunk.content.unwrap_or_default();
        let events = self.parser.feed(&text)?;
        Ok(self.record(events))
    }

    fn finalize(&mut self) -> Result<Vec<SegmentEvent>, StreamError> {
        let events = self.parser.finalize()?;
        Ok(self.record(events))
    }

    fn all_events(&self) -> &[SegmentEvent] {
        &self.events
    }

    fn all_invocations(&self) -> &[ToolInvocation] {
        &self.invocations
    }

    fn warnings(&self) -> &[String] {
        self.adapter.warnings()
    }

    fn reset(&mut self) {
        self.parser.reset();
        self.adapter.reset();
        self.events.clear();
        self.invocations.clear();
    }
}
