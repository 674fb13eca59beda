//! Response handlers: the surface the agent loop talks to.
//!
//! A handler consumes one LLM response, chunk by chunk, and exposes the
//! resulting segment events and tool invocations. The factory picks the
//! handler for a provider and configuration.

pub mod api_tool_call;
pub mod factory;
pub mod parsing;
pub mod passthrough;

pub use api_tool_call::ApiToolCallStreamingResponseHandler;
pub use factory::StreamingHandlerFactory;
pub use parsing::ParsingStreamingResponseHandler;
pub use passthrough::PassThroughStreamingResponseHandler;

use crate::events::SegmentEvent;
use agentflux_core::{ResponseChunk, StreamError, ToolInvocation};

/// Consumes one LLM response.
///
/// Implementations are single-threaded: one handler per response, fed from
/// the task reading the provider stream.
pub trait StreamingResponseHandler: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Process one provider chunk and return the events it produced.
    fn feed(&mut self, chunk: ResponseChunk) -> Result<Vec<SegmentEvent>, StreamError>;

    /// Convenience for text-only chunks.
    fn feed_text(&mut self, text: &str) -> Result<Vec<SegmentEvent>, StreamError> {
        self.feed(ResponseChunk::text(text))
    }

    /// Flush at end of stream. A second call returns no events.
    fn finalize(&mut self) -> Result<Vec<SegmentEvent>, StreamError>;

    /// Every event produced so far, in order.
    fn all_events(&self) -> &[SegmentEvent];

    /// Every invocation reconstructed so far, in order.
    fn all_invocations(&self) -> &[ToolInvocation];

    /// Recoverable problems seen so far (dropped invocations and the like).
    fn warnings(&self) -> &[String] {
        &[]
    }

    /// Forget everything and accept a new response.
    fn reset(&mut self);
}
