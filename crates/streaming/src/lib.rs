//! Streaming tool-call extraction for agentflux.
//!
//! An LLM response arrives as arbitrarily chunked text. This crate turns it,
//! incrementally, into an ordered stream of segment events (plain text, tool
//! calls, file and shell shorthand tags) and reconstructs tool invocations
//! from the completed segments:
//!
//! 1. **Scanner** buffers appended text behind a cursor
//! 2. **Detection strategies** sniff possible openers (`<tool`, JSON
//!    signatures, `[TOOL_CALL]`, custom tags) across chunk boundaries
//! 3. **State machine** streams segment content, holding back just enough
//!    to never leak a split closing delimiter
//! 4. **Emitter** records START / CONTENT / END events
//! 5. **Adapter** builds a [`ToolInvocation`](agentflux_core::ToolInvocation)
//!    per completed tool segment
//!
//! Nothing here performs I/O. One [`ParserContext`] (or handler) per
//! response; feeding after `finalize()` is an error.

pub mod adapter;
pub mod config;
pub mod context;
pub mod detection;
pub mod emitter;
pub mod events;
pub mod handler;
pub mod json_extractor;
pub mod json_parsers;
pub mod scanner;
pub mod states;
pub mod syntax;
pub mod xml_args;

pub use adapter::ToolInvocationAdapter;
pub use agentflux_core::StreamError;
pub use config::{DEFAULT_JSON_TOOL_PATTERNS, DetectionStrategyKind, ParserConfig};
pub use context::ParserContext;
pub use detection::DetectionStrategy;
pub use emitter::SegmentEmitter;
pub use events::{Metadata, SegmentEvent, SegmentEventType, SegmentPayload, SegmentType};
pub use handler::{
    ApiToolCallStreamingResponseHandler, ParsingStreamingResponseHandler, PassThroughStreamingResponseHandler,
    StreamingHandlerFactory, StreamingResponseHandler,
};
pub use json_extractor::{ExtractorUpdate, JsonStringFieldExtractor};
pub use json_parsers::{
    DefaultJsonToolParser, GeminiJsonToolParser, JsonToolParsingStrategy, OpenAiJsonToolParser, ParsedToolCall,
};
pub use scanner::Scanner;
pub use syntax::{ParserRegistries, ToolStateRegistry, ToolSyntaxRegistry, ToolSyntaxSpec};
