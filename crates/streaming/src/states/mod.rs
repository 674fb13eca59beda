//! The parsing state machine.
//!
//! Exactly one state is active per parser. A state consumes what it can
//! from the scanner on each [`ParserState::run`] and either stays (it needs
//! more input) or names the state that takes over.

mod custom_tag;
mod delimited;
mod json_tool;
mod sentinel;
mod tag_init;
mod text;
mod xml_tool;

pub use custom_tag::CustomTagHooks;
pub use delimited::{DelimitedContentState, DelimitedHooks};
pub use json_tool::JsonToolParsingState;
pub use sentinel::SentinelHooks;
pub use tag_init::TagInitializationState;
pub use text::TextState;
pub use xml_tool::XmlToolHooks;

use crate::context::ParserContext;
use crate::detection::{OpenerKind, SENTINEL_CLOSER, XML_TOOL_CLOSER};
use agentflux_core::StreamError;

/// What the driver does after a state has run.
#[derive(Debug)]
pub enum Step {
    /// Wait for more input.
    Stay,
    /// Hand over to another state and keep going.
    Goto(ParserState),
}

#[derive(Debug)]
pub enum ParserState {
    Text(TextState),
    TagInitialization(TagInitializationState),
    XmlTool(DelimitedContentState<XmlToolHooks>),
    CustomTag(DelimitedContentState<CustomTagHooks>),
    Sentinel(DelimitedContentState<SentinelHooks>),
    JsonTool(JsonToolParsingState),
}

impl Default for ParserState {
    fn default() -> Self {
        Self::Text(TextState)
    }
}

impl ParserState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::TagInitialization(_) => "tag_initialization",
            Self::XmlTool(_) => "xml_tool",
            Self::CustomTag(_) => "custom_tag",
            Self::Sentinel(_) => "sentinel",
            Self::JsonTool(_) => "json_tool",
        }
    }

    pub fn run(&mut self, ctx: &mut ParserContext) -> Result<Step, StreamError> {
        match self {
            Self::Text(s) => s.run(ctx),
            Self::TagInitialization(s) => s.run(ctx),
            Self::XmlTool(s) => s.run(ctx),
            Self::CustomTag(s) => s.run(ctx),
            Self::Sentinel(s) => s.run(ctx),
            Self::JsonTool(s) => s.run(ctx),
        }
    }

    /// Flush whatever this state holds at end of stream.
    pub fn finalize(&mut self, ctx: &mut ParserContext) -> Result<(), StreamError> {
        match self {
            Self::Text(_) => Ok(()),
            Self::TagInitialization(s) => s.finalize(ctx),
            Self::XmlTool(s) => s.finalize(ctx),
            Self::CustomTag(s) => s.finalize(ctx),
            Self::Sentinel(s) => s.finalize(ctx),
            Self::JsonTool(s) => s.finalize(ctx),
        }
    }

    /// The content state for a matched opener.
    pub(crate) fn for_opener(kind: OpenerKind, opening: String) -> Self {
        match kind {
            OpenerKind::XmlTool => Self::XmlTool(DelimitedContentState::new(
                opening,
                XML_TOOL_CLOSER,
                XmlToolHooks::default(),
            )),
            OpenerKind::CustomTag(spec) => {
                let closer = spec.closing_tag();
                Self::CustomTag(DelimitedContentState::new(opening, &closer, CustomTagHooks::new(spec)))
            }
            OpenerKind::Sentinel => {
                Self::Sentinel(DelimitedContentState::new(opening, SENTINEL_CLOSER, SentinelHooks))
            }
            OpenerKind::JsonTool => Self::JsonTool(JsonToolParsingState::new(opening)),
        }
    }
}
