//! One parser instance per LLM response.

use crate::config::ParserConfig;
use crate::detection::DetectionStrategy;
use crate::emitter::SegmentEmitter;
use crate::events::SegmentEvent;
use crate::scanner::Scanner;
use crate::states::{ParserState, Step};
use crate::syntax::ParserRegistries;
use agentflux_core::StreamError;
use tracing::debug;

/// Owns the scanner, the emitter and the active state, and drives the state
/// machine over each appended chunk.
///
/// Feeding is synchronous and never blocks. Events returned from one call
/// are exactly the events recorded during that call.
#[derive(Debug)]
pub struct ParserContext {
    pub(crate) scanner: Scanner,
    pub(crate) emitter: SegmentEmitter,
    pub(crate) config: ParserConfig,
    pub(crate) registries: ParserRegistries,
    pub(crate) strategies: Vec<DetectionStrategy>,
    state: ParserState,
    finalized: bool,
}

impl ParserContext {
    pub fn new(config: ParserConfig, registries: ParserRegistries) -> Self {
        let strategies = DetectionStrategy::build_all(&config, &registries.syntax);
        let prefix = config.segment_id_prefix.clone().unwrap_or_default();
        Self {
            scanner: Scanner::new(),
            emitter: SegmentEmitter::new(prefix),
            config,
            registries,
            strategies,
            state: ParserState::default(),
            finalized: false,
        }
    }

    /// Default config with the built-in custom tags and refinements.
    pub fn with_defaults() -> Self {
        Self::new(ParserConfig::default(), ParserRegistries::default())
    }

    /// Append a chunk and return the events it produced.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<SegmentEvent>, StreamError> {
        if self.finalized {
            return Err(StreamError::Finalized);
        }
        self.scanner.append(chunk);
        self.drive()?;

        let discarded = self.scanner.compact(self.config.compact_threshold);
        if discarded > 0 {
            debug!(discarded, "Compacted scanner buffer");
        }
        Ok(self.emitter.take_events())
    }

    /// Flush everything at end of stream. Later calls return no events.
    pub fn finalize(&mut self) -> Result<Vec<SegmentEvent>, StreamError> {
        if self.finalized {
            return Ok(Vec::new());
        }
        self.finalized = true;

        let mut state = std::mem::take(&mut self.state);
        let flushed = state.finalize(self);
        self.state = state;
        flushed?;
        self.emitter.end_text_segment()?;
        debug!(state = self.state.name(), "Parser finalized");
        Ok(self.emitter.take_events())
    }

    /// Back to a fresh, unfinalized parser with the same configuration.
    pub fn reset(&mut self) {
        self.scanner = Scanner::new();
        self.emitter.reset();
        self.state = ParserState::default();
        self.finalized = false;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Name of the active state, for diagnostics.
    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub(crate) fn is_trigger(&self, c: char) -> bool {
        self.strategies.iter().any(|s| s.triggers_on(c))
    }

    fn drive(&mut self) -> Result<(), StreamError> {
        let mut state = std::mem::take(&mut self.state);
        let result = loop {
            match state.run(self) {
                Ok(Step::Stay) => break Ok(()),
                Ok(Step::Goto(next)) => {
                    debug!(from = state.name(), to = next.name(), "State transition");
                    state = next;
                }
                Err(e) => break Err(e),
            }
        };
        self.state = state;
        result
    }
}
