//! Segment bookkeeping.
//!
//! The emitter owns the single "currently open" segment slot and records
//! state-machine actions as an ordered, drainable list of [`SegmentEvent`]s.

use crate::events::{Metadata, SegmentEvent, SegmentType};
use agentflux_core::StreamError;

#[derive(Debug)]
struct OpenSegment {
    id: String,
    segment_type: SegmentType,
    content: String,
}

/// Turns segment actions into events. At most one segment is open at a time.
#[derive(Debug, Default)]
pub struct SegmentEmitter {
    prefix: String,
    next_id: u64,
    current: Option<OpenSegment>,
    events: Vec<SegmentEvent>,
}

impl SegmentEmitter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Open a new segment and return its id.
    ///
    /// An open TEXT segment is ended implicitly first. Any other open segment
    /// means the caller lost track of its lifecycle, which is an error.
    pub fn start_segment(&mut self, segment_type: SegmentType, metadata: Metadata) -> Result<String, StreamError> {
        if let Some(open) = &self.current
            && !open.segment_type.is_text()
        {
            return Err(StreamError::SegmentAlreadyOpen {
                open_id: open.id.clone(),
                requested: segment_type.to_string(),
            });
        }
        self.end_text_segment()?;

        self.next_id += 1;
        let id = format!("{}seg_{}", self.prefix, self.next_id);
        let start_meta = (!metadata.is_empty()).then_some(metadata);
        self.events
            .push(SegmentEvent::start(id.clone(), segment_type, start_meta));
        self.current = Some(OpenSegment {
            id: id.clone(),
            segment_type,
            content: String::new(),
        });
        Ok(id)
    }

    /// Append `delta` to the open segment. Empty deltas are dropped.
    pub fn emit_content(&mut self, delta: &str) -> Result<(), StreamError> {
        self.emit_content_with(delta, None)
    }

    /// Append `delta` with per-delta metadata attached to the CONTENT event.
    pub fn emit_content_with(&mut self, delta: &str, metadata: Option<Metadata>) -> Result<(), StreamError> {
        let open = self
            .current
            .as_mut()
            .ok_or(StreamError::NoOpenSegment { operation: "content" })?;
        if delta.is_empty() {
            return Ok(());
        }
        open.content.push_str(delta);
        self.events.push(SegmentEvent::content(
            open.id.clone(),
            open.segment_type,
            delta,
            metadata,
        ));
        Ok(())
    }

    /// Close the open segment. `metadata` travels on the END event.
    pub fn end_segment(&mut self, metadata: Option<Metadata>) -> Result<String, StreamError> {
        let open = self
            .current
            .take()
            .ok_or(StreamError::NoOpenSegment { operation: "end" })?;
        let end_meta = metadata.filter(|m| !m.is_empty());
        self.events
            .push(SegmentEvent::end(open.id.clone(), open.segment_type, end_meta));
        Ok(open.id)
    }

    /// Append plain text, opening a TEXT segment if none is open.
    pub fn append_text(&mut self, text: &str) -> Result<(), StreamError> {
        if text.is_empty() {
            return Ok(());
        }
        if let Some(open) = &self.current
            && !open.segment_type.is_text()
        {
            return Err(StreamError::SegmentAlreadyOpen {
                open_id: open.id.clone(),
                requested: SegmentType::Text.to_string(),
            });
        }
        if self.current.is_none() {
            self.start_segment(SegmentType::Text, Metadata::new())?;
        }
        self.emit_content(text)
    }

    /// End the open segment only if it is a TEXT segment.
    pub fn end_text_segment(&mut self) -> Result<(), StreamError> {
        if self.current.as_ref().is_some_and(|s| s.segment_type.is_text()) {
            self.end_segment(None)?;
        }
        Ok(())
    }

    pub fn current_segment_type(&self) -> Option<SegmentType> {
        self.current.as_ref().map(|s| s.segment_type)
    }

    /// Everything emitted so far for the open segment.
    pub fn current_content(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.content.as_str())
    }

    /// Peek at recorded events without draining them.
    pub fn events(&self) -> &[SegmentEvent] {
        &self.events
    }

    /// Drain recorded events.
    pub fn take_events(&mut self) -> Vec<SegmentEvent> {
        std::mem::take(&mut self.events)
    }

    /// Back to the initial state. Segment numbering restarts.
    pub fn reset(&mut self) {
        self.next_id = 0;
        self.current = None;
        self.events.clear();
    }
}
