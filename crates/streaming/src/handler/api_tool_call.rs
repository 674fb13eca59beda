use super::StreamingResponseHandler;
use crate::emitter::SegmentEmitter;
use crate::events::{Metadata, SegmentEvent, SegmentType};
use crate::json_extractor::JsonStringFieldExtractor;
use crate::syntax::ToolStateRegistry;
use agentflux_core::{ResponseChunk, StreamError, ToolCallDelta, ToolInvocation};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// The argument decoded incrementally for each refined segment type.
fn streamed_field(segment_type: SegmentType) -> Option<&'static str> {
    match segment_type {
        SegmentType::WriteFile => Some("content"),
        SegmentType::RunBash => Some("command"),
        SegmentType::PatchFile => Some("patch"),
        SegmentType::Text | SegmentType::ToolCall => None,
    }
}

#[derive(Debug)]
struct ActiveCall {
    index: usize,
    call_id: String,
    name: Option<String>,
    segment_id: String,
    arguments: String,
    extractor: Option<(&'static str, JsonStringFieldExtractor)>,
}

/// Native tool calls delivered as structured deltas by the provider API.
///
/// Text goes to TEXT segments. Each tool call index becomes one TOOL_CALL
/// (or refined) segment whose CONTENT is the raw argument JSON; a new index
/// ends the previous call.
#[derive(Debug)]
pub struct ApiToolCallStreamingResponseHandler {
    emitter: SegmentEmitter,
    tool_states: Arc<ToolStateRegistry>,
    active: Option<ActiveCall>,
    closed: HashSet<usize>,
    events: Vec<SegmentEvent>,
    invocations: Vec<ToolInvocation>,
    warnings: Vec<String>,
    finalized: bool,
}

impl ApiToolCallStreamingResponseHandler {
    pub fn new(segment_id_prefix: impl Into<String>, tool_states: Arc<ToolStateRegistry>) -> Self {
        Self {
            emitter: SegmentEmitter::new(segment_id_prefix),
            tool_states,
            active: None,
            closed: HashSet::new(),
            events: Vec::new(),
            invocations: Vec::new(),
            warnings: Vec::new(),
            finalized: false,
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }

    fn record(&mut self) -> Vec<SegmentEvent> {
        let events = self.emitter.take_events();
        self.events.extend(events.iter().cloned());
        events
    }

    fn on_delta(&mut self, delta: ToolCallDelta) -> Result<(), StreamError> {
        if self.closed.contains(&delta.index) {
            self.warn(format!("Tool call {} already closed, ignoring late delta", delta.index));
            return Ok(());
        }
        if self.active.as_ref().is_some_and(|a| a.index != delta.index) {
            self.finish_call()?;
        }
        if self.active.is_none() {
            self.start_call(&delta)?;
        }
        let Some(call) = self.active.as_mut() else {
            return Ok(());
        };

        if call.name.is_none() {
            call.name = delta.name.filter(|n| !n.is_empty());
        }
        let Some(fragment) = delta.arguments_delta.filter(|a| !a.is_empty()) else {
            return Ok(());
        };
        call.arguments.push_str(&fragment);

        let field_meta = call.extractor.as_mut().and_then(|(field, extractor)| {
            let decoded = extractor.feed(&fragment).deltas.remove(*field)?;
            let mut deltas = Metadata::new();
            deltas.insert((*field).into(), decoded.into());
            let mut meta = Metadata::new();
            meta.insert("field_deltas".into(), Value::Object(deltas));
            Some(meta)
        });
        self.emitter.emit_content_with(&fragment, field_meta)
    }

    fn start_call(&mut self, delta: &ToolCallDelta) -> Result<(), StreamError> {
        let name = delta.name.clone().filter(|n| !n.is_empty());
        let call_id = delta
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
        let segment_type = name
            .as_deref()
            .map_or(SegmentType::ToolCall, |n| self.tool_states.segment_type_for(n));

        let mut metadata = Metadata::new();
        if let Some(name) = &name {
            metadata.insert("tool_name".into(), name.clone().into());
        }
        metadata.insert("call_id".into(), call_id.clone().into());
        let segment_id = self.emitter.start_segment(segment_type, metadata)?;
        debug!(segment_id = %segment_id, call_id = %call_id, "Native tool call started");

        self.active = Some(ActiveCall {
            index: delta.index,
            call_id,
            name,
            segment_id,
            arguments: String::new(),
            extractor: streamed_field(segment_type)
                .map(|field| (field, JsonStringFieldExtractor::new([field], Vec::<String>::new()))),
        });
        Ok(())
    }

    fn finish_call(&mut self) -> Result<(), StreamError> {
        let Some(call) = self.active.take() else {
            return Ok(());
        };
        self.closed.insert(call.index);

        let arguments = if call.arguments.trim().is_empty() {
            Metadata::new()
        } else {
            match serde_json::from_str::<Value>(&call.arguments) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    self.warn(format!(
                        "{}: tool call arguments are not a JSON object, using {{}}",
                        call.segment_id
                    ));
                    Metadata::new()
                }
            }
        };

        let mut metadata = Metadata::new();
        metadata.insert("arguments".into(), Value::Object(arguments.clone()));
        metadata.insert("call_id".into(), call.call_id.clone().into());
        if let Some(name) = &call.name {
            metadata.insert("tool_name".into(), name.clone().into());
        }
        self.emitter.end_segment(Some(metadata))?;

        match call.name {
            Some(name) => {
                debug!(segment_id = %call.segment_id, tool_name = %name, "Native tool call closed");
                self.invocations
                    .push(ToolInvocation::new(call.segment_id, name, arguments));
            }
            None => self.warn(format!("{}: tool call has no name, dropping", call.segment_id)),
        }
        Ok(())
    }
}

impl StreamingResponseHandler for ApiToolCallStreamingResponseHandler {
    fn name(&self) -> &'static str {
        "api_tool_call"
    }

    fn feed(&mut self, chunk: ResponseChunk) -> Result<Vec<SegmentEvent>, StreamError> {
        if self.finalized {
            return Err(StreamError::Finalized);
        }
        if let Some(text) = chunk.content.as_deref().filter(|t| !t.is_empty()) {
            self.finish_call()?;
            self.emitter.append_text(text)?;
        }
        for delta in chunk.tool_calls {
            self.on_delta(delta)?;
        }
        Ok(self.record())
    }

    fn finalize(&mut self) -> Result<Vec<SegmentEvent>, StreamError> {
        if self.finalized {
            return Ok(Vec::new());
        }
        self.finalized = true;
        self.finish_call()?;
        self.emitter.end_text_segment()?;
        Ok(self.record())
    }

    fn all_events(&self) -> &[SegmentEvent] {
        &self.events
    }

    fn all_invocations(&self) -> &[ToolInvocation] {
        &self.invocations
    }

    fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn reset(&mut self) {
        self.emitter.reset();
        self.active = None;
        self.closed.clear();
        self.events.clear();
        self.invocations.clear();
        self.warnings.clear();
        self.finalized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SegmentEventType;
    use serde_json::json;

    fn delta(index: usize, id: Option<&str>, name: Option<&str>, args: &str) -> ToolCallDelta {
        ToolCallDelta {
            index,
            id: id.map(Into::into),
            name: name.map(Into::into),
            arguments_delta: Some(args.into()),
        }
    }

    fn handler() -> ApiToolCallStreamingResponseHandler {
        ApiToolCallStreamingResponseHandler::new("", Arc::new(ToolStateRegistry::with_file_tools()))
    }

    #[test]
    fn text_then_two_calls() {
        let mut h = handler();
        h.feed_text("Checking.").unwrap();
        h.feed(ResponseChunk::tool_calls(vec![delta(0, Some("call_a"), Some("weather"), "{\"ci")]))
            .unwrap();
        h.feed(ResponseChunk::tool_calls(vec![delta(0, None, None, "ty\":\"NYC\"}")]))
            .unwrap();
        h.feed(ResponseChunk::tool_calls(vec![delta(1, Some("call_b"), Some("time"), "{}")]))
            .unwrap();
        h.finalize().unwrap();

        let calls = h.all_invocations();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "weather");
        assert_eq!(calls[0].id, "seg_2");
        assert_eq!(Value::Object(calls[0].arguments.clone()), json!({"city": "NYC"}));
        assert_eq!(calls[1].name, "time");

        let starts: Vec<_> = h
            .all_events()
            .iter()
            .filter(|e| e.event_type == SegmentEventType::Start)
            .map(|e| e.segment_type)
            .collect();
        assert_eq!(starts, vec![SegmentType::Text, SegmentType::ToolCall, SegmentType::ToolCall]);

        let end = h
            .all_events()
            .iter()
            .find(|e| e.event_type == SegmentEventType::End && e.segment_id == "seg_2")
            .unwrap();
        assert_eq!(end.metadata_str("call_id"), Some("call_a"));
        assert_eq!(end.metadata().unwrap()["arguments"], json!({"city": "NYC"}));
    }

    #[test]
    fn streamed_field_deltas_for_file_tools() {
        let mut h = handler();
        let mut events = Vec::new();
        for (i, part) in [r#"{"path":"a.txt","con"#, r#"tent":"line1\n"#, r#"line2"}"#]
            .into_iter()
            .enumerate()
        {
            let name = (i == 0).then_some("write_file");
            events.extend(h.feed(ResponseChunk::tool_calls(vec![delta(0, Some("c1"), name, part)])).unwrap());
        }
        events.extend(h.finalize().unwrap());

        assert_eq!(events[0].segment_type, SegmentType::WriteFile);
        let streamed: String = events
            .iter()
            .filter_map(|e| e.metadata()?.get("field_deltas")?.get("content")?.as_str().map(String::from))
            .collect();
        assert_eq!(streamed, "line1\nline2");
        assert_eq!(h.all_invocations()[0].arg_str("content"), Some("line1\nline2"));
    }

    #[test]
    fn invalid_arguments_become_empty_with_warning() {
        let mut h = handler();
        h.feed(ResponseChunk::tool_calls(vec![delta(0, None, Some("x"), "{broken")]))
            .unwrap();
        h.finalize().unwrap();
        assert!(h.all_invocations()[0].arguments.is_empty());
        assert_eq!(h.warnings().len(), 1);

        let start = &h.all_events()[0];
        assert!(start.metadata_str("call_id").unwrap().starts_with("call_"));
    }

    #[test]
    fn late_delta_for_closed_call_is_ignored() {
        let mut h = handler();
        h.feed(ResponseChunk::tool_calls(vec![delta(0, None, Some("a"), "{}")]))
            .unwrap();
        h.feed(ResponseChunk::tool_calls(vec![delta(1, None, Some("b"), "{}")]))
            .unwrap();
        h.feed(ResponseChunk::tool_calls(vec![delta(0, None, None, "x")]))
            .unwrap();
        h.finalize().unwrap();
        assert_eq!(h.all_invocations().len(), 2);
        assert_eq!(h.warnings().len(), 1);

        h.reset();
        assert!(h.all_invocations().is_empty());
        assert!(h.warnings().is_empty());
    }
}
