//! Turns completed tool segments into [`ToolInvocation`]s.

use crate::detection::{SENTINEL_CLOSER, SENTINEL_OPENER, XML_TOOL_CLOSER};
use crate::events::{Metadata, SegmentEvent, SegmentEventType, SegmentType};
use crate::json_parsers::{JsonToolParsingStrategy, is_call_shaped};
use crate::syntax::{ToolSyntaxRegistry, ToolSyntaxSpec};
use crate::xml_args::{parse_xml_arguments, tag_end};
use agentflux_core::ToolInvocation;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
struct PendingSegment {
    name: Option<String>,
    spec: Option<Arc<ToolSyntaxSpec>>,
    metadata: Metadata,
    content: String,
}

/// Watches the event stream and emits one invocation per completed tool
/// segment.
///
/// Recoverable problems (a custom tag missing required arguments, a call
/// with no resolvable name, a truncated call) drop only the affected
/// invocation and are recorded in [`warnings`](Self::warnings).
pub struct ToolInvocationAdapter {
    syntax: Arc<ToolSyntaxRegistry>,
    json_parser: Arc<dyn JsonToolParsingStrategy>,
    pending: HashMap<String, PendingSegment>,
    warnings: Vec<String>,
}

impl ToolInvocationAdapter {
    pub fn new(syntax: Arc<ToolSyntaxRegistry>, json_parser: Arc<dyn JsonToolParsingStrategy>) -> Self {
        Self {
            syntax,
            json_parser,
            pending: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn process_event(&mut self, event: &SegmentEvent) -> Option<ToolInvocation> {
        if event.segment_type == SegmentType::Text {
            return None;
        }
        match event.event_type {
            SegmentEventType::Start => {
                self.on_start(event);
                None
            }
            SegmentEventType::Content => {
                if let Some(pending) = self.pending.get_mut(&event.segment_id)
                    && let Some(delta) = event.delta()
                {
                    pending.content.push_str(delta);
                }
                None
            }
            SegmentEventType::End => self.on_end(event),
        }
    }

    pub fn process_events<'a>(&mut self, events: impl IntoIterator<Item = &'a SegmentEvent>) -> Vec<ToolInvocation> {
        events
            .into_iter()
            .filter_map(|e| self.process_event(e))
            .collect()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.warnings.clear();
    }

    fn warn(&mut self, segment_id: &str, message: String) {
        warn!(segment_id = %segment_id, "{message}");
        self.warnings.push(format!("{segment_id}: {message}"));
    }

    fn on_start(&mut self, event: &SegmentEvent) {
        let metadata = event.metadata().cloned().unwrap_or_default();
        let spec = metadata
            .get("tag")
            .and_then(Value::as_str)
            .and_then(|tag| self.syntax.get(tag));
        let name = metadata
            .get("tool_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| spec.as_ref().map(|s| s.tool_name.clone()));

        self.pending.insert(
            event.segment_id.clone(),
            PendingSegment {
                name,
                spec,
                metadata,
                content: String::new(),
            },
        );
    }

    fn on_end(&mut self, event: &SegmentEvent) -> Option<ToolInvocation> {
        let mut pending = self.pending.remove(&event.segment_id)?;
        if let Some(end) = event.metadata() {
            pending
                .metadata
                .extend(end.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let segment_id = event.segment_id.as_str();

        if pending.metadata.get("incomplete").and_then(Value::as_bool) == Some(true) {
            self.warn(segment_id, "Tool call truncated by end of stream, dropping".into());
            return None;
        }

        if let Some(spec) = &pending.spec {
            let body = strip_custom_tag(&pending.metadata, &pending.content);
            let Some(arguments) = spec.build_arguments(&pending.metadata, body) else {
                self.warn(
                    segment_id,
                    format!("<{}> is missing required arguments, dropping", spec.tag_name),
                );
                return None;
            };
            debug!(segment_id = %segment_id, tool_name = %spec.tool_name, "Built invocation from custom tag");
            return Some(ToolInvocation::new(segment_id, spec.tool_name.clone(), arguments));
        }

        let (parsed_name, arguments) = match pending.metadata.get("arguments") {
            Some(Value::Object(arguments)) => (None, arguments.clone()),
            _ => self.parse_body(segment_id, pending.name.is_some(), &pending.metadata, &pending.content),
        };

        let end_name = pending
            .metadata
            .get("tool_name")
            .and_then(Value::as_str)
            .map(str::to_string);
        let name = pending.name.or(parsed_name).or(end_name);
        let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
            self.warn(segment_id, "Tool call has no resolvable name, dropping".into());
            return None;
        };
        debug!(segment_id = %segment_id, tool_name = %name, "Built invocation");
        Some(ToolInvocation::new(segment_id, name, arguments))
    }

    /// Name (if the body carries one) and arguments of a generic tool call.
    ///
    /// A JSON object inside an already named call is taken as the arguments
    /// unless it is itself shaped like a call.
    fn parse_body(
        &mut self,
        segment_id: &str,
        named: bool,
        metadata: &Metadata,
        content: &str,
    ) -> (Option<String>, Metadata) {
        let syntax = metadata.get("syntax").and_then(Value::as_str).unwrap_or("json");
        let body = match syntax {
            "xml" => strip_xml_wrapper(content),
            "sentinel" => strip_sentinels(content),
            _ => content.trim(),
        };

        if !(body.starts_with('{') || body.starts_with('[')) {
            return (None, parse_xml_arguments(body));
        }

        let value = serde_json::from_str::<Value>(body).ok();
        if named && let Some(Value::Object(arguments)) = value.as_ref().filter(|v| !is_call_shaped(v)) {
            return (None, arguments.clone());
        }

        let mut calls = self.json_parser.parse(body).into_iter();
        if let Some(call) = calls.next() {
            let extra = calls.count();
            if extra > 0 {
                self.warn(
                    segment_id,
                    format!("{extra} additional tool call(s) in one segment dropped"),
                );
            }
            return (Some(call.name), call.arguments);
        }
        if let Some(Value::Object(arguments)) = value {
            return (None, arguments);
        }
        debug!(parser = self.json_parser.name(), "Unparseable JSON tool body");
        (None, Metadata::new())
    }
}

impl std::fmt::Debug for ToolInvocationAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInvocationAdapter")
            .field("json_parser", &self.json_parser.name())
            .field("pending", &self.pending.len())
            .field("warnings", &self.warnings.len())
            .finish()
    }
}

/// Body of `<tool ...>body</tool>`, trimmed.
fn strip_xml_wrapper(content: &str) -> &str {
    let inner = match tag_end(content) {
        Some(end) => &content[end..],
        None => content,
    };
    let trimmed = inner.trim_end();
    let closer_len = XML_TOOL_CLOSER.len();
    let inner = if trimmed.len() >= closer_len
        && trimmed.is_char_boundary(trimmed.len() - closer_len)
        && trimmed[trimmed.len() - closer_len..].eq_ignore_ascii_case(XML_TOOL_CLOSER)
    {
        &trimmed[..trimmed.len() - closer_len]
    } else {
        trimmed
    };
    inner.trim()
}

/// Body of a custom tag with the recorded `opening_tag`/`closing_tag` removed.
fn strip_custom_tag<'a>(metadata: &Metadata, content: &'a str) -> &'a str {
    let mut body = content;
    if let Some(opening) = metadata.get("opening_tag").and_then(Value::as_str) {
        body = body.strip_prefix(opening).unwrap_or(body);
    }
    if let Some(closing) = metadata.get("closing_tag").and_then(Value::as_str) {
        body = body.strip_suffix(closing).unwrap_or(body);
    }
    body
}

fn strip_sentinels(content: &str) -> &str {
    let mut body = content.trim();
    if body.len() >= SENTINEL_OPENER.len()
        && body.is_char_boundary(SENTINEL_OPENER.len())
        && body[..SENTINEL_OPENER.len()].eq_ignore_ascii_case(SENTINEL_OPENER)
    {
        body = &body[SENTINEL_OPENER.len()..];
    }
    let closer_len = SENTINEL_CLOSER.len();
    if body.len() >= closer_len
        && body.is_char_boundary(body.len() - closer_len)
        && body[body.len() - closer_len..].eq_ignore_ascii_case(SENTINEL_CLOSER)
    {
        body = &body[..body.len() - closer_len];
    }
    body.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ParserContext;
    use crate::json_parsers::{DefaultJsonToolParser, OpenAiJsonToolParser};
    use serde_json::json;

    fn adapter() -> ToolInvocationAdapter {
        ToolInvocationAdapter::new(
            Arc::new(ToolSyntaxRegistry::with_builtins()),
            Arc::new(DefaultJsonToolParser),
        )
    }

    fn invocations(input: &str) -> (Vec<ToolInvocation>, Vec<String>) {
        let mut ctx = ParserContext::with_defaults();
        let mut events = ctx.feed(input).unwrap();
        events.extend(ctx.finalize().unwrap());
        let mut adapter = adapter();
        let calls = adapter.process_events(&events);
        (calls, adapter.warnings().to_vec())
    }

    #[test]
    fn xml_arguments() {
        let (calls, warnings) = invocations(
            "Hello <tool name=\"weather\"><arguments><arg name=\"city\">NYC</arg></arguments></tool>after",
        );
        assert!(warnings.is_empty());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "seg_2");
        assert_eq!(calls[0].name, "weather");
        assert_eq!(Value::Object(calls[0].arguments.clone()), json!({"city": "NYC"}));
    }

    #[test]
    fn json_body_inside_tool_tag() {
        let (calls, _) = invocations("<tool name=\"search\">{\"query\": \"rust\"}</tool>");
        assert_eq!(calls[0].name, "search");
        assert_eq!(Value::Object(calls[0].arguments.clone()), json!({"query": "rust"}));
    }

    #[test]
    fn named_tool_takes_json_object_as_arguments() {
        let (calls, warnings) = invocations("<tool name=\"create_user\">{\"name\": \"Bob\", \"age\": 3}</tool>");
        assert!(warnings.is_empty());
        assert_eq!(calls[0].name, "create_user");
        assert_eq!(Value::Object(calls[0].arguments.clone()), json!({"name": "Bob", "age": 3}));
    }

    #[test]
    fn named_tool_still_unwraps_call_envelope() {
        let (calls, _) =
            invocations("<tool name=\"search\">{\"name\": \"search\", \"arguments\": {\"q\": \"rust\"}}</tool>");
        assert_eq!(calls[0].name, "search");
        assert_eq!(Value::Object(calls[0].arguments.clone()), json!({"q": "rust"}));
    }

    #[test]
    fn extra_calls_in_one_segment_are_reported() {
        let mut adapter = adapter();
        let mut start = Metadata::new();
        start.insert("syntax".into(), "json".into());
        let raw = r#"[{"name": "a", "arguments": {"x": 1}}, {"name": "b", "arguments": {}}]"#;
        let events = [
            SegmentEvent::start("seg_3", SegmentType::ToolCall, Some(start)),
            SegmentEvent::content("seg_3", SegmentType::ToolCall, raw, None),
            SegmentEvent::end("seg_3", SegmentType::ToolCall, None),
        ];
        let calls = adapter.process_events(&events);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "a");
        assert_eq!(calls[0].arguments["x"], 1);
        assert_eq!(adapter.warnings().len(), 1);
        assert!(adapter.warnings()[0].starts_with("seg_3: 1 additional tool call"));
    }

    #[test]
    fn unparseable_body_gives_empty_arguments() {
        let (calls, _) = invocations("<tool name=\"ping\">{oops</tool>");
        assert_eq!(calls[0].name, "ping");
        assert!(calls[0].arguments.is_empty());
    }

    #[test]
    fn custom_tag_invocation() {
        let (calls, _) = invocations("<write_file path=\"a.txt\">\nhello\n</write_file>");
        assert_eq!(calls[0].name, "write_file");
        assert_eq!(
            Value::Object(calls[0].arguments.clone()),
            json!({"path": "a.txt", "content": "hello\n"})
        );
    }

    #[test]
    fn custom_tag_body_excludes_delimiters() {
        let (calls, _) = invocations("<run_bash>ls -la</RUN_BASH>");
        assert_eq!(calls[0].name, "run_bash");
        assert_eq!(calls[0].arguments["command"], "ls -la");
        assert_eq!(strip_custom_tag(&Metadata::new(), "plain"), "plain");
    }

    #[test]
    fn missing_required_argument_is_dropped_with_warning() {
        let (calls, warnings) = invocations("<write_file></write_file>");
        assert!(calls.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("write_file"));
    }

    #[test]
    fn truncated_call_is_dropped() {
        let (calls, warnings) = invocations("<run_bash>rm -rf /tm");
        assert!(calls.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn explicit_arguments_metadata_wins() {
        let mut adapter = adapter();
        let mut start = Metadata::new();
        start.insert("tool_name".into(), "lookup".into());
        let mut end = Metadata::new();
        end.insert("arguments".into(), json!({"id": 3}));
        let events = [
            SegmentEvent::start("seg_1", SegmentType::ToolCall, Some(start)),
            SegmentEvent::content("seg_1", SegmentType::ToolCall, "{\"id\":", None),
            SegmentEvent::content("seg_1", SegmentType::ToolCall, "3}", None),
            SegmentEvent::end("seg_1", SegmentType::ToolCall, Some(end)),
        ];
        let calls = adapter.process_events(&events);
        assert_eq!(calls[0].arguments["id"], 3);
    }

    #[test]
    fn json_segment_uses_configured_strategy() {
        let mut adapter = ToolInvocationAdapter::new(
            Arc::new(ToolSyntaxRegistry::new()),
            Arc::new(OpenAiJsonToolParser),
        );
        let mut start = Metadata::new();
        start.insert("syntax".into(), "json".into());
        let raw = r#"{"tool_calls":[{"function":{"name":"f","arguments":"{\"a\":1}"}}]}"#;
        let events = [
            SegmentEvent::start("seg_4", SegmentType::ToolCall, Some(start)),
            SegmentEvent::content("seg_4", SegmentType::ToolCall, raw, None),
            SegmentEvent::end("seg_4", SegmentType::ToolCall, None),
        ];
        let calls = adapter.process_events(&events);
        assert_eq!(calls[0].name, "f");
        assert_eq!(calls[0].arguments["a"], 1);
    }

    #[test]
    fn nameless_json_is_dropped() {
        let mut adapter = adapter();
        let events = [
            SegmentEvent::start("seg_1", SegmentType::ToolCall, None),
            SegmentEvent::content("seg_1", SegmentType::ToolCall, "{\"x\": 1}", None),
            SegmentEvent::end("seg_1", SegmentType::ToolCall, None),
        ];
        assert!(adapter.process_events(&events).is_empty());
        assert_eq!(adapter.warnings().len(), 1);
        adapter.reset();
        assert!(adapter.warnings().is_empty());
    }

    #[test]
    fn wrapper_stripping() {
        assert_eq!(strip_xml_wrapper("<tool name=\"a\">\n body \n</TOOL>"), "body");
        assert_eq!(strip_xml_wrapper("<tool name=\"a\"/>"), "");
        assert_eq!(strip_sentinels("[tool_call] {} [/TOOL_CALL]"), "{}");
    }
}
