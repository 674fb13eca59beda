//! End-to-end integration tests for the agentflux streaming pipeline.
//!
//! These drive the public API the CLI uses: config → handler factory →
//! chunked feed → segment events and tool invocations.

use agentflux_config::AppConfig;
use agentflux_core::{LlmProvider, ResponseChunk, ToolCallDelta, ToolCallFormat};
use agentflux_streaming::{
    JsonStringFieldExtractor, ParserConfig, ParserContext, ParserRegistries, SegmentEvent, SegmentEventType,
    SegmentType, StreamError, StreamingHandlerFactory, StreamingResponseHandler,
};
use serde_json::json;

// ── Helpers ──────────────────────────────────────────────────────────────

fn parse_chunks(chunks: &[&str]) -> Vec<SegmentEvent> {
    let mut ctx = ParserContext::with_defaults();
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(ctx.feed(chunk).unwrap());
    }
    events.extend(ctx.finalize().unwrap());
    events
}

fn all_deltas(events: &[SegmentEvent]) -> String {
    events.iter().filter_map(|e| e.delta()).collect()
}

fn starts(events: &[SegmentEvent]) -> Vec<SegmentType> {
    events
        .iter()
        .filter(|e| e.event_type == SegmentEventType::Start)
        .map(|e| e.segment_type)
        .collect()
}

fn xml_handler() -> Box<dyn StreamingResponseHandler> {
    StreamingHandlerFactory::default().create(true, Some(ToolCallFormat::Xml), LlmProvider::Anthropic)
}

fn drive(handler: &mut dyn StreamingResponseHandler, chunks: &[&str]) {
    for chunk in chunks {
        handler.feed_text(chunk).unwrap();
    }
    handler.finalize().unwrap();
}

const MIXED: &str = "Intro <b>bold</b> then <tool name=\"weather\"><arguments><arg name=\"city\">NYC</arg></arguments></tool> \
and <write_file path=\"a.txt\">\nhello</write_file>[x] {\"done\": true} <run_bash>ls -la</run_bash> end ü";

// ── Chunking ─────────────────────────────────────────────────────────────

#[test]
fn e2e_no_content_is_lost() {
    let events = parse_chunks(&[MIXED]);
    assert_eq!(all_deltas(&events), MIXED);
}

#[test]
fn e2e_chunk_boundaries_do_not_matter() {
    let reference = parse_chunks(&[MIXED]);
    let chars: Vec<(usize, char)> = MIXED.char_indices().collect();
    for &(split, _) in chars.iter().skip(1) {
        let events = parse_chunks(&[&MIXED[..split], &MIXED[split..]]);
        assert_eq!(all_deltas(&events), all_deltas(&reference), "split at {split}");
        assert_eq!(starts(&events), starts(&reference), "split at {split}");
    }
}

#[test]
fn e2e_char_by_char_matches_single_chunk() {
    let reference = parse_chunks(&[MIXED]);
    let singles: Vec<String> = MIXED.chars().map(String::from).collect();
    let refs: Vec<&str> = singles.iter().map(String::as_str).collect();
    let events = parse_chunks(&refs);
    assert_eq!(all_deltas(&events), all_deltas(&reference));
    assert_eq!(starts(&events), starts(&reference));
}

#[test]
fn e2e_invocations_survive_every_split() {
    let mut reference = xml_handler();
    drive(reference.as_mut(), &[MIXED]);
    let expected = reference.all_invocations().to_vec();
    let names: Vec<&str> = expected.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["weather", "write_file", "run_bash"]);

    for (split, _) in MIXED.char_indices().skip(1) {
        let mut handler = xml_handler();
        drive(handler.as_mut(), &[&MIXED[..split], &MIXED[split..]]);
        assert_eq!(handler.all_invocations(), expected.as_slice(), "split at {split}");
        assert!(handler.warnings().is_empty(), "split at {split}: {:?}", handler.warnings());
    }
}

#[test]
fn e2e_closer_missing_only_its_bracket() {
    let mut handler = xml_handler();
    let first = handler
        .feed_text("<tool name=\"echo\">{\"text\": \"hi\"}</tool")
        .unwrap();
    let leaked = all_deltas(&first);
    assert!(!leaked.ends_with("</tool"), "{leaked:?}");
    assert!(handler.all_invocations().is_empty());

    handler.feed_text(">").unwrap();
    handler.finalize().unwrap();
    let invocations = handler.all_invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].name, "echo");
    assert_eq!(invocations[0].arg_str("text"), Some("hi"));
    assert_eq!(
        all_deltas(handler.all_events()),
        "<tool name=\"echo\">{\"text\": \"hi\"}</tool>"
    );
}

#[test]
fn e2e_split_opener_is_resolved() {
    let events = parse_chunks(&["Hi <too", "l name=\"x\">body</tool>"]);
    assert_eq!(starts(&events), vec![SegmentType::Text, SegmentType::ToolCall]);
    let text: String = events
        .iter()
        .filter(|e| e.segment_type == SegmentType::Text)
        .filter_map(|e| e.delta())
        .collect();
    assert_eq!(text, "Hi ");
}

#[test]
fn e2e_split_closer_is_never_leaked() {
    let mut ctx = ParserContext::with_defaults();
    let mut events = ctx.feed("<tool name=\"x\">abc</to").unwrap();
    let leaked: String = all_deltas(&events);
    assert!(!leaked.ends_with("</to"), "{leaked:?}");
    events.extend(ctx.feed("ol>tail").unwrap());
    events.extend(ctx.finalize().unwrap());

    assert_eq!(starts(&events), vec![SegmentType::ToolCall, SegmentType::Text]);
    assert_eq!(all_deltas(&events), "<tool name=\"x\">abc</tool>tail");
}

// ── Lifecycle ────────────────────────────────────────────────────────────

#[test]
fn e2e_finalize_is_terminal() {
    let mut ctx = ParserContext::with_defaults();
    ctx.feed("text <tool name=\"x\">unterminated").unwrap();
    let closing = ctx.finalize().unwrap();
    let end = closing.iter().rev().find(|e| e.event_type == SegmentEventType::End).unwrap();
    assert_eq!(end.metadata().unwrap()["incomplete"], json!(true));

    assert!(ctx.finalize().unwrap().is_empty());
    assert_eq!(ctx.feed("more").unwrap_err(), StreamError::Finalized);
}

// ── Invocations ──────────────────────────────────────────────────────────

#[test]
fn e2e_weather_scenario() {
    let mut handler = xml_handler();
    drive(
        handler.as_mut(),
        &[
            "Hello ",
            "<tool name=\"weather\"><arguments><ci",
            "ty>NYC</city></arguments></tool>",
            "after",
        ],
    );

    let events = handler.all_events();
    assert_eq!(starts(events), vec![SegmentType::Text, SegmentType::ToolCall, SegmentType::Text]);
    let text: String = events
        .iter()
        .filter(|e| e.segment_type == SegmentType::Text)
        .filter_map(|e| e.delta())
        .collect();
    assert_eq!(text, "Hello after");

    let invocations = handler.all_invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].name, "weather");
    assert_eq!(invocations[0].id, "seg_2");
    assert_eq!(invocations[0].arg_str("city"), Some("NYC"));
}

#[test]
fn e2e_shorthand_tags_become_invocations() {
    let mut handler = xml_handler();
    drive(
        handler.as_mut(),
        &["<write_file path=\"src/a.rs\">\nfn main() {}\n</write_file><run_bash cwd=\"/tmp\">  cargo test </run_bash>"],
    );

    let invocations = handler.all_invocations();
    assert_eq!(invocations.len(), 2);
    assert_eq!(invocations[0].name, "write_file");
    assert_eq!(invocations[0].arg_str("path"), Some("src/a.rs"));
    assert_eq!(invocations[0].arg_str("content"), Some("fn main() {}\n"));
    assert_eq!(invocations[1].name, "run_bash");
    assert_eq!(invocations[1].arg_str("command"), Some("cargo test"));
    assert_eq!(invocations[1].arg_str("cwd"), Some("/tmp"));
}

#[test]
fn e2e_missing_arguments_warn_instead_of_failing() {
    let mut handler = xml_handler();
    drive(handler.as_mut(), &["<write_file></write_file>"]);

    assert_eq!(starts(handler.all_events()), vec![SegmentType::WriteFile]);
    assert!(handler.all_invocations().is_empty());
    assert_eq!(handler.warnings().len(), 1);
    assert!(handler.warnings()[0].starts_with("seg_1: "));
}

#[test]
fn e2e_json_tool_call() {
    let mut handler =
        StreamingHandlerFactory::default().create(true, Some(ToolCallFormat::Json), LlmProvider::Anthropic);
    drive(
        handler.as_mut(),
        &["Searching {\"name\": \"search\", \"argu", "ments\": {\"q\": \"a \\\"b\\\" {c}\"}} done"],
    );

    assert_eq!(
        starts(handler.all_events()),
        vec![SegmentType::Text, SegmentType::ToolCall, SegmentType::Text]
    );
    let invocations = handler.all_invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].name, "search");
    assert_eq!(invocations[0].arg_str("q"), Some("a \"b\" {c}"));
}

#[test]
fn e2e_sentinel_tool_call() {
    let mut handler =
        StreamingHandlerFactory::default().create(true, Some(ToolCallFormat::Sentinel), LlmProvider::Other);
    drive(
        handler.as_mut(),
        &["[TOOL_CALL]{\"name\": \"lookup\", \"arguments\": {\"id\": \"7\"}}[/TOO", "L_CALL] ok"],
    );

    let invocations = handler.all_invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].name, "lookup");
    assert_eq!(invocations[0].arg_str("id"), Some("7"));
}

#[test]
fn e2e_escaped_field_extraction() {
    let mut extractor = JsonStringFieldExtractor::new(["content"], ["path"]);
    let mut streamed = String::new();
    for part in [r#"{"path": "a\\b.txt", "content": "say \"hi\"\n"#, r#"é\t!"}"#] {
        let update = extractor.feed(part);
        if let Some(delta) = update.deltas.get("content") {
            streamed.push_str(delta);
        }
    }
    assert_eq!(streamed, "say \"hi\"\né\t!");
    assert_eq!(extractor.completed_value("path"), Some("a\\b.txt"));
}

#[test]
fn e2e_api_tool_calls() {
    let mut handler = StreamingHandlerFactory::default().create(true, None, LlmProvider::OpenAi);
    assert_eq!(handler.name(), "api_tool_call");

    let call = |index, id: Option<&str>, name: Option<&str>, args: &str| ToolCallDelta {
        index,
        id: id.map(String::from),
        name: name.map(String::from),
        arguments_delta: Some(args.into()),
    };
    handler.feed(ResponseChunk::text("Let me check.")).unwrap();
    handler
        .feed(ResponseChunk::tool_calls(vec![call(0, Some("call_1"), Some("weather"), "{\"city\":")]))
        .unwrap();
    handler
        .feed(ResponseChunk::tool_calls(vec![call(0, None, None, "\"NYC\"}")]))
        .unwrap();
    handler.finalize().unwrap();

    assert_eq!(starts(handler.all_events()), vec![SegmentType::Text, SegmentType::ToolCall]);
    let invocations = handler.all_invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].id, "seg_2");
    assert_eq!(invocations[0].arg_str("city"), Some("NYC"));
}

#[test]
fn e2e_no_tools_passes_text_through() {
    let mut handler = StreamingHandlerFactory::default().create(false, None, LlmProvider::Anthropic);
    drive(handler.as_mut(), &["<tool name=\"x\">", "not parsed</tool>"]);

    assert_eq!(starts(handler.all_events()), vec![SegmentType::Text]);
    assert_eq!(all_deltas(handler.all_events()), "<tool name=\"x\">not parsed</tool>");
    assert!(handler.all_invocations().is_empty());
}

// ── Config ───────────────────────────────────────────────────────────────

#[test]
fn e2e_config_drives_factory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[streaming]
provider = "anthropic"
tool_call_format = "json"
segment_id_prefix = "turn3_"
"#,
    )
    .unwrap();

    let config = AppConfig::load_from(&path).unwrap();
    let format = config.streaming.format_override().unwrap();
    assert_eq!(format, Some(ToolCallFormat::Json));

    let factory = StreamingHandlerFactory::new(config.streaming.parser_config(), ParserRegistries::default());
    let mut handler = factory.create(true, format, config.streaming.provider_kind());
    drive(handler.as_mut(), &["{\"tool\": \"ping\", \"arguments\": {}}"]);

    assert_eq!(handler.all_events()[0].segment_id, "turn3_seg_1");
    assert_eq!(handler.all_invocations()[0].name, "ping");
}

#[test]
fn e2e_env_overrides_format() {
    let mut config = AppConfig::default();
    config
        .apply_env_overrides(|key| match key {
            "AGENTFLUX_STREAM_PARSER" => Some("sentinel".into()),
            "AGENTFLUX_PROVIDER" => Some("gemini".into()),
            _ => None,
        })
        .unwrap();
    assert_eq!(config.streaming.format_override().unwrap(), Some(ToolCallFormat::Sentinel));
    assert_eq!(config.streaming.provider_kind(), LlmProvider::Gemini);
}

#[test]
fn e2e_custom_registries_only() {
    let config = ParserConfig::default().with_parse_tool_calls(false);
    let mut ctx = ParserContext::new(config, ParserRegistries::empty());
    let events = ctx.feed("<run_bash>ls</run_bash>").unwrap();
    assert!(events.iter().all(|e| e.segment_type == SegmentType::Text));
    ctx.finalize().unwrap();
}
