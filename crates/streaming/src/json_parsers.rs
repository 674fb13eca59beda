//! Provider-specific JSON tool-call parsing.
//!
//! Vendors disagree on the shape of a JSON tool call. A strategy turns the
//! raw JSON text of one tool-call segment into named calls; the adapter
//! picks the strategy configured for the provider in use.

use crate::events::Metadata;
use serde_json::Value;
use tracing::debug;

/// One tool call recovered from JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToolCall {
    pub name: String,
    pub arguments: Metadata,
}

/// Turns the raw JSON of a tool-call segment into calls.
pub trait JsonToolParsingStrategy: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Parse `raw`. Unparseable input yields an empty list, never an error.
    fn parse(&self, raw: &str) -> Vec<ParsedToolCall>;
}

const NAME_KEYS: [&str; 4] = ["name", "tool_name", "function", "tool"];
const ARGUMENT_KEYS: [&str; 4] = ["arguments", "parameters", "args", "input"];

/// Accepts the common shapes:
/// `{"name", "arguments"}`, `{"tool": {...}}`, `{"function": {...}}`,
/// `{"tool_calls": [...]}` and arrays of any of these.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultJsonToolParser;

impl JsonToolParsingStrategy for DefaultJsonToolParser {
    fn name(&self) -> &'static str {
        "default"
    }

    fn parse(&self, raw: &str) -> Vec<ParsedToolCall> {
        match parse_value(raw) {
            Some(value) => calls_from_value(&value),
            None => Vec::new(),
        }
    }
}

/// OpenAI function-calling shape: `{"tool_calls": [{"type": "function",
/// "function": {"name", "arguments": "<json string>"}}]}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiJsonToolParser;

impl JsonToolParsingStrategy for OpenAiJsonToolParser {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn parse(&self, raw: &str) -> Vec<ParsedToolCall> {
        let Some(value) = parse_value(raw) else {
            return Vec::new();
        };
        let items: Vec<&Value> = match &value {
            Value::Object(obj) => match obj.get("tool_calls") {
                Some(Value::Array(calls)) => calls.iter().collect(),
                _ => vec![&value],
            },
            Value::Array(items) => items.iter().collect(),
            _ => Vec::new(),
        };

        let calls: Vec<ParsedToolCall> = items
            .into_iter()
            .filter_map(|item| {
                let function = item.get("function")?.as_object()?;
                let name = function.get("name")?.as_str()?;
                Some(ParsedToolCall {
                    name: name.to_string(),
                    arguments: arguments_from_value(function.get("arguments")),
                })
            })
            .collect();

        if calls.is_empty() {
            calls_from_value(&value)
        } else {
            calls
        }
    }
}

/// Gemini shape: `{"functionCall": {"name", "args"}}` or bare `{"name", "args"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiJsonToolParser;

impl JsonToolParsingStrategy for GeminiJsonToolParser {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn parse(&self, raw: &str) -> Vec<ParsedToolCall> {
        let Some(value) = parse_value(raw) else {
            return Vec::new();
        };
        let items: Vec<&Value> = match &value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        let calls: Vec<ParsedToolCall> = items
            .into_iter()
            .filter_map(|item| {
                let call = item
                    .get("functionCall")
                    .or_else(|| item.get("function_call"))
                    .unwrap_or(item);
                let name = call.get("name")?.as_str()?;
                let args = call.get("args")?;
                Some(ParsedToolCall {
                    name: name.to_string(),
                    arguments: arguments_from_value(Some(args)),
                })
            })
            .collect();

        if calls.is_empty() {
            calls_from_value(&value)
        } else {
            calls
        }
    }
}

fn parse_value(raw: &str) -> Option<Value> {
    match serde_json::from_str(raw.trim()) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Tool call body is not valid JSON");
            None
        }
    }
}

/// Whether `value` looks like a tool call envelope rather than a bare
/// argument object: a `tool_calls` list, a name key next to an argument key,
/// a nested call under `function`/`tool`/`functionCall`, or a list of these.
pub fn is_call_shaped(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty() && items.iter().all(is_call_shaped),
        Value::Object(obj) => {
            obj.contains_key("tool_calls")
                || (NAME_KEYS.iter().any(|k| obj.contains_key(*k))
                    && ARGUMENT_KEYS.iter().any(|k| obj.contains_key(*k)))
                || ["function", "tool", "functionCall", "function_call"]
                    .iter()
                    .filter_map(|k| obj.get(*k))
                    .any(|inner| inner.is_object() && is_call_shaped(inner))
        }
        _ => false,
    }
}

fn calls_from_value(value: &Value) -> Vec<ParsedToolCall> {
    match value {
        Value::Array(items) => items.iter().flat_map(calls_from_value).collect(),
        Value::Object(obj) => {
            if let Some(calls) = obj.get("tool_calls") {
                return calls_from_value(calls);
            }
            if let Some(inner) = obj.get("tool")
                && inner.is_object()
            {
                return calls_from_value(inner);
            }
            call_from_object(obj).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

fn call_from_object(obj: &Metadata) -> Option<ParsedToolCall> {
    // OpenAI nests the real call under "function".
    if let Some(Value::Object(function)) = obj.get("function") {
        return call_from_object(function);
    }

    let name = NAME_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|n| !n.is_empty())?;
    let arguments = ARGUMENT_KEYS.iter().find_map(|key| obj.get(*key));

    Some(ParsedToolCall {
        name: name.to_string(),
        arguments: arguments_from_value(arguments),
    })
}

/// Objects pass through; JSON-encoded strings are decoded; anything else
/// becomes an empty map.
fn arguments_from_value(value: Option<&Value>) -> Metadata {
    match value {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) if !s.trim().is_empty() => {
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => map,
                _ => Metadata::new(),
            }
        }
        _ => Metadata::new(),
    }
}
