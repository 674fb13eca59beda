//! Incremental extraction of string fields from a JSON object that is still
//! arriving.
//!
//! This is deliberately not a JSON parser. It only recognises "a quoted
//! string value following a quoted key" and decodes escapes as characters
//! arrive, which is all the tool-call paths need once something upstream has
//! decided the text is a tool call.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Scan,
    Key,
    PostKey,
    PostColon,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    Backslash,
    Unicode { digits: u8, code: u32 },
}

/// Decodes one JSON string body character by character.
#[derive(Debug, Clone)]
struct StringDecoder {
    escape: Escape,
    pending_high: Option<u32>,
}

impl Default for StringDecoder {
    fn default() -> Self {
        Self {
            escape: Escape::None,
            pending_high: None,
        }
    }
}

impl StringDecoder {
    /// Feed one raw character. Decoded output goes to `out`; returns `true`
    /// when `c` is the closing quote.
    fn decode(&mut self, c: char, out: &mut String) -> bool {
        match self.escape {
            Escape::None => match c {
                '\\' => {
                    self.escape = Escape::Backslash;
                    false
                }
                '"' => {
                    self.flush_surrogate(out);
                    *self = Self::default();
                    true
                }
                _ => {
                    self.push(c, out);
                    false
                }
            },
            Escape::Backslash => {
                self.escape = Escape::None;
                let decoded = match c {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    'b' => '\u{8}',
                    'f' => '\u{c}',
                    'u' => {
                        self.escape = Escape::Unicode { digits: 0, code: 0 };
                        return false;
                    }
                    // `\\`, `\"`, `\/` and anything unknown decode to the char itself
                    other => other,
                };
                self.push(decoded, out);
                false
            }
            Escape::Unicode { digits, code } => {
                let Some(d) = c.to_digit(16) else {
                    // Malformed escape: give up on it and treat `c` normally.
                    self.escape = Escape::None;
                    return self.decode(c, out);
                };
                let code = code * 16 + d;
                if digits + 1 < 4 {
                    self.escape = Escape::Unicode { digits: digits + 1, code };
                    return false;
                }
                self.escape = Escape::None;
                self.push_code_unit(code, out);
                false
            }
        }
    }

    fn push_code_unit(&mut self, unit: u32, out: &mut String) {
        match unit {
            0xD800..=0xDBFF => {
                self.flush_surrogate(out);
                self.pending_high = Some(unit);
            }
            0xDC00..=0xDFFF => match self.pending_high.take() {
                Some(high) => {
                    let combined = 0x10000 + ((high - 0xD800) << 10) + (unit - 0xDC00);
                    out.push(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                None => out.push(char::REPLACEMENT_CHARACTER),
            },
            _ => self.push(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER), out),
        }
    }

    fn push(&mut self, c: char, out: &mut String) {
        self.flush_surrogate(out);
        out.push(c);
    }

    fn flush_surrogate(&mut self, out: &mut String) {
        if self.pending_high.take().is_some() {
            out.push(char::REPLACEMENT_CHARACTER);
        }
    }
}

/// What one [`JsonStringFieldExtractor::feed`] call discovered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractorUpdate {
    /// Newly decoded characters of streamed fields
    pub deltas: HashMap<String, String>,
    /// Values of final fields whose closing quote arrived in this feed
    pub completed: HashMap<String, String>,
}

impl ExtractorUpdate {
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty() && self.completed.is_empty()
    }
}

/// Pulls named string fields out of partial JSON.
///
/// `stream_fields` are reported incrementally through
/// [`ExtractorUpdate::deltas`]; `final_fields` are reported once complete
/// through [`ExtractorUpdate::completed`]. A field may be in both sets.
#[derive(Debug, Clone)]
pub struct JsonStringFieldExtractor {
    stream_fields: HashSet<String>,
    final_fields: HashSet<String>,
    state: ScanState,
    decoder: StringDecoder,
    key: String,
    field: Option<String>,
    value: String,
    completed: HashMap<String, String>,
}

impl JsonStringFieldExtractor {
    pub fn new<S, F>(stream_fields: S, final_fields: F) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            stream_fields: stream_fields.into_iter().map(Into::into).collect(),
            final_fields: final_fields.into_iter().map(Into::into).collect(),
            state: ScanState::Scan,
            decoder: StringDecoder::default(),
            key: String::new(),
            field: None,
            value: String::new(),
            completed: HashMap::new(),
        }
    }

    /// Feed the next raw fragment.
    pub fn feed(&mut self, text: &str) -> ExtractorUpdate {
        let mut update = ExtractorUpdate::default();
        for c in text.chars() {
            self.step(c, &mut update);
        }
        update
    }

    /// First completed value seen for `field` across all feeds.
    pub fn completed_value(&self, field: &str) -> Option<&str> {
        self.completed.get(field).map(String::as_str)
    }

    pub fn reset(&mut self) {
        self.state = ScanState::Scan;
        self.decoder = StringDecoder::default();
        self.key.clear();
        self.field = None;
        self.value.clear();
        self.completed.clear();
    }

    fn step(&mut self, c: char, update: &mut ExtractorUpdate) {
        match self.state {
            ScanState::Scan => {
                if c == '"' {
                    self.key.clear();
                    self.state = ScanState::Key;
                }
            }
            ScanState::Key => {
                if self.decoder.decode(c, &mut self.key) {
                    self.state = ScanState::PostKey;
                }
            }
            ScanState::PostKey => {
                if c == ':' {
                    self.state = ScanState::PostColon;
                } else if !c.is_whitespace() {
                    // Not a key after all (array element, value string, ...).
                    self.state = ScanState::Scan;
                    self.step(c, update);
                }
            }
            ScanState::PostColon => {
                if c == '"' {
                    let tracked = self.stream_fields.contains(&self.key)
                        || self.final_fields.contains(&self.key);
                    self.field = tracked.then(|| self.key.clone());
                    self.value.clear();
                    self.state = ScanState::Value;
                } else if !c.is_whitespace() {
                    // Non-string value; keep scanning for the next key.
                    self.state = ScanState::Scan;
                }
            }
            ScanState::Value => {
                let mut piece = String::new();
                let closed = self.decoder.decode(c, &mut piece);
                if let Some(field) = &self.field {
                    if !piece.is_empty() {
                        self.value.push_str(&piece);
                        if self.stream_fields.contains(field) {
                            update
                                .deltas
                                .entry(field.clone())
                                .or_default()
                                .push_str(&piece);
                        }
                    }
                    if closed && self.final_fields.contains(field) {
                        let value = std::mem::take(&mut self.value);
                        update
                            .completed
                            .entry(field.clone())
                            .or_insert_with(|| value.clone());
                        self.completed.entry(field.clone()).or_insert(value);
                    }
                }
                if closed {
                    self.field = None;
                    self.value.clear();
                    self.state = ScanState::Scan;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"tool_name":"echo","content":"line1\nline2"}"#;

    #[test]
    fn completed_field_across_splits() {
        for (a, b) in [(5, 20), (14, 30), (33, 40), (1, 2)] {
            let mut ex = JsonStringFieldExtractor::new(Vec::<String>::new(), ["content", "tool_name"]);
            let mut completed = HashMap::new();
            for part in [&SAMPLE[..a], &SAMPLE[a..b], &SAMPLE[b..]] {
                completed.extend(ex.feed(part).completed);
            }
            assert_eq!(completed.get("content").map(String::as_str), Some("line1\nline2"));
            assert_eq!(completed.get("tool_name").map(String::as_str), Some("echo"));
        }
    }

    #[test]
    fn streamed_deltas_are_split_independent() {
        let whole = {
            let mut ex = JsonStringFieldExtractor::new(["content"], ["content"]);
            ex.feed(SAMPLE).deltas.remove("content").unwrap()
        };
        assert_eq!(whole, "line1\nline2");

        for split in 0..SAMPLE.len() {
            let mut ex = JsonStringFieldExtractor::new(["content"], Vec::<String>::new());
            let mut streamed = String::new();
            for part in [&SAMPLE[..split], &SAMPLE[split..]] {
                if let Some(d) = ex.feed(part).deltas.get("content") {
                    streamed.push_str(d);
                }
            }
            assert_eq!(streamed, whole, "split at {split}");
        }
    }

    #[test]
    fn unicode_escapes_decode() {
        let mut ex = JsonStringFieldExtractor::new(Vec::<String>::new(), ["text"]);
        let update = ex.feed(r#"{"text":"caf\u00e9 \ud83d\ude00 \"q\" a\\b"}"#);
        assert_eq!(update.completed["text"], "café 😀 \"q\" a\\b");
    }

    #[test]
    fn lone_surrogate_becomes_replacement() {
        let mut ex = JsonStringFieldExtractor::new(Vec::<String>::new(), ["text"]);
        let update = ex.feed(r#"{"text":"x\ud83dy"}"#);
        assert_eq!(update.completed["text"], "x\u{FFFD}y");
    }

    #[test]
    fn non_string_values_are_skipped() {
        let mut ex = JsonStringFieldExtractor::new(Vec::<String>::new(), ["name"]);
        let update = ex.feed(r#"{"count": 3, "tags": ["a", "b"], "name" : "echo"}"#);
        assert_eq!(update.completed["name"], "echo");
        assert_eq!(update.completed.len(), 1);
    }

    #[test]
    fn nested_object_fields_are_found() {
        let mut ex = JsonStringFieldExtractor::new(Vec::<String>::new(), ["name"]);
        ex.feed(r#"{"function": {"name": "lookup", "#);
        assert_eq!(ex.completed_value("name"), Some("lookup"));
    }

    #[test]
    fn first_completion_wins() {
        let mut ex = JsonStringFieldExtractor::new(Vec::<String>::new(), ["name"]);
        ex.feed(r#"{"name":"outer","arguments":{"name":"inner"}}"#);
        assert_eq!(ex.completed_value("name"), Some("outer"));
    }

    #[test]
    fn untracked_fields_produce_nothing() {
        let mut ex = JsonStringFieldExtractor::new(["content"], ["path"]);
        let update = ex.feed(r#"{"other":"value"}"#);
        assert!(update.is_empty());
    }
}
