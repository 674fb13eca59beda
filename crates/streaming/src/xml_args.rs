//! Lenient XML helpers: opening-tag attributes and tool-argument bodies.
//!
//! LLMs produce "XML" that is rarely well formed, so nothing here fails.
//! Mismatched closing tags end the current element, unknown entities are
//! kept verbatim and a body that stops parsing keeps what was read so far.

use crate::events::Metadata;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use regex_lite::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_:.\-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'<>/=`]+))"#)
        .expect("valid regex")
});

/// Element names whose `name` attribute supplies the argument key.
const NAMED_ARG_ELEMENTS: [&str; 4] = ["arg", "argument", "param", "parameter"];
const WRAPPER_ELEMENTS: [&str; 3] = ["arguments", "args", "parameters"];

/// Tag name of an opening tag such as `<write_file path="a">`, lowercased.
pub fn tag_name(opening: &str) -> String {
    opening
        .trim_start()
        .trim_start_matches('<')
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '>' && *c != '/')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Attributes of an opening tag. Names are lowercased, values unescaped.
/// The first occurrence of a repeated attribute wins.
pub fn parse_attributes(opening: &str) -> Metadata {
    let name_len = {
        let trimmed = opening.trim_start();
        let lead = opening.len() - trimmed.len();
        lead + trimmed
            .char_indices()
            .skip(1)
            .find(|(_, c)| c.is_whitespace() || *c == '>' || *c == '/')
            .map(|(i, _)| i)
            .unwrap_or(trimmed.len())
    };

    let mut attrs = Metadata::new();
    for caps in ATTRIBUTE_RE.captures_iter(&opening[name_len..]) {
        let key = caps[1].to_ascii_lowercase();
        let raw = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
            .unwrap_or_default();
        attrs
            .entry(key)
            .or_insert_with(|| Value::String(unescape_entities(raw)));
    }
    attrs
}

/// Decode the five XML entities plus numeric character references.
/// Anything that is not a valid reference is kept verbatim.
pub fn unescape_entities(text: &str) -> String {
    match unescape(text) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => unescape_each(text),
    }
}

fn unescape_each(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = match rest.find(';') {
            Some(semi) => unescape(&rest[..=semi]).ok().map(|d| (semi + 1, d.into_owned())),
            None => None,
        };
        match decoded {
            Some((used, decoded)) => {
                out.push_str(&decoded);
                rest = &rest[used..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug)]
enum Node {
    Element {
        name: String,
        attrs: Metadata,
        children: Vec<Node>,
    },
    Text(String),
}

#[derive(Debug)]
struct OpenElement {
    name: String,
    attrs: Metadata,
    children: Vec<Node>,
}

impl OpenElement {
    fn new(start: &BytesStart<'_>) -> Self {
        Self {
            name: String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase(),
            attrs: element_attributes(start),
            children: Vec::new(),
        }
    }

    fn into_node(self) -> Node {
        Node::Element {
            name: self.name,
            attrs: self.attrs,
            children: self.children,
        }
    }
}

/// Attributes of a parsed element. Unquoted values are accepted.
fn element_attributes(start: &BytesStart<'_>) -> Metadata {
    let mut attrs = Metadata::new();
    for attr in start.html_attributes().with_checks(false).flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        let value = unescape_entities(&String::from_utf8_lossy(&attr.value));
        attrs.entry(key).or_insert(Value::String(value));
    }
    attrs
}

/// Read `body` into a node tree.
///
/// Any closing tag ends the innermost open element, whatever its name, and
/// elements still open when the input ends (or stops parsing) are closed.
fn read_nodes(body: &str) -> Vec<Node> {
    let mut reader = Reader::from_str(body);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut root: Vec<Node> = Vec::new();
    let mut open: Vec<OpenElement> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => open.push(OpenElement::new(&start)),
            Ok(Event::Empty(start)) => attach(&mut open, &mut root, OpenElement::new(&start).into_node()),
            Ok(Event::End(_)) => {
                if let Some(element) = open.pop() {
                    attach(&mut open, &mut root, element.into_node());
                }
            }
            Ok(Event::Text(text)) => {
                let text = unescape_entities(&String::from_utf8_lossy(&text));
                push_text(current_children(&mut open, &mut root), text);
            }
            Ok(Event::CData(cdata)) => {
                let text = String::from_utf8_lossy(&cdata).into_owned();
                push_text(current_children(&mut open, &mut root), text);
            }
            Ok(Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, position = reader.buffer_position(), "Stopped reading XML arguments");
                break;
            }
        }
    }
    while let Some(element) = open.pop() {
        attach(&mut open, &mut root, element.into_node());
    }
    root
}

fn current_children<'a>(open: &'a mut [OpenElement], root: &'a mut Vec<Node>) -> &'a mut Vec<Node> {
    match open.last_mut() {
        Some(parent) => &mut parent.children,
        None => root,
    }
}

fn attach(open: &mut [OpenElement], root: &mut Vec<Node>, node: Node) {
    current_children(open, root).push(node);
}

fn push_text(nodes: &mut Vec<Node>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(prev)) = nodes.last_mut() {
        prev.push_str(&text);
    } else {
        nodes.push(Node::Text(text));
    }
}

/// Byte offset just past the `>` closing an opening tag, skipping quoted
/// attribute values.
pub(crate) fn tag_end(tag: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in tag.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => return Some(i + 1),
            None => {}
        }
    }
    None
}

/// Parse a tool-call body into arguments.
///
/// Accepts an optional `<arguments>` (or `<args>`/`<parameters>`) wrapper
/// around either `<arg name="k">v</arg>` or `<k>v</k>` children. Nested
/// elements become objects, repeated `<item>` elements arrays, and repeated
/// keys arrays.
pub fn parse_xml_arguments(body: &str) -> Metadata {
    let nodes = read_nodes(body);
    let elements: Vec<&Node> = nodes
        .iter()
        .filter(|n| matches!(n, Node::Element { .. }))
        .collect();

    if let [Node::Element { name, children, .. }] = elements.as_slice()
        && WRAPPER_ELEMENTS.contains(&name.as_str())
    {
        return object_from_children(children);
    }
    object_from_children(&nodes)
}

fn object_from_children(children: &[Node]) -> Metadata {
    let mut grouped: Vec<(String, Vec<Value>)> = Vec::new();
    for child in children {
        let Node::Element { name, attrs, .. } = child else {
            continue;
        };
        let key = match attrs.get("name").and_then(Value::as_str) {
            Some(key) if NAMED_ARG_ELEMENTS.contains(&name.as_str()) => key.to_string(),
            _ => name.clone(),
        };
        let value = element_value(child);
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => grouped.push((key, vec![value])),
        }
    }

    grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                Value::Array(values)
            };
            (key, value)
        })
        .collect()
}

fn element_value(node: &Node) -> Value {
    let Node::Element { children, .. } = node else {
        return Value::Null;
    };
    let elements: Vec<&Node> = children
        .iter()
        .filter(|n| matches!(n, Node::Element { .. }))
        .collect();

    if elements.is_empty() {
        let text: String = children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element { .. } => None,
            })
            .collect();
        return Value::String(text);
    }

    if elements
        .iter()
        .all(|n| matches!(n, Node::Element { name, .. } if name == "item"))
    {
        return Value::Array(elements.into_iter().map(element_value).collect());
    }
    Value::Object(object_from_children(children))
}
