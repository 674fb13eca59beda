//! Opener detection.
//!
//! A strategy declares the characters that may start one of its openers and
//! classifies the buffered candidate opener as still ambiguous, matched or
//! rejected. Strategies only ever see the buffered opener, never the rest of
//! the stream.

use crate::config::{DetectionStrategyKind, ParserConfig};
use crate::syntax::{ToolSyntaxRegistry, ToolSyntaxSpec};
use crate::xml_args::tag_end;
use std::sync::Arc;

pub const XML_TOOL_OPENER: &str = "<tool";
pub const XML_TOOL_CLOSER: &str = "</tool>";
pub const SENTINEL_OPENER: &str = "[TOOL_CALL]";
pub const SENTINEL_CLOSER: &str = "[/TOOL_CALL]";

/// Which content state a matched opener leads to.
#[derive(Debug, Clone)]
pub enum OpenerKind {
    XmlTool,
    CustomTag(Arc<ToolSyntaxSpec>),
    JsonTool,
    Sentinel,
}

/// Verdict on a buffered candidate opener.
#[derive(Debug, Clone)]
pub enum Sniff {
    /// Could still become an opener; keep buffering.
    Pending,
    Matched(OpenerKind),
    /// Can never become an opener of this strategy.
    Rejected,
}

#[derive(Debug, Clone)]
pub enum DetectionStrategy {
    /// `<tool ...>` and registered custom tags. Candidates are lowercase
    /// opener prefixes such as `<tool` or `<write_file`.
    XmlTag { candidates: Vec<(String, OpenerKind)> },
    /// Signature prefixes with whitespace removed.
    JsonTool { patterns: Vec<String> },
    Sentinel,
}

impl DetectionStrategy {
    /// Strategies for `config`, in priority order.
    ///
    /// XmlTag is always present when custom tags are registered so shorthand
    /// tags work whatever the configured format. Generic tool-call
    /// strategies are only built when `parse_tool_calls` is set.
    pub fn build_all(config: &ParserConfig, syntax: &ToolSyntaxRegistry) -> Vec<Self> {
        let mut order = config.strategy_order.clone();
        if !order.contains(&DetectionStrategyKind::XmlTag) {
            order.push(DetectionStrategyKind::XmlTag);
        }

        let mut strategies = Vec::new();
        let mut seen = Vec::new();
        for kind in order {
            if seen.contains(&kind) {
                continue;
            }
            seen.push(kind);
            if let Some(strategy) = Self::build(kind, config, syntax) {
                strategies.push(strategy);
            }
        }
        strategies
    }

    fn build(kind: DetectionStrategyKind, config: &ParserConfig, syntax: &ToolSyntaxRegistry) -> Option<Self> {
        match kind {
            DetectionStrategyKind::XmlTag => {
                let mut candidates: Vec<(String, OpenerKind)> = syntax
                    .specs()
                    .map(|spec| (spec.opener_prefix(), OpenerKind::CustomTag(Arc::clone(spec))))
                    .collect();
                if config.parse_tool_calls {
                    candidates.push((XML_TOOL_OPENER.to_string(), OpenerKind::XmlTool));
                }
                (!candidates.is_empty()).then_some(Self::XmlTag { candidates })
            }
            DetectionStrategyKind::JsonTool if config.parse_tool_calls => {
                let patterns: Vec<String> = config
                    .json_tool_patterns
                    .iter()
                    .map(|p| strip_whitespace(p))
                    .filter(|p| !p.is_empty())
                    .collect();
                (!patterns.is_empty()).then_some(Self::JsonTool { patterns })
            }
            DetectionStrategyKind::Sentinel if config.parse_tool_calls => Some(Self::Sentinel),
            _ => None,
        }
    }

    pub fn kind(&self) -> DetectionStrategyKind {
        match self {
            Self::XmlTag { .. } => DetectionStrategyKind::XmlTag,
            Self::JsonTool { .. } => DetectionStrategyKind::JsonTool,
            Self::Sentinel => DetectionStrategyKind::Sentinel,
        }
    }

    pub fn triggers_on(&self, c: char) -> bool {
        match self {
            Self::XmlTag { .. } => c == '<',
            Self::JsonTool { patterns } => patterns.iter().any(|p| p.starts_with(c)),
            Self::Sentinel => c == '[',
        }
    }

    /// Classify `buffer`, which starts with one of this strategy's trigger
    /// characters.
    pub fn sniff(&self, buffer: &str) -> Sniff {
        match self {
            Self::XmlTag { candidates } => sniff_xml(candidates, buffer),
            Self::JsonTool { patterns } => sniff_json(patterns, buffer),
            Self::Sentinel => sniff_sentinel(buffer),
        }
    }
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn is_tag_boundary(c: char) -> bool {
    c.is_whitespace() || c == '>' || c == '/'
}

fn sniff_xml(candidates: &[(String, OpenerKind)], buffer: &str) -> Sniff {
    let lower = buffer.to_ascii_lowercase();
    let complete = tag_end(buffer) == Some(buffer.len());

    let mut pending = false;
    let mut best: Option<&(String, OpenerKind)> = None;
    for candidate in candidates {
        let opener = candidate.0.as_str();
        if opener.starts_with(&lower) {
            pending = true;
        } else if let Some(rest) = lower.strip_prefix(opener)
            && rest.starts_with(is_tag_boundary)
        {
            if !complete {
                pending = true;
            } else if best.is_none_or(|b| b.0.len() < opener.len()) {
                best = Some(candidate);
            }
        }
    }

    match best {
        Some((_, kind)) => Sniff::Matched(kind.clone()),
        None if pending => Sniff::Pending,
        None => Sniff::Rejected,
    }
}

fn sniff_json(patterns: &[String], buffer: &str) -> Sniff {
    let compact = strip_whitespace(buffer);
    if patterns.iter().any(|p| compact.starts_with(p.as_str())) {
        Sniff::Matched(OpenerKind::JsonTool)
    } else if patterns.iter().any(|p| p.starts_with(&compact)) {
        Sniff::Pending
    } else {
        Sniff::Rejected
    }
}

fn sniff_sentinel(buffer: &str) -> Sniff {
    let lower = buffer.to_ascii_lowercase();
    let opener = SENTINEL_OPENER.to_ascii_lowercase();
    if lower == opener {
        Sniff::Matched(OpenerKind::Sentinel)
    } else if opener.starts_with(&lower) {
        Sniff::Pending
    } else {
        Sniff::Rejected
    }
}
