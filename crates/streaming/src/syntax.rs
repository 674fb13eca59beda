//! Registries consulted while parsing: custom shorthand tags and per-tool
//! refinements of the generic tool tag.
//!
//! Both are built by the caller and handed to the parser immutably, so every
//! parser instance (and every test) sees exactly the registries it was given.

use crate::events::{Metadata, SegmentType};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds tool arguments from a custom tag's attributes and body.
/// Returns `None` when required arguments are missing.
pub type ArgumentBuilder = fn(&Metadata, &str) -> Option<Metadata>;

/// How one custom shorthand tag maps onto a tool.
#[derive(Debug, Clone)]
pub struct ToolSyntaxSpec {
    /// Lowercase tag name, e.g. `write_file` for `<write_file ...>`
    pub tag_name: String,
    pub tool_name: String,
    pub segment_type: SegmentType,
    build: ArgumentBuilder,
}

impl ToolSyntaxSpec {
    pub fn new(
        tag_name: impl Into<String>,
        tool_name: impl Into<String>,
        segment_type: SegmentType,
        build: ArgumentBuilder,
    ) -> Self {
        Self {
            tag_name: tag_name.into().to_ascii_lowercase(),
            tool_name: tool_name.into(),
            segment_type,
            build,
        }
    }

    pub fn build_arguments(&self, metadata: &Metadata, content: &str) -> Option<Metadata> {
        (self.build)(metadata, content)
    }

    /// Opener prefix used during tag sniffing, e.g. `<write_file`.
    pub fn opener_prefix(&self) -> String {
        format!("<{}", self.tag_name)
    }

    pub fn closing_tag(&self) -> String {
        format!("</{}>", self.tag_name)
    }

    pub fn write_file() -> Self {
        Self::new("write_file", "write_file", SegmentType::WriteFile, build_write_file)
    }

    pub fn run_bash() -> Self {
        Self::new("run_bash", "run_bash", SegmentType::RunBash, build_run_bash)
    }

    pub fn patch_file() -> Self {
        Self::new("patch_file", "patch_file", SegmentType::PatchFile, build_patch_file)
    }
}

fn meta_str<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Drop the single newline that usually follows the opening tag.
fn strip_leading_newline(content: &str) -> &str {
    content
        .strip_prefix("\r\n")
        .or_else(|| content.strip_prefix('\n'))
        .unwrap_or(content)
}

fn build_write_file(metadata: &Metadata, content: &str) -> Option<Metadata> {
    let path = meta_str(metadata, "path")?;
    let mut args = Metadata::new();
    args.insert("path".into(), path.into());
    args.insert("content".into(), strip_leading_newline(content).into());
    Some(args)
}

fn build_run_bash(metadata: &Metadata, content: &str) -> Option<Metadata> {
    let command = content.trim();
    if command.is_empty() {
        return None;
    }
    let mut args = Metadata::new();
    args.insert("command".into(), command.into());
    if let Some(cwd) = meta_str(metadata, "cwd") {
        args.insert("cwd".into(), cwd.into());
    }
    Some(args)
}

fn build_patch_file(metadata: &Metadata, content: &str) -> Option<Metadata> {
    let path = meta_str(metadata, "path")?;
    let patch = strip_leading_newline(content);
    if patch.trim().is_empty() {
        return None;
    }
    let mut args = Metadata::new();
    args.insert("path".into(), path.into());
    args.insert("patch".into(), patch.into());
    Some(args)
}

/// Custom shorthand tags, keyed by lowercase tag name.
#[derive(Debug, Clone, Default)]
pub struct ToolSyntaxRegistry {
    specs: HashMap<String, Arc<ToolSyntaxSpec>>,
}

impl ToolSyntaxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `write_file`, `run_bash` and `patch_file`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ToolSyntaxSpec::write_file());
        registry.register(ToolSyntaxSpec::run_bash());
        registry.register(ToolSyntaxSpec::patch_file());
        registry
    }

    /// Register a spec. Replaces any existing spec with the same tag.
    pub fn register(&mut self, spec: ToolSyntaxSpec) {
        self.specs.insert(spec.tag_name.clone(), Arc::new(spec));
    }

    pub fn get(&self, tag_name: &str) -> Option<Arc<ToolSyntaxSpec>> {
        self.specs.get(&tag_name.to_ascii_lowercase()).cloned()
    }

    pub fn specs(&self) -> impl Iterator<Item = &Arc<ToolSyntaxSpec>> {
        self.specs.values()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Tool name → segment type for `<tool name="...">` calls.
///
/// Lets a provider stream e.g. `<tool name="write_file">` as a `write_file`
/// segment so UIs can render it specially. Unlisted tools stay `tool_call`.
#[derive(Debug, Clone, Default)]
pub struct ToolStateRegistry {
    refinements: HashMap<String, SegmentType>,
}

impl ToolStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file_tools() -> Self {
        let mut registry = Self::new();
        registry.register("write_file", SegmentType::WriteFile);
        registry.register("run_bash", SegmentType::RunBash);
        registry.register("patch_file", SegmentType::PatchFile);
        registry
    }

    pub fn register(&mut self, tool_name: &str, segment_type: SegmentType) {
        self.refinements
            .insert(tool_name.to_ascii_lowercase(), segment_type);
    }

    pub fn segment_type_for(&self, tool_name: &str) -> SegmentType {
        self.refinements
            .get(&tool_name.to_ascii_lowercase())
            .copied()
            .unwrap_or(SegmentType::ToolCall)
    }
}

/// The registries one parser instance works with.
#[derive(Debug, Clone)]
pub struct ParserRegistries {
    pub syntax: Arc<ToolSyntaxRegistry>,
    pub tool_states: Arc<ToolStateRegistry>,
}

impl ParserRegistries {
    pub fn new(syntax: ToolSyntaxRegistry, tool_states: ToolStateRegistry) -> Self {
        Self {
            syntax: Arc::new(syntax),
            tool_states: Arc::new(tool_states),
        }
    }

    /// No custom tags and no refinements.
    pub fn empty() -> Self {
        Self::new(ToolSyntaxRegistry::new(), ToolStateRegistry::new())
    }
}

impl Default for ParserRegistries {
    fn default() -> Self {
        Self::new(ToolSyntaxRegistry::with_builtins(), ToolStateRegistry::with_file_tools())
    }
}
