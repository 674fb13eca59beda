use super::{
    ApiToolCallStreamingResponseHandler, ParsingStreamingResponseHandler, PassThroughStreamingResponseHandler,
    StreamingResponseHandler,
};
use crate::config::{DetectionStrategyKind, ParserConfig};
use crate::json_parsers::{
    DefaultJsonToolParser, GeminiJsonToolParser, JsonToolParsingStrategy, OpenAiJsonToolParser,
};
use crate::syntax::ParserRegistries;
use agentflux_core::{LlmProvider, ToolCallFormat};
use std::sync::Arc;
use tracing::debug;

/// Picks and builds the handler for one LLM response.
#[derive(Debug, Clone)]
pub struct StreamingHandlerFactory {
    base: ParserConfig,
    registries: ParserRegistries,
}

impl Default for StreamingHandlerFactory {
    fn default() -> Self {
        Self::new(ParserConfig::default(), ParserRegistries::default())
    }
}

impl StreamingHandlerFactory {
    pub fn new(base: ParserConfig, registries: ParserRegistries) -> Self {
        Self { base, registries }
    }

    /// Format the provider emits tool calls in when nothing overrides it.
    pub fn default_format_for(provider: LlmProvider) -> ToolCallFormat {
        match provider {
            LlmProvider::OpenAi | LlmProvider::Gemini | LlmProvider::Mistral => ToolCallFormat::ApiToolCall,
            LlmProvider::Anthropic | LlmProvider::DeepSeek | LlmProvider::Ollama | LlmProvider::Other => {
                ToolCallFormat::Xml
            }
        }
    }

    pub fn json_parser_for(provider: LlmProvider) -> Arc<dyn JsonToolParsingStrategy> {
        match provider {
            LlmProvider::OpenAi => Arc::new(OpenAiJsonToolParser),
            LlmProvider::Gemini => Arc::new(GeminiJsonToolParser),
            _ => Arc::new(DefaultJsonToolParser),
        }
    }

    /// `None` means no tool parsing at all.
    pub fn resolve_format(
        tools_configured: bool,
        format_override: Option<ToolCallFormat>,
        provider: LlmProvider,
    ) -> Option<ToolCallFormat> {
        if !tools_configured {
            return None;
        }
        Some(format_override.unwrap_or_else(|| Self::default_format_for(provider)))
    }

    fn strategy_order(format: ToolCallFormat) -> Vec<DetectionStrategyKind> {
        match format {
            ToolCallFormat::Json => vec![DetectionStrategyKind::JsonTool, DetectionStrategyKind::XmlTag],
            ToolCallFormat::Sentinel => vec![DetectionStrategyKind::Sentinel, DetectionStrategyKind::XmlTag],
            ToolCallFormat::Xml | ToolCallFormat::ApiToolCall => vec![DetectionStrategyKind::XmlTag],
        }
    }

    pub fn create(
        &self,
        tools_configured: bool,
        format_override: Option<ToolCallFormat>,
        provider: LlmProvider,
    ) -> Box<dyn StreamingResponseHandler> {
        let prefix = self.base.segment_id_prefix.clone().unwrap_or_default();
        let format = Self::resolve_format(tools_configured, format_override, provider);
        debug!(
            provider = %provider,
            format = format.map_or("none", |f| f.as_str()),
            "Selecting streaming handler"
        );

        match format {
            None => Box::new(PassThroughStreamingResponseHandler::new(prefix)),
            Some(ToolCallFormat::ApiToolCall) => Box::new(ApiToolCallStreamingResponseHandler::new(
                prefix,
                self.registries.tool_states.clone(),
            )),
            Some(format) => {
                let mut config = self.base.clone().with_strategy_order(Self::strategy_order(format));
                if config.json_tool_parser.is_none() {
                    config.json_tool_parser = Some(Self::json_parser_for(provider));
                }
                Box::new(ParsingStreamingResponseHandler::new(config, self.registries.clone()))
            }
        }
    }
}
