//! `agentflux parse` — Replay a recorded LLM response through a handler.
//!
//! The response is cut into fixed-size chunks to mimic a token stream.
//! Segment events are printed as JSON lines, followed by the reconstructed
//! invocations.

use agentflux_config::AppConfig;
use agentflux_core::{Error, LlmProvider, Result, ToolCallFormat};
use agentflux_streaming::{ParserRegistries, StreamingHandlerFactory};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

pub struct ParseArgs {
    pub input: Option<PathBuf>,
    pub chunk_size: usize,
    pub format: Option<String>,
    pub provider: Option<String>,
    pub no_tools: bool,
    pub config: Option<PathBuf>,
}

pub async fn run(args: ParseArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(provider) = &args.provider {
        config.streaming.provider = provider.clone();
    }
    if let Some(format) = &args.format {
        config.streaming.tool_call_format = format.clone();
    }
    config.validate()?;

    let provider: LlmProvider = config.streaming.provider_kind();
    let format_override: Option<ToolCallFormat> = config.streaming.format_override()?;
    let text = read_input(args.input.as_ref()).await?;

    let factory = StreamingHandlerFactory::new(config.streaming.parser_config(), ParserRegistries::default());
    let mut handler = factory.create(!args.no_tools, format_override, provider);
    tracing::info!(handler = handler.name(), provider = %provider, "Replaying response");

    for chunk in chunk_text(&text, args.chunk_size) {
        for event in handler.feed_text(&chunk)? {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    for event in handler.finalize()? {
        println!("{}", serde_json::to_string(&event)?);
    }

    for invocation in handler.all_invocations() {
        println!("{}", serde_json::json!({ "invocation": invocation }));
    }
    if !handler.warnings().is_empty() {
        eprintln!("{} warning(s):", handler.warnings().len());
        for w in handler.warnings() {
            eprintln!("  {w}");
        }
    }
    Ok(())
}

async fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Internal(format!("Failed to read {}: {e}", path.display()))),
        _ => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .map_err(|e| Error::Internal(format!("Failed to read stdin: {e}")))?;
            Ok(text)
        }
    }
}

/// Split `text` into pieces of at most `size` characters.
fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_respect_char_boundaries() {
        assert_eq!(chunk_text("héllo", 2), vec!["hé", "ll", "o"]);
        assert_eq!(chunk_text("abc", 0), vec!["a", "b", "c"]);
        assert!(chunk_text("", 4).is_empty());
    }

    #[tokio::test]
    async fn bad_config_surfaces_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[streaming]\ntool_call_format = \"smoke_signals\"\n").unwrap();
        let err = run(ParseArgs {
            input: None,
            chunk_size: 4,
            format: None,
            provider: None,
            no_tools: false,
            config: Some(path),
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Config { .. }), "{err}");
    }

    #[tokio::test]
    async fn reads_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("response.txt");
        std::fs::write(&path, "Hello <run_bash>ls</run_bash>").unwrap();
        let text = read_input(Some(&path)).await.unwrap();
        assert!(text.contains("run_bash"));

        let missing = dir.path().join("missing.txt");
        let err = read_input(Some(&missing)).await.unwrap_err();
        assert!(matches!(err, Error::Internal(ref m) if m.contains("missing.txt")));
    }
}
