//! agentflux CLI — the main entry point.
//!
//! Commands:
//! - `parse`   — Replay a recorded LLM response through the streaming parser
//! - `config`  — Show, locate or validate the configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "agentflux",
    about = "agentflux — streaming tool-call extraction for LLM agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded response and print segment events and invocations
    Parse {
        /// Response file to read (`-` or omitted for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Characters per simulated stream chunk
        #[arg(short, long, default_value_t = 16)]
        chunk_size: usize,

        /// Tool call format: auto, xml, json, sentinel, api_tool_call
        #[arg(short, long, env = "AGENTFLUX_STREAM_PARSER")]
        format: Option<String>,

        /// Provider the response came from
        #[arg(short, long, env = "AGENTFLUX_PROVIDER")]
        provider: Option<String>,

        /// Treat the response as if no tools were configured
        #[arg(long)]
        no_tools: bool,

        /// Use this config file instead of ~/.agentflux/config.toml
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the resolved configuration as TOML
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Parse {
            input,
            chunk_size,
            format,
            provider,
            no_tools,
            config,
        } => {
            commands::parse::run(commands::parse::ParseArgs {
                input,
                chunk_size,
                format,
                provider,
                no_tools,
                config,
            })
            .await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}
