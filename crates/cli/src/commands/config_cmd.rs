//! `agentflux config` — Configuration management commands.

use agentflux_config::AppConfig;
use agentflux_core::LlmProvider;
use agentflux_streaming::StreamingHandlerFactory;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let streaming = &config.streaming;
            let provider = streaming.provider_kind();
            let format = streaming
                .format_override()?
                .unwrap_or_else(|| StreamingHandlerFactory::default_format_for(provider));

            let mut warnings = Vec::new();
            if provider == LlmProvider::Other {
                warnings.push(format!("Unknown provider '{}', treating as generic", streaming.provider));
            }
            if !streaming.parse_tool_calls {
                warnings.push("parse_tool_calls = false: only shorthand tags are recognised".to_string());
            }
            if streaming.compact_threshold == 0 {
                warnings.push("compact_threshold = 0: the scanner compacts after every chunk".to_string());
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Provider:  {provider}");
            println!("   Format:    {format}");
            println!("   Patterns:  {}", streaming.parser_config().json_tool_patterns.len());
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", config.to_toml());
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = agentflux_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains(".agentflux"));
    }
}
