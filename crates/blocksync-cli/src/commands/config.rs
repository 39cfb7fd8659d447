//! Config command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use blocksync_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
            println!("{}", json);
        }
        OutputFormat::Quiet => {
            println!("{}", config.database_id.as_deref().unwrap_or(""));
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            for (key, value) in describe(&config) {
                println!("  {:<21} {}", format!("{}:", key), value);
            }
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    config.set_value(&key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Key/value pairs for human display
fn describe(config: &Config) -> Vec<(&'static str, String)> {
    let not_set = || "(not set)".to_string();
    vec![
        ("api_base_url", config.api_base_url.clone()),
        ("api_version", config.api_version.clone()),
        (
            "database_id",
            config.database_id.clone().unwrap_or_else(not_set),
        ),
        ("token_env", config.token_env.clone()),
        (
            "token_command",
            config.token_command.clone().unwrap_or_else(not_set),
        ),
        ("debounce_ms", config.debounce_ms.to_string()),
        ("request_timeout_secs", config.request_timeout_secs.to_string()),
        ("page_size", config.page_size.to_string()),
        ("debug", config.debug.to_string()),
        ("data_dir", config.data_dir.display().to_string()),
        ("log_file", config.log_path().display().to_string()),
    ]
}
