//! API token lookup
//!
//! The token comes from the environment variable named by `token_env`, or
//! failing that from the output of `token_command`. A missing token is not
//! an error here; the first remote call reports it.

use std::env;
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

use blocksync_core::Config;

/// Resolve the API token
pub fn resolve_token(config: &Config) -> Result<Option<String>> {
    if let Ok(token) = env::var(&config.token_env) {
        let token = token.trim();
        if !token.is_empty() {
            debug!("Using token from ${}", config.token_env);
            return Ok(Some(token.to_string()));
        }
    }

    let Some(ref command) = config.token_command else {
        return Ok(None);
    };

    debug!("Running token_command");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .context("Failed to run token_command")?;

    // stdout may hold the token; never echo it
    if !output.status.success() {
        bail!("token_command exited with {}", output.status);
    }

    let token = String::from_utf8(output.stdout)
        .context("token_command printed invalid UTF-8")?
        .trim()
        .to_string();
    Ok(Some(token).filter(|t| !t.is_empty()))
}
