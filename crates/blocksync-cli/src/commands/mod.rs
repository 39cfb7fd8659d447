//! Command handlers

pub mod archive;
pub mod config;
pub mod create;
pub mod edit;
pub mod list;
pub mod pull;
pub mod push;
pub mod rename;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use blocksync_core::{BlockStoreClient, Config, DebugLog, RequestExecutor};

use crate::credential::resolve_token;
use crate::output::Output;

/// Build a block store client from configuration
///
/// Request timing is recorded when `config.debug` is set.
pub fn connect(config: &Config) -> Result<BlockStoreClient> {
    let token = resolve_token(config)?;
    let executor =
        RequestExecutor::from_config(config, token).context("Failed to create HTTP client")?;
    Ok(BlockStoreClient::new(executor))
}

/// Read a markdown file as lines
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    Ok(content.lines().map(String::from).collect())
}

/// Print recorded request timings, if any
pub fn report_timings(log: Option<&DebugLog>, output: &Output) -> Result<()> {
    match log {
        Some(log) if !log.is_empty() => output.print_timings(&log.entries()),
        _ => Ok(()),
    }
}
