//! Push command handler

use std::path::Path;

use anyhow::{Context, Result};

use blocksync_core::{BlockStoreClient, Config, Markdown, SyncOrchestrator};

use super::{connect, read_lines, report_timings};
use crate::output::Output;

/// Sync a markdown file into a page
pub fn push(config: &Config, page_id: &str, file: &Path, output: &Output) -> Result<()> {
    let lines = read_lines(file)?;
    let client = connect(config)?;
    sync_lines(config, client, page_id, &lines, output)
}

/// Sync lines into a page and print the outcome
pub fn sync_lines(
    config: &Config,
    client: BlockStoreClient,
    page_id: &str,
    lines: &[String],
    output: &Output,
) -> Result<()> {
    let log = client.executor().debug_log().cloned();
    let mut orchestrator = SyncOrchestrator::from_config(client, Markdown, config);
    if let Some(log) = log {
        orchestrator = orchestrator.with_debug_log(log);
    }

    let outcome = orchestrator
        .sync(page_id, lines)
        .with_context(|| format!("Failed to sync {}", page_id))?;

    output.print_sync(page_id, &outcome)?;
    report_timings(orchestrator.store().executor().debug_log(), output)
}
