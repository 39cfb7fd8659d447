//! List command handler

use anyhow::{Context, Result};

use blocksync_core::Config;

use super::{connect, report_timings};
use crate::output::Output;

/// List every page in the configured database
pub fn list(config: &Config, output: &Output) -> Result<()> {
    let database_id = config.require_database_id()?;
    let client = connect(config)?;

    let pages = client
        .fetch_all_pages(database_id, config.page_size, |progress| {
            output.progress(&format!(
                "Fetched {} pages ({} requests)...",
                progress.pages, progress.requests
            ));
        })
        .context("Failed to list pages")?;

    output.print_pages(&pages)?;
    report_timings(client.executor().debug_log(), output)
}
