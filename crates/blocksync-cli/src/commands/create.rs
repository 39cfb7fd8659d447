//! Create command handler

use std::path::Path;

use anyhow::{Context, Result};

use blocksync_core::{BlockParser, Config, Markdown};

use super::{connect, read_lines, report_timings};
use crate::output::Output;

/// Create a page in the configured database
pub fn create(config: &Config, title: &str, file: Option<&Path>, output: &Output) -> Result<()> {
    let database_id = config.require_database_id()?;

    let children = match file {
        Some(path) => Markdown.parse(&read_lines(path)?),
        None => Vec::new(),
    };

    let client = connect(config)?;
    let page = client
        .create_page(database_id, title, &children)
        .context("Failed to create page")?;

    output.success(&format!("Created page {} ({} blocks)", page.id, children.len()));
    output.print_page(&page)?;
    report_timings(client.executor().debug_log(), output)
}
