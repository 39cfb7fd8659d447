//! Pull command handler

use anyhow::{Context, Result};

use blocksync_core::{BlockRenderer, BlockStore, BlockStoreClient, Config, Markdown, PageMetadata};

use super::{connect, report_timings};
use crate::output::Output;

/// Print a page as markdown
pub fn pull(config: &Config, page_id: &str, output: &Output) -> Result<()> {
    let client = connect(config)?;
    let (page, lines) = fetch_markdown(&client, page_id)?;

    output.print_markdown(&page, &lines)?;
    report_timings(client.executor().debug_log(), output)
}

/// Fetch page metadata and its content rendered as markdown lines
pub fn fetch_markdown(
    client: &BlockStoreClient,
    page_id: &str,
) -> Result<(PageMetadata, Vec<String>)> {
    let page = client
        .get_page(page_id)
        .with_context(|| format!("Failed to fetch page {}", page_id))?;
    let blocks = client
        .fetch_all_blocks(page_id)
        .with_context(|| format!("Failed to fetch content of {}", page_id))?;

    Ok((page, Markdown.render(&blocks)))
}
