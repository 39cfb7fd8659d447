//! Archive command handler

use anyhow::{Context, Result};

use blocksync_core::Config;

use super::connect;
use crate::editor::confirm;
use crate::output::Output;

/// Archive a page after confirmation
pub fn archive(config: &Config, page_id: &str, yes: bool, output: &Output) -> Result<()> {
    let client = connect(config)?;

    if !yes && output.should_prompt() {
        let page = client
            .get_page(page_id)
            .with_context(|| format!("Failed to fetch page {}", page_id))?;
        let prompt = format!("Archive \"{}\" ({})?", page.title, page.id);
        if !confirm(&prompt)? {
            output.message("Cancelled.");
            return Ok(());
        }
    }

    client
        .archive_page(page_id)
        .with_context(|| format!("Failed to archive page {}", page_id))?;

    output.success(&format!("Archived page {}", page_id));
    Ok(())
}
