//! Rename command handler

use anyhow::{bail, Context, Result};

use blocksync_core::Config;

use super::connect;
use crate::output::Output;

/// Change the title of a page
pub fn rename(config: &Config, page_id: &str, title: &str, output: &Output) -> Result<()> {
    if title.trim().is_empty() {
        bail!("Title cannot be empty");
    }

    let client = connect(config)?;
    client
        .update_page_title(page_id, title)
        .with_context(|| format!("Failed to rename page {}", page_id))?;

    output.success(&format!("Renamed {} to \"{}\"", page_id, title));
    Ok(())
}
