//! Edit command handler

use anyhow::{Context, Result};

use blocksync_core::Config;

use super::pull::fetch_markdown;
use super::{connect, push::sync_lines};
use crate::editor::{content_lines, edit_text};
use crate::output::Output;

/// Open a page in $EDITOR and sync the edited markdown back
pub fn edit(config: &Config, page_id: &str, output: &Output) -> Result<()> {
    let client = connect(config)?;
    let (page, lines) = fetch_markdown(&client, page_id)?;

    let title = if page.title.is_empty() {
        "(untitled)"
    } else {
        page.title.as_str()
    };
    let initial = format!(
        "<!-- Editing: {} ({}) -->\n<!-- Lines starting with <!-- are ignored -->\n\n{}\n",
        title,
        page.id,
        lines.join("\n")
    );

    let edited = edit_text(&initial).context("Failed to edit page")?;
    let edited_lines = content_lines(&edited);

    if content_lines(&initial) == edited_lines {
        output.message("No changes.");
        return Ok(());
    }

    sync_lines(config, client, page_id, &edited_lines, output)
}
