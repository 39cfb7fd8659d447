//! Interactive editing support
//!
//! Opens the user's editor on a page's markdown and asks for confirmations.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};

/// Marker for lines that are dropped before the edited text is synced
const COMMENT_PREFIX: &str = "<!--";

/// Editors tried in order when neither $EDITOR nor $VISUAL is set
const FALLBACK_EDITORS: [&str; 5] = ["nano", "vim", "vi", "emacs", "notepad"];

/// Open markdown in the user's editor and return the saved text
///
/// The editor command may carry arguments, e.g. `EDITOR="code --wait"`.
pub fn edit_text(initial_content: &str) -> Result<String> {
    let editor = find_editor()?;
    let mut parts = editor.split_whitespace();
    let Some(program) = parts.next() else {
        bail!("Editor command is empty");
    };

    let mut file = tempfile::Builder::new()
        .prefix("blocksync-")
        .suffix(".md")
        .tempfile()
        .context("Failed to create temp file")?;
    file.write_all(initial_content.as_bytes())
        .context("Failed to write temp file")?;

    let status = Command::new(program)
        .args(parts)
        .arg(file.path())
        .status()
        .with_context(|| format!("Failed to run editor: {}", editor))?;

    if !status.success() {
        bail!(
            "Editor '{}' exited with {}. Check that your editor is configured correctly.",
            editor,
            status
        );
    }

    // Editors often replace the file rather than write in place
    fs::read_to_string(file.path())
        .with_context(|| format!("Failed to read edited file: {:?}", file.path()))
}

/// Split edited text into lines, dropping `<!-- ... -->` header lines
pub fn content_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim_start().starts_with(COMMENT_PREFIX))
        .map(String::from)
        .collect()
}

fn find_editor() -> Result<String> {
    let configured = ["EDITOR", "VISUAL"]
        .into_iter()
        .filter_map(|var| env::var(var).ok())
        .find(|value| !value.trim().is_empty());
    if let Some(editor) = configured {
        return Ok(editor);
    }

    match FALLBACK_EDITORS.into_iter().find(|e| command_exists(e)) {
        Some(editor) => Ok(editor.to_string()),
        None => bail!(
            "No editor found. Set $EDITOR environment variable.\n\
             Example: export EDITOR=nano"
        ),
    }
}

/// Whether an executable with this name is on PATH
fn command_exists(cmd: &str) -> bool {
    let Some(path) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&path).any(|dir| is_executable(&dir.join(cmd)))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

/// Ask a yes/no question on the terminal
///
/// Without a TTY on stdin the answer is always no.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
