//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use anyhow::{Context, Result};
use serde::Serialize;

use blocksync_core::{PageMetadata, RequestTiming, SyncOutcome, SyncReport};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single page
    pub fn print_page(&self, page: &PageMetadata) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                println!("ID:      {}", page.id);
                println!("Title:   {}", display_title(&page.title));
                println!("URL:     {}", page.url);
                println!("Created: {}", page.created_at.format("%Y-%m-%d %H:%M"));
                println!("Edited:  {}", page.edited_at.format("%Y-%m-%d %H:%M"));
            }
            OutputFormat::Json => print_json(page)?,
            OutputFormat::Quiet => println!("{}", page.id),
        }
        Ok(())
    }

    /// Print a list of pages
    pub fn print_pages(&self, pages: &[PageMetadata]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if pages.is_empty() {
                    println!("No pages found.");
                    return Ok(());
                }
                for page in pages {
                    println!(
                        "{} | {} | {}",
                        page.id,
                        truncate(display_title(&page.title), 40),
                        page.edited_at.format("%Y-%m-%d %H:%M")
                    );
                }
                println!("\n{} page(s)", pages.len());
            }
            OutputFormat::Json => print_json(&pages)?,
            OutputFormat::Quiet => {
                for page in pages {
                    println!("{}", page.id);
                }
            }
        }
        Ok(())
    }

    /// Print a page rendered as markdown
    ///
    /// Quiet mode prints the markdown alone so it can be redirected to a file.
    pub fn print_markdown(&self, page: &PageMetadata, lines: &[String]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                println!("<!-- {} ({}) -->", display_title(&page.title), page.id);
                for line in lines {
                    println!("{}", line);
                }
            }
            OutputFormat::Json => print_json(&serde_json::json!({
                "page": page,
                "markdown": lines.join("\n"),
            }))?,
            OutputFormat::Quiet => {
                for line in lines {
                    println!("{}", line);
                }
            }
        }
        Ok(())
    }

    /// Print the outcome of a sync
    pub fn print_sync(&self, page_id: &str, outcome: &SyncOutcome) -> Result<()> {
        match (self.format, outcome) {
            (OutputFormat::Human, SyncOutcome::NothingToSync) => {
                println!("Nothing to sync: the content has no blocks.");
            }
            (OutputFormat::Human, SyncOutcome::Synced(report)) => {
                print_report(page_id, report);
            }
            (OutputFormat::Json, SyncOutcome::NothingToSync) => print_json(&serde_json::json!({
                "status": "nothing_to_sync",
                "page_id": page_id,
            }))?,
            (OutputFormat::Json, SyncOutcome::Synced(report)) => print_json(&serde_json::json!({
                "status": if report.is_complete() { "synced" } else { "partial" },
                "page_id": page_id,
                "report": report,
            }))?,
            (OutputFormat::Quiet, _) => {}
        }
        Ok(())
    }

    /// Print the request timing log
    pub fn print_timings(&self, timings: &[RequestTiming]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                eprintln!("── Requests ({}) ──", timings.len());
                for t in timings {
                    eprintln!(
                        "{:<6} {} #{} -> {} in {}ms",
                        t.method,
                        t.path,
                        t.attempt,
                        t.status
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "no response".to_string()),
                        t.elapsed_ms
                    );
                }
            }
            OutputFormat::Json => print_json(&serde_json::json!({ "requests": timings }))?,
            OutputFormat::Quiet => {}
        }
        Ok(())
    }

    /// Print a progress line to stderr
    pub fn progress(&self, msg: &str) {
        if self.format == OutputFormat::Human {
            eprintln!("{}", msg);
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an error to stderr, with a recovery hint when one is known
    pub fn error(&self, error: &anyhow::Error, hint: Option<&str>) {
        match self.format {
            OutputFormat::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "status": "error",
                        "message": format!("{:#}", error),
                        "hint": hint,
                    })
                );
            }
            _ => {
                eprintln!("Error: {:#}", error);
                if let Some(hint) = hint {
                    if !self.is_quiet() {
                        eprintln!("Hint: {}", hint);
                    }
                }
            }
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_report(page_id: &str, report: &SyncReport) {
    if report.applied() == 0 && report.is_complete() {
        println!("✓ {} is up to date ({} blocks)", page_id, report.unchanged);
        return;
    }

    println!(
        "{} {}: {} updated, {} deleted, {} inserted, {} unchanged",
        if report.is_complete() { "✓" } else { "⚠" },
        page_id,
        report.updated,
        report.deleted,
        report.inserted,
        report.unchanged
    );
    for failure in &report.failures {
        println!(
            "  failed {:?} {} ({} block(s)): {}",
            failure.kind, failure.target, failure.blocks, failure.error
        );
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn display_title(title: &str) -> &str {
    if title.is_empty() {
        "(untitled)"
    } else {
        title
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
