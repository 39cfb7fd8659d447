//! Data models for blocksync
//!
//! Defines page metadata as listed from the remote store and the report
//! produced by a sync run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SyncError, SyncResult};

/// Metadata of a remote page
///
/// Immutable once fetched; refresh by fetching again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageMetadata {
    /// Remote identifier
    pub id: String,
    /// Plain-text title (empty if the page has none)
    pub title: String,
    /// Canonical url of the page
    pub url: String,
    /// When the page was created
    pub created_at: DateTime<Utc>,
    /// When the page was last edited
    pub edited_at: DateTime<Utc>,
}

/// Raw page object as returned by the remote API
#[derive(Debug, Deserialize)]
struct RawPage {
    id: String,
    #[serde(default)]
    url: String,
    created_time: DateTime<Utc>,
    last_edited_time: DateTime<Utc>,
    #[serde(default)]
    properties: Map<String, Value>,
}

impl PageMetadata {
    /// Decode a page object
    pub fn from_remote(value: &Value) -> SyncResult<Self> {
        let raw: RawPage = serde_json::from_value(value.clone())
            .map_err(|e| SyncError::Decode(format!("page object: {}", e)))?;

        let title = raw
            .properties
            .values()
            .find(|p| p.get("type").and_then(Value::as_str) == Some("title"))
            .and_then(|p| p.get("title"))
            .and_then(Value::as_array)
            .map(|spans| {
                spans
                    .iter()
                    .filter_map(|s| s.get("plain_text").and_then(Value::as_str))
                    .collect::<String>()
            })
            .unwrap_or_default();

        Ok(Self {
            id: raw.id,
            title,
            url: raw.url,
            created_at: raw.created_time,
            edited_at: raw.last_edited_time,
        })
    }
}

/// Kind of remote write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Update,
    Delete,
    Insert,
}

/// A write that did not apply during a sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedOperation {
    pub kind: OperationKind,
    /// Block id for updates and deletes, anchor for inserts
    pub target: String,
    /// Number of blocks the operation carried
    pub blocks: usize,
    /// Redacted error message
    pub error: String,
}

/// Outcome counts of one sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub updated: usize,
    pub deleted: usize,
    pub inserted: usize,
    pub unchanged: usize,
    pub failures: Vec<FailedOperation>,
}

impl SyncReport {
    /// Check if every planned operation applied
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of remote writes that applied
    pub fn applied(&self) -> usize {
        self.updated + self.deleted + self.inserted
    }

    pub(crate) fn record_failure(
        &mut self,
        kind: OperationKind,
        target: &str,
        blocks: usize,
        error: &SyncError,
    ) {
        self.failures.push(FailedOperation {
            kind,
            target: target.to_string(),
            blocks,
            error: error.to_string(),
        });
    }
}
