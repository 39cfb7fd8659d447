//! Sync error handling
//!
//! Provides typed errors for remote calls and sync runs. Every error that
//! carries text received from the remote side is built through [`redact`],
//! so a credential never reaches a log line or a terminal.

use std::time::Duration;
use thiserror::Error;

/// Marker substituted for secret material
pub const REDACTED: &str = "[REDACTED]";

/// Errors that can occur while talking to the remote store or running a sync
#[derive(Error, Debug)]
pub enum SyncError {
    /// No bearer token was available; no request was attempted
    #[error("No API token available. Set the token environment variable or configure token_command.")]
    CredentialMissing,

    /// A required configuration value is not set
    #[error("Missing configuration value '{0}'")]
    ConfigMissing(&'static str),

    /// The remote answered with a non-success status
    #[error("Remote API returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    /// The remote answered with a body that is not valid JSON
    #[error("Failed to decode remote response: {0}")]
    Decode(String),

    /// Rate limited; retried internally by the request executor
    #[error("Rate limited by remote API, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The request never produced a response (connect failure, timeout)
    #[error("Request failed: {0}")]
    Transport(String),

    /// A sync for this document is already running
    #[error("A sync for '{document}' is already in progress")]
    AlreadySyncing { document: String },

    /// The previous sync for this document finished too recently
    #[error("Sync requested too soon, try again in {remaining_ms}ms")]
    TooSoon { remaining_ms: u64 },
}

impl SyncError {
    /// Build a remote error, scrubbing the credential out of the body
    pub fn remote(status: u16, body: &str, secret: Option<&str>) -> Self {
        SyncError::Remote {
            status,
            body: redact(body.trim(), secret),
        }
    }

    /// Build a transport error, scrubbing the credential out of the message
    pub fn transport(error: &reqwest::Error, secret: Option<&str>) -> Self {
        SyncError::Transport(redact(&error.to_string(), secret))
    }

    /// HTTP status of a remote error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if retrying the same call later could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::RateLimited { .. }
            | SyncError::Transport(_)
            | SyncError::AlreadySyncing { .. }
            | SyncError::TooSoon { .. } => true,
            SyncError::Remote { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            SyncError::CredentialMissing => {
                Some("Export your integration token (default variable NOTION_TOKEN) or set token_command in the config file.")
            }
            SyncError::ConfigMissing(_) => Some("Set the value with `blocksync config set <key> <value>`."),
            SyncError::Remote { status: 401, .. } => Some("Check that the API token is valid."),
            SyncError::Remote { status: 404, .. } => {
                Some("Check the id and that the page or database is shared with the integration.")
            }
            SyncError::Transport(_) => Some("Check your network connection and the api_base_url setting."),
            _ => None,
        }
    }
}

/// Replace every occurrence of `secret` (bare or as `Bearer <secret>`) in `text`
///
/// An absent or empty secret leaves the text untouched.
pub fn redact(text: &str, secret: Option<&str>) -> String {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return text.to_string();
    };

    text.replace(&format!("Bearer {}", secret), &format!("Bearer {}", REDACTED))
        .replace(secret, REDACTED)
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
