//! Request executor
//!
//! Performs one logical call against the remote API: attaches the bearer
//! token and version header, retries rate-limited responses, threads the
//! pagination cursor, and classifies failures into [`SyncError`].

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{SyncError, SyncResult};

/// Version header name expected by the remote API
pub const VERSION_HEADER: &str = "Notion-Version";

/// Attempts per logical request (first try included)
pub const MAX_ATTEMPTS: u32 = 3;

/// Wait used when a 429 response carries no usable retry hint
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Longest wait honored from a retry hint
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Timing of one request attempt
#[derive(Debug, Clone, Serialize)]
pub struct RequestTiming {
    pub method: String,
    pub path: String,
    pub attempt: u32,
    /// HTTP status, or `None` if the attempt never got a response
    pub status: Option<u16>,
    pub elapsed_ms: u128,
}

/// Append-only request timing log shared with the caller
///
/// Cloning yields another handle onto the same log.
#[derive(Debug, Clone, Default)]
pub struct DebugLog {
    entries: Arc<Mutex<Vec<RequestTiming>>>,
}

impl DebugLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, timing: RequestTiming) {
        self.lock().push(timing);
    }

    /// Snapshot of all recorded timings, oldest first
    pub fn entries(&self) -> Vec<RequestTiming> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RequestTiming>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// HTTP call wrapper for the remote block API
pub struct RequestExecutor {
    http: Client,
    base_url: String,
    api_version: String,
    token: Option<String>,
    max_attempts: u32,
    debug_log: Option<DebugLog>,
}

impl RequestExecutor {
    /// Create an executor against `base_url`
    ///
    /// A missing token is accepted here; every request then fails with
    /// [`SyncError::CredentialMissing`] before touching the network.
    pub fn new(
        base_url: impl Into<String>,
        api_version: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> SyncResult<Self> {
        let token = token.filter(|t| !t.trim().is_empty());
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("blocksync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::transport(&e, token.as_deref()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_version: api_version.into(),
            token,
            max_attempts: MAX_ATTEMPTS,
            debug_log: None,
        })
    }

    /// Create an executor from configuration
    pub fn from_config(config: &Config, token: Option<String>) -> SyncResult<Self> {
        let executor = Self::new(
            &config.api_base_url,
            &config.api_version,
            token,
            Duration::from_secs(config.request_timeout_secs),
        )?;

        Ok(if config.debug {
            executor.with_debug_log(DebugLog::new())
        } else {
            executor
        })
    }

    /// Record per-attempt timings into `log`
    pub fn with_debug_log(mut self, log: DebugLog) -> Self {
        self.debug_log = Some(log);
        self
    }

    /// Override the number of attempts for rate-limited requests
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// The debug log, if timing is enabled
    pub fn debug_log(&self) -> Option<&DebugLog> {
        self.debug_log.as_ref()
    }

    /// The credential, for callers that need to scrub their own messages
    pub fn secret(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Perform one logical request
    ///
    /// `cursor` is sent as `start_cursor`: in the JSON body for POST, as a
    /// query parameter otherwise. Returns `None` for an empty response body.
    pub fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        cursor: Option<&str>,
    ) -> SyncResult<Option<Value>> {
        let token = self.token.as_deref().ok_or(SyncError::CredentialMissing)?;

        let url = format!("{}{}", self.base_url, path);
        let body = request_body(&method, body, cursor);
        let query_cursor = if method == Method::POST { None } else { cursor };

        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(token)
                .header(VERSION_HEADER, &self.api_version);
            if let Some(cursor) = query_cursor {
                request = request.query(&[("start_cursor", cursor)]);
            }
            if let Some(ref body) = body {
                request = request.json(body);
            }

            match self.send(request, &method, path, attempt) {
                Err(SyncError::RateLimited { retry_after }) if attempt < self.max_attempts => {
                    warn!(
                        "Rate limited on {} {} (attempt {}/{}), retrying in {:?}",
                        method, path, attempt, self.max_attempts, retry_after
                    );
                    thread::sleep(retry_after);
                }
                other => return other,
            }
        }
    }

    /// Send one attempt and classify the response
    fn send(
        &self,
        request: RequestBuilder,
        method: &Method,
        path: &str,
        attempt: u32,
    ) -> SyncResult<Option<Value>> {
        let secret = self.secret();
        let started = Instant::now();
        let result = request.send();
        let status = result.as_ref().ok().map(|r| r.status().as_u16());
        self.record(method, path, attempt, status, started.elapsed());

        let response = result.map_err(|e| SyncError::transport(&e, secret))?;
        let status = response.status();
        let retry_after = parse_retry_after(
            response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
        );
        let text = response
            .text()
            .map_err(|e| SyncError::transport(&e, secret))?;

        debug!("{} {} -> {} ({} bytes)", method, path, status, text.len());

        if status == StatusCode::TOO_MANY_REQUESTS {
            if attempt < self.max_attempts {
                return Err(SyncError::RateLimited { retry_after });
            }
            return Err(SyncError::remote(status.as_u16(), &text, secret));
        }

        if !status.is_success() {
            return Err(SyncError::remote(status.as_u16(), &text, secret));
        }

        if text.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| SyncError::Decode(format!("{} {}: {}", method, path, e)))
    }

    fn record(
        &self,
        method: &Method,
        path: &str,
        attempt: u32,
        status: Option<u16>,
        elapsed: Duration,
    ) {
        if let Some(ref log) = self.debug_log {
            log.record(RequestTiming {
                method: method.to_string(),
                path: path.to_string(),
                attempt,
                status,
                elapsed_ms: elapsed.as_millis(),
            });
        }
    }
}

/// Build the JSON body for a request, folding in the cursor for POST
fn request_body(method: &Method, body: Option<&Value>, cursor: Option<&str>) -> Option<Value> {
    match (method == Method::POST, cursor) {
        (true, Some(cursor)) => {
            let mut object = match body {
                Some(Value::Object(map)) => map.clone(),
                _ => Map::new(),
            };
            object.insert("start_cursor".to_string(), Value::String(cursor.to_string()));
            Some(Value::Object(object))
        }
        _ => body.cloned(),
    }
}

/// Parse a `Retry-After` value given in (possibly fractional) seconds
///
/// Hints that are not a representable duration fall back to
/// [`DEFAULT_RETRY_AFTER`]; the rest are capped at [`MAX_RETRY_AFTER`].
fn parse_retry_after(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .map(|wait| wait.min(MAX_RETRY_AFTER))
        .unwrap_or(DEFAULT_RETRY_AFTER)
}
