//! blocksync core library
//!
//! Keeps a remote block-structured document (a page made of ordered,
//! typed blocks) in step with local markdown content by computing a minimal
//! edit script and applying it through the remote API.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let executor = RequestExecutor::from_config(&config, Some(token))?;
//! let orchestrator = SyncOrchestrator::from_config(
//!     BlockStoreClient::new(executor),
//!     Markdown,
//!     &config,
//! );
//!
//! match orchestrator.sync(&page_id, &lines)? {
//!     SyncOutcome::Synced(report) => println!("{} changes", report.applied()),
//!     SyncOutcome::NothingToSync => {}
//! }
//! ```
//!
//! # Modules
//!
//! - `block`: block model and canonical strings
//! - `client`: request executor and remote block store
//! - `sync`: diff engine and per-document sync orchestrator
//! - `markdown`: local content parser and renderer
//! - `models`: page metadata and sync reports
//! - `config`: application configuration
//! - `error`: error types and credential redaction

pub mod block;
pub mod client;
pub mod config;
pub mod error;
pub mod markdown;
pub mod models;
pub mod sync;

pub use block::{Block, BlockContent, ImageSource, RichText};
pub use client::{BlockStore, BlockStoreClient, DebugLog, PageProgress, RequestExecutor, RequestTiming};
pub use config::Config;
pub use error::{redact, SyncError, SyncResult};
pub use markdown::{BlockParser, BlockRenderer, Markdown};
pub use models::{FailedOperation, OperationKind, PageMetadata, SyncReport};
pub use sync::{diff_blocks, Anchor, DiffResult, SyncOrchestrator, SyncOutcome};
