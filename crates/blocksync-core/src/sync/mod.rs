//! Reconciling local content with a remote document
//!
//! - `diff`: computes updates, deletes and anchored inserts between two
//!   block sequences
//! - `orchestrator`: guards each document against overlapping or too
//!   frequent syncs and applies a diff through a [`BlockStore`](crate::client::BlockStore)

pub mod diff;
mod orchestrator;

#[cfg(test)]
pub(crate) mod memory;

pub use diff::{diff_blocks, Anchor, BlockUpdate, DiffResult, InsertBatch};
pub use orchestrator::{
    DocumentSyncState, SyncOrchestrator, SyncOutcome, DEFAULT_DEBOUNCE, INSERT_CHUNK_SIZE,
};
