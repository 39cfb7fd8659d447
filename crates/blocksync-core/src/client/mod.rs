//! Remote block store access
//!
//! ## Layers
//!
//! - `executor`: one HTTP call with auth, rate-limit retry and cursor handling
//! - `store`: paginated fetches, page CRUD and block writes built on top
//!
//! The sync orchestrator only depends on the [`BlockStore`] trait, so tests
//! can drive it against an in-memory store.

mod executor;
mod store;

pub use executor::{
    DebugLog, RequestExecutor, RequestTiming, DEFAULT_RETRY_AFTER, MAX_ATTEMPTS, VERSION_HEADER,
};
pub use store::{BlockStoreClient, PageProgress, MAX_NESTING_DEPTH, MAX_PAGE_REQUESTS, PROGRESS_EVERY};

use crate::block::Block;
use crate::error::SyncResult;

/// Block-level operations the sync orchestrator needs from a remote store
pub trait BlockStore {
    /// Fetch every live block under `container_id`, children inlined after
    /// their parent in reading order
    fn fetch_all_blocks(&self, container_id: &str) -> SyncResult<Vec<Block>>;

    /// Replace the content of an existing block in place
    fn update_block(&self, block_id: &str, block: &Block) -> SyncResult<()>;

    /// Remove an existing block
    fn delete_block(&self, block_id: &str) -> SyncResult<()>;

    /// Insert `children` under `parent_id` after the block `after`, or at the
    /// start of the container when `after` is `None`
    ///
    /// Returns the ids of the created blocks in order.
    fn append_children(
        &self,
        parent_id: &str,
        children: &[Block],
        after: Option<&str>,
    ) -> SyncResult<Vec<String>>;
}
