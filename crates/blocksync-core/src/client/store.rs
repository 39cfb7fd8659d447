//! Block store client
//!
//! Paginated reads and page/block writes against the remote API.
//!
//! Pagination failures are local: a failed page is retried once, and if it
//! fails again the fetch stops there and returns what it already has.

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::executor::RequestExecutor;
use super::BlockStore;
use crate::block::Block;
use crate::error::{SyncError, SyncResult};
use crate::models::PageMetadata;

/// Upper bound on requests issued by one paginated listing
pub const MAX_PAGE_REQUESTS: usize = 100;

/// A progress notification is emitted every this many listing requests
pub const PROGRESS_EVERY: usize = 5;

/// Deepest level of nested children that is fetched (top level is 0)
pub const MAX_NESTING_DEPTH: usize = 16;

/// Most children accepted by one create or append call
const MAX_CHILDREN_PER_CALL: usize = 100;

/// Progress of a paginated page listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    /// Requests issued so far (retries included)
    pub requests: usize,
    /// Pages collected so far
    pub pages: usize,
}

/// One page of a paginated listing
#[derive(Debug, Default, Deserialize)]
struct Listing {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Client for the remote block store
pub struct BlockStoreClient {
    executor: RequestExecutor,
}

impl BlockStoreClient {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// The underlying request executor
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// List every page of a database
    ///
    /// Stops after [`MAX_PAGE_REQUESTS`] requests even if the remote keeps
    /// returning cursors. `progress` is called every [`PROGRESS_EVERY`]
    /// requests.
    pub fn fetch_all_pages<F>(
        &self,
        database_id: &str,
        page_size: usize,
        mut progress: F,
    ) -> SyncResult<Vec<PageMetadata>>
    where
        F: FnMut(PageProgress),
    {
        let path = format!("/databases/{}/query", database_id);
        let body = json!({ "page_size": page_size.clamp(1, 100) });

        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;
        let mut requests = 0;

        loop {
            if requests >= MAX_PAGE_REQUESTS {
                warn!(
                    "Stopping page listing of {} after {} requests",
                    database_id, requests
                );
                break;
            }

            let before = requests;
            let listing = self.list_with_retry(
                Method::POST,
                &path,
                Some(&body),
                cursor.as_deref(),
                &mut requests,
            );

            let listing = match listing {
                Ok(listing) => listing,
                Err(e @ SyncError::CredentialMissing) => return Err(e),
                Err(e) if pages.is_empty() => return Err(e),
                Err(e) => {
                    warn!("Giving up on remaining pages of {}: {}", database_id, e);
                    break;
                }
            };

            for raw in &listing.results {
                match PageMetadata::from_remote(raw) {
                    Ok(page) => pages.push(page),
                    Err(e) => warn!("Skipping undecodable page: {}", e),
                }
            }

            if requests / PROGRESS_EVERY > before / PROGRESS_EVERY {
                info!("Listed {} pages in {} requests", pages.len(), requests);
                progress(PageProgress {
                    requests,
                    pages: pages.len(),
                });
            }

            cursor = listing.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        Ok(pages)
    }

    /// Fetch page metadata
    pub fn get_page(&self, page_id: &str) -> SyncResult<PageMetadata> {
        let value = self
            .executor
            .execute(Method::GET, &format!("/pages/{}", page_id), None, None)?;
        PageMetadata::from_remote(&require_body(value, "page")?)
    }

    /// Create a page in a database with initial content
    ///
    /// Children beyond what one call accepts are appended afterwards.
    pub fn create_page(
        &self,
        database_id: &str,
        title: &str,
        children: &[Block],
    ) -> SyncResult<PageMetadata> {
        let split = children.len().min(MAX_CHILDREN_PER_CALL);
        let (first, rest) = children.split_at(split);

        let body = json!({
            "parent": { "database_id": database_id },
            "properties": title_property(title),
            "children": first.iter().map(Block::to_remote).collect::<Vec<_>>(),
        });
        let value = self.executor.execute(Method::POST, "/pages", Some(&body), None)?;
        let page = PageMetadata::from_remote(&require_body(value, "page")?)?;
        info!("Created page {} ({} blocks)", page.id, children.len());

        if !rest.is_empty() {
            let mut anchor: Option<String> = None;
            for chunk in rest.chunks(MAX_CHILDREN_PER_CALL) {
                let ids = self.append_blocks(&page.id, chunk, anchor.as_deref())?;
                anchor = ids.last().cloned().or(anchor);
            }
        }

        Ok(page)
    }

    /// Rename a page
    pub fn update_page_title(&self, page_id: &str, title: &str) -> SyncResult<()> {
        let body = json!({ "properties": title_property(title) });
        self.executor
            .execute(Method::PATCH, &format!("/pages/{}", page_id), Some(&body), None)?;
        Ok(())
    }

    /// Archive a page (the remote's form of deletion)
    pub fn archive_page(&self, page_id: &str) -> SyncResult<()> {
        let body = json!({ "archived": true });
        self.executor
            .execute(Method::PATCH, &format!("/pages/{}", page_id), Some(&body), None)?;
        info!("Archived page {}", page_id);
        Ok(())
    }

    /// Fetch all blocks below a container, depth-first
    ///
    /// Traversal uses an explicit stack; children nested deeper than
    /// [`MAX_NESTING_DEPTH`] are not fetched.
    fn fetch_tree(&self, container_id: &str) -> SyncResult<Vec<Block>> {
        let mut blocks = Vec::new();
        let top = self.fetch_children(container_id, true)?;
        let mut stack = vec![(top.into_iter(), 0usize)];

        loop {
            let Some((children, depth)) = stack.last_mut() else {
                break;
            };
            let depth = *depth;
            let Some(raw) = children.next() else {
                stack.pop();
                continue;
            };

            let block = Block::from_remote(&raw);
            let nested = raw
                .get("has_children")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let nested_id = block.id.clone();
            blocks.push(block);

            if let (true, Some(id)) = (nested, nested_id) {
                if depth >= MAX_NESTING_DEPTH {
                    warn!("Not fetching children of {}: nesting deeper than {}", id, depth);
                    continue;
                }
                let children = self.fetch_children(&id, false)?;
                stack.push((children.into_iter(), depth + 1));
            }
        }

        debug!("Fetched {} blocks under {}", blocks.len(), container_id);
        Ok(blocks)
    }

    /// Fetch the live direct children of one block or page
    ///
    /// For the top-level container a failure before any page arrived is an
    /// error; everywhere else failures degrade to the results gathered so far.
    fn fetch_children(&self, block_id: &str, top_level: bool) -> SyncResult<Vec<Value>> {
        let path = format!("/blocks/{}/children", block_id);
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;
        let mut requests = 0;

        while requests < MAX_PAGE_REQUESTS {
            let first_page = requests == 0;
            match self.list_with_retry(Method::GET, &path, None, cursor.as_deref(), &mut requests) {
                Ok(listing) => {
                    results.extend(listing.results.into_iter().filter(is_live));
                    cursor = listing.next_cursor;
                    if cursor.is_none() {
                        break;
                    }
                }
                Err(e @ SyncError::CredentialMissing) => return Err(e),
                Err(e) if top_level && first_page => return Err(e),
                Err(e) => {
                    warn!("Giving up on children of {} after retry: {}", block_id, e);
                    break;
                }
            }
        }

        Ok(results)
    }

    /// Fetch one listing page, retrying once on failure
    fn list_with_retry(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        cursor: Option<&str>,
        requests: &mut usize,
    ) -> SyncResult<Listing> {
        *requests += 1;
        match self.list_once(method.clone(), path, body, cursor) {
            Ok(listing) => Ok(listing),
            Err(e @ SyncError::CredentialMissing) => Err(e),
            Err(e) => {
                warn!("Fetching {} failed, retrying once: {}", path, e);
                *requests += 1;
                self.list_once(method, path, body, cursor)
            }
        }
    }

    fn list_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        cursor: Option<&str>,
    ) -> SyncResult<Listing> {
        let value = self.executor.execute(method, path, body, cursor)?;
        match value {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| SyncError::Decode(format!("listing {}: {}", path, e))),
            None => Ok(Listing::default()),
        }
    }

    fn append_blocks(
        &self,
        parent_id: &str,
        children: &[Block],
        after: Option<&str>,
    ) -> SyncResult<Vec<String>> {
        let mut body = json!({
            "children": children.iter().map(Block::to_remote).collect::<Vec<_>>(),
        });
        if let Some(after) = after {
            body["after"] = json!(after);
        }

        let value = self.executor.execute(
            Method::PATCH,
            &format!("/blocks/{}/children", parent_id),
            Some(&body),
            None,
        )?;

        let ids = value
            .as_ref()
            .and_then(|v| v.get("results"))
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .filter_map(|r| r.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }
}

impl BlockStore for BlockStoreClient {
    fn fetch_all_blocks(&self, container_id: &str) -> SyncResult<Vec<Block>> {
        self.fetch_tree(container_id)
    }

    fn update_block(&self, block_id: &str, block: &Block) -> SyncResult<()> {
        self.executor.execute(
            Method::PATCH,
            &format!("/blocks/{}", block_id),
            Some(&block.to_remote_update()),
            None,
        )?;
        Ok(())
    }

    fn delete_block(&self, block_id: &str) -> SyncResult<()> {
        self.executor
            .execute(Method::DELETE, &format!("/blocks/{}", block_id), None, None)?;
        Ok(())
    }

    fn append_children(
        &self,
        parent_id: &str,
        children: &[Block],
        after: Option<&str>,
    ) -> SyncResult<Vec<String>> {
        self.append_blocks(parent_id, children, after)
    }
}

/// Blocks that are archived or in the trash are treated as absent
fn is_live(raw: &Value) -> bool {
    let flag = |name: &str| raw.get(name).and_then(Value::as_bool).unwrap_or(false);
    !flag("archived") && !flag("in_trash")
}

fn title_property(title: &str) -> Value {
    json!({
        "title": {
            "title": [{ "type": "text", "text": { "content": title } }]
        }
    })
}

fn require_body(value: Option<Value>, what: &str) -> SyncResult<Value> {
    value.ok_or_else(|| SyncError::Decode(format!("empty response, expected {}", what)))
}
