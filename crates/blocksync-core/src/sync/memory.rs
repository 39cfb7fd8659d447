//! In-memory block store for tests
//!
//! Simulates one remote container: inserts with no anchor land at the start,
//! created blocks get fresh `m<n>` ids, and every call is logged.

use std::collections::HashSet;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Mutex;

use crate::block::Block;
use crate::client::BlockStore;
use crate::error::{SyncError, SyncResult};

#[derive(Default)]
struct Inner {
    blocks: Vec<Block>,
    next_id: usize,
    calls: Vec<String>,
    failing: HashSet<String>,
    fail_fetch: bool,
}

/// Pauses `fetch_all_blocks` until the test lets it continue
struct FetchGate {
    entered: Sender<()>,
    release: Receiver<()>,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<Inner>,
    gate: Mutex<Option<FetchGate>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        let store = Self::new();
        store.inner.lock().unwrap().blocks = blocks;
        store
    }

    /// Make writes targeting `id` (block id or insert anchor) fail
    pub fn fail_on(self, id: &str) -> Self {
        self.inner.lock().unwrap().failing.insert(id.to_string());
        self
    }

    /// Make every fetch fail
    pub fn fail_fetch(self) -> Self {
        self.inner.lock().unwrap().fail_fetch = true;
        self
    }

    /// Signal `entered` on the next fetch, then wait for `release`
    pub fn with_fetch_gate(self, entered: Sender<()>, release: Receiver<()>) -> Self {
        *self.gate.lock().unwrap() = Some(FetchGate { entered, release });
        self
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.inner.lock().unwrap().blocks.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    fn log(&self, call: String) -> std::sync::MutexGuard<'_, Inner> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        inner
    }
}

fn not_found(id: &str) -> SyncError {
    SyncError::remote(404, &format!("block {} not found", id), None)
}

fn injected(id: &str) -> SyncError {
    SyncError::remote(500, &format!("injected failure for {}", id), None)
}

impl BlockStore for MemoryStore {
    fn fetch_all_blocks(&self, container_id: &str) -> SyncResult<Vec<Block>> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.send(()).unwrap();
            gate.release.recv().unwrap();
        }

        let inner = self.log(format!("fetch:{}", container_id));
        if inner.fail_fetch {
            return Err(SyncError::remote(503, "unavailable", None));
        }
        Ok(inner.blocks.clone())
    }

    fn update_block(&self, block_id: &str, block: &Block) -> SyncResult<()> {
        let mut inner = self.log(format!("update:{}", block_id));
        if inner.failing.contains(block_id) {
            return Err(injected(block_id));
        }
        let slot = inner
            .blocks
            .iter_mut()
            .find(|b| b.id.as_deref() == Some(block_id))
            .ok_or_else(|| not_found(block_id))?;
        slot.content = block.content.clone();
        Ok(())
    }

    fn delete_block(&self, block_id: &str) -> SyncResult<()> {
        let mut inner = self.log(format!("delete:{}", block_id));
        if inner.failing.contains(block_id) {
            return Err(injected(block_id));
        }
        let pos = inner
            .blocks
            .iter()
            .position(|b| b.id.as_deref() == Some(block_id))
            .ok_or_else(|| not_found(block_id))?;
        inner.blocks.remove(pos);
        Ok(())
    }

    fn append_children(
        &self,
        _parent_id: &str,
        children: &[Block],
        after: Option<&str>,
    ) -> SyncResult<Vec<String>> {
        let anchor = after.unwrap_or("start");
        let mut inner = self.log(format!("append:{}:{}", anchor, children.len()));
        if inner.failing.contains(anchor) {
            return Err(injected(anchor));
        }

        let mut pos = match after {
            Some(id) => {
                inner
                    .blocks
                    .iter()
                    .position(|b| b.id.as_deref() == Some(id))
                    .ok_or_else(|| not_found(id))?
                    + 1
            }
            None => 0,
        };

        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            inner.next_id += 1;
            let id = format!("m{}", inner.next_id);
            inner.blocks.insert(pos, child.clone().with_id(id.clone()));
            ids.push(id);
            pos += 1;
        }
        Ok(ids)
    }
}
