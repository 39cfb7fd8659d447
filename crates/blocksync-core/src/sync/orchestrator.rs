//! Per-document sync runs
//!
//! A document is either idle or syncing. Entry is refused while a sync for
//! the same document is running, and within the debounce window after the
//! previous one started. The in-progress flag is cleared on every exit path.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::client::{BlockStore, DebugLog};
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::markdown::BlockParser;
use crate::models::{OperationKind, SyncReport};
use crate::sync::diff::{diff_blocks, Anchor, DiffResult};

/// Minimum time between two syncs of the same document
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Most blocks sent in one insert call
pub const INSERT_CHUNK_SIZE: usize = 100;

/// Sync bookkeeping for one document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentSyncState {
    pub in_progress: bool,
    /// When the last accepted sync started
    pub last_sync: Option<Instant>,
}

/// Result of a sync that was allowed to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The remote document was reconciled with the local content
    Synced(SyncReport),
    /// The local content produced no blocks; nothing was sent
    NothingToSync,
}

/// Runs syncs of local documents into a block store
pub struct SyncOrchestrator<S, P> {
    store: S,
    parser: P,
    debounce: Duration,
    chunk_size: usize,
    states: Mutex<HashMap<String, DocumentSyncState>>,
    debug_log: Option<DebugLog>,
}

impl<S: BlockStore, P: BlockParser> SyncOrchestrator<S, P> {
    pub fn new(store: S, parser: P) -> Self {
        Self {
            store,
            parser,
            debounce: DEFAULT_DEBOUNCE,
            chunk_size: INSERT_CHUNK_SIZE,
            states: Mutex::new(HashMap::new()),
            debug_log: None,
        }
    }

    /// Build an orchestrator using the debounce window from `config`
    pub fn from_config(store: S, parser: P, config: &Config) -> Self {
        Self::new(store, parser).with_debounce(config.debounce())
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Cap the number of blocks per insert call (at least one)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Request log to clear at the start of every sync
    pub fn with_debug_log(mut self, log: DebugLog) -> Self {
        self.debug_log = Some(log);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current bookkeeping for a document, if it was ever synced
    pub fn state(&self, document_id: &str) -> Option<DocumentSyncState> {
        self.lock_states().get(document_id).copied()
    }

    pub fn is_syncing(&self, document_id: &str) -> bool {
        self.state(document_id).is_some_and(|s| s.in_progress)
    }

    /// Sync `lines` into the remote document `document_id`
    ///
    /// Fails with `AlreadySyncing` or `TooSoon` without touching the remote
    /// store. Once started, individual write failures are collected in the
    /// report; only a failed fetch aborts the run.
    pub fn sync(&self, document_id: &str, lines: &[String]) -> SyncResult<SyncOutcome> {
        let _guard = self.begin(document_id)?;

        if let Some(log) = &self.debug_log {
            log.clear();
        }

        let desired = self.parser.parse(lines);
        if desired.is_empty() {
            info!("Nothing to sync for {}", document_id);
            return Ok(SyncOutcome::NothingToSync);
        }

        let existing = self.store.fetch_all_blocks(document_id)?;
        debug!(
            "Syncing {}: {} existing blocks, {} desired",
            document_id,
            existing.len(),
            desired.len()
        );

        let diff = diff_blocks(&existing, &desired);
        let report = self.apply(document_id, &diff);

        if report.is_complete() {
            info!(
                "Synced {}: {} updated, {} deleted, {} inserted, {} unchanged",
                document_id, report.updated, report.deleted, report.inserted, report.unchanged
            );
        } else {
            warn!(
                "Synced {} with {} failed operations",
                document_id,
                report.failures.len()
            );
        }
        Ok(SyncOutcome::Synced(report))
    }

    /// Apply updates, then deletes, then inserts, continuing past failures
    fn apply(&self, document_id: &str, diff: &DiffResult) -> SyncReport {
        let mut report = SyncReport {
            unchanged: diff.noop,
            ..SyncReport::default()
        };

        for update in &diff.updates {
            match self.store.update_block(&update.block_id, &update.block) {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    warn!("Update of {} failed: {}", update.block_id, e);
                    report.record_failure(OperationKind::Update, &update.block_id, 1, &e);
                }
            }
        }

        for block_id in &diff.deletes {
            match self.store.delete_block(block_id) {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!("Delete of {} failed: {}", block_id, e);
                    report.record_failure(OperationKind::Delete, block_id, 1, &e);
                }
            }
        }

        for batch in &diff.inserts {
            let mut anchor = batch.after.clone();
            for chunk in batch.children.chunks(self.chunk_size) {
                match self
                    .store
                    .append_children(document_id, chunk, anchor.block_id())
                {
                    Ok(ids) => {
                        report.inserted += chunk.len();
                        // the next chunk follows the last block just created
                        if let Some(last) = ids.last() {
                            anchor = Anchor::After(last.clone());
                        }
                    }
                    Err(e) => {
                        let target = anchor.block_id().unwrap_or("start").to_string();
                        warn!("Insert of {} blocks after {} failed: {}", chunk.len(), target, e);
                        report.record_failure(OperationKind::Insert, &target, chunk.len(), &e);
                    }
                }
            }
        }

        report
    }

    /// Enter the in-progress state for `document_id`
    fn begin(&self, document_id: &str) -> SyncResult<SyncGuard<'_>> {
        let mut states = self.lock_states();
        let state = states.entry(document_id.to_string()).or_default();

        if state.in_progress {
            debug!("Sync of {} refused: already in progress", document_id);
            return Err(SyncError::AlreadySyncing {
                document: document_id.to_string(),
            });
        }

        let now = Instant::now();
        if let Some(last) = state.last_sync {
            let elapsed = now.duration_since(last);
            if elapsed < self.debounce {
                let remaining_ms = (self.debounce - elapsed).as_millis().max(1) as u64;
                debug!("Sync of {} refused: {}ms left in window", document_id, remaining_ms);
                return Err(SyncError::TooSoon { remaining_ms });
            }
        }

        state.in_progress = true;
        state.last_sync = Some(now);

        Ok(SyncGuard {
            states: &self.states,
            document_id: document_id.to_string(),
        })
    }

    fn lock_states(&self) -> MutexGuard<'_, HashMap<String, DocumentSyncState>> {
        self.states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears the in-progress flag when a sync ends, however it ends
struct SyncGuard<'a> {
    states: &'a Mutex<HashMap<String, DocumentSyncState>>,
    document_id: String,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(state) = states.get_mut(&self.document_id) {
            state.in_progress = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, BlockContent, RichText};
    use crate::client::RequestTiming;
    use crate::markdown::Markdown;
    use crate::sync::memory::MemoryStore;
    use std::sync::mpsc;
    use std::thread;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(String::from).collect()
    }

    fn orchestrator(store: MemoryStore) -> SyncOrchestrator<MemoryStore, Markdown> {
        SyncOrchestrator::new(store, Markdown).with_debounce(Duration::ZERO)
    }

    fn synced(outcome: SyncOutcome) -> SyncReport {
        match outcome {
            SyncOutcome::Synced(report) => report,
            SyncOutcome::NothingToSync => panic!("expected a sync"),
        }
    }

    fn comparables(blocks: &[Block]) -> Vec<String> {
        blocks.iter().map(Block::comparable).collect()
    }

    #[test]
    fn test_appends_heading_after_matching_paragraph() {
        let store = MemoryStore::with_blocks(vec![Block::paragraph("hello").with_id("b1")]);
        let orch = orchestrator(store);

        let report = synced(orch.sync("doc", &lines("hello\n\n# world")).unwrap());

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.applied(), 1);
        assert_eq!(orch.store().calls(), vec!["fetch:doc", "append:b1:1"]);
        assert_eq!(
            comparables(&orch.store().blocks()),
            vec!["paragraph:hello", "heading_1:world"]
        );
    }

    #[test]
    fn test_empty_content_makes_no_remote_calls() {
        let orch = orchestrator(MemoryStore::with_blocks(vec![
            Block::paragraph("keep").with_id("b1")
        ]));

        let outcome = orch.sync("doc", &lines("\n   \n")).unwrap();

        assert_eq!(outcome, SyncOutcome::NothingToSync);
        assert!(orch.store().calls().is_empty());
        assert!(!orch.is_syncing("doc"));
    }

    #[test]
    fn test_debounce_window() {
        let orch = SyncOrchestrator::new(MemoryStore::new(), Markdown)
            .with_debounce(Duration::from_millis(200));

        orch.sync("doc", &lines("first")).unwrap();

        match orch.sync("doc", &lines("second")) {
            Err(SyncError::TooSoon { remaining_ms }) => {
                assert!(remaining_ms > 0 && remaining_ms <= 200)
            }
            other => panic!("expected TooSoon, got {:?}", other),
        }
        assert_eq!(orch.store().calls().len(), 2);

        thread::sleep(Duration::from_millis(250));
        orch.sync("doc", &lines("second")).unwrap();
        assert_eq!(comparables(&orch.store().blocks()), vec!["paragraph:second"]);
    }

    #[test]
    fn test_debounce_is_per_document() {
        let orch = SyncOrchestrator::new(MemoryStore::new(), Markdown)
            .with_debounce(Duration::from_secs(60));

        orch.sync("a", &lines("one")).unwrap();
        assert!(orch.sync("b", &lines("two")).is_ok());
        assert!(matches!(
            orch.sync("a", &lines("three")),
            Err(SyncError::TooSoon { .. })
        ));
    }

    #[test]
    fn test_concurrent_sync_is_refused_without_remote_calls() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = MemoryStore::new().with_fetch_gate(entered_tx, release_rx);
        let orch = orchestrator(store);
        let content = lines("hello");

        thread::scope(|s| {
            let first = s.spawn(|| orch.sync("doc", &content));
            entered_rx.recv().unwrap();
            assert!(orch.is_syncing("doc"));

            let err = orch.sync("doc", &content).unwrap_err();
            assert!(matches!(err, SyncError::AlreadySyncing { ref document } if document == "doc"));
            assert!(orch.store().calls().is_empty());

            release_tx.send(()).unwrap();
            let report = synced(first.join().unwrap().unwrap());
            assert_eq!(report.inserted, 1);
        });

        assert!(!orch.is_syncing("doc"));
    }

    #[test]
    fn test_lock_released_after_fetch_failure() {
        let orch = orchestrator(MemoryStore::new().fail_fetch());

        let err = orch.sync("doc", &lines("text")).unwrap_err();
        assert_eq!(err.status(), Some(503));

        let state = orch.state("doc").unwrap();
        assert!(!state.in_progress);
        assert!(state.last_sync.is_some());
        assert!(orch.sync("doc", &lines("text")).is_err());
    }

    #[test]
    fn test_large_insert_is_chunked_in_order() {
        let orch = orchestrator(MemoryStore::new());
        let content: Vec<String> = (0..250).map(|n| format!("line {}", n)).collect();

        let report = synced(orch.sync("doc", &content).unwrap());

        assert_eq!(report.inserted, 250);
        let calls = orch.store().calls();
        assert_eq!(
            calls,
            vec!["fetch:doc", "append:start:100", "append:m100:100", "append:m200:50"]
        );
        let expected: Vec<String> = (0..250).map(|n| format!("paragraph:line {}", n)).collect();
        assert_eq!(comparables(&orch.store().blocks()), expected);
    }

    #[test]
    fn test_custom_chunk_size() {
        let orch = orchestrator(MemoryStore::new()).with_chunk_size(2);

        synced(orch.sync("doc", &lines("a\nb\nc")).unwrap());

        assert_eq!(
            orch.store().calls(),
            vec!["fetch:doc", "append:start:2", "append:m2:1"]
        );
    }

    #[test]
    fn test_failures_do_not_stop_remaining_operations() {
        let store = MemoryStore::with_blocks(vec![
            Block::paragraph("one").with_id("b1"),
            Block::heading_1("gone").with_id("b2"),
            Block::todo("task", false).with_id("b3"),
        ])
        .fail_on("b2");
        let orch = orchestrator(store);

        let report = synced(orch.sync("doc", &lines("uno\n- [x] task\n- added")).unwrap());

        assert_eq!(report.updated, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, OperationKind::Delete);
        assert_eq!(report.failures[0].target, "b2");
        assert!(report.failures[0].error.contains("500"));
        assert_eq!(
            comparables(&orch.store().blocks()),
            vec![
                "paragraph:uno",
                "to_do:[x]task",
                "bulleted_list_item:added",
                "heading_1:gone"
            ]
        );
        assert!(!orch.is_syncing("doc"));
    }

    #[test]
    fn test_failed_update_does_not_block_inserts() {
        let store = MemoryStore::with_blocks(vec![
            Block::paragraph("one").with_id("b1"),
            Block::heading_1("keep").with_id("b2"),
        ])
        .fail_on("b1");
        let orch = orchestrator(store);

        let report = synced(orch.sync("doc", &lines("uno\n# keep\nend")).unwrap());

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, OperationKind::Update);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(
            comparables(&orch.store().blocks()),
            vec!["paragraph:one", "heading_1:keep", "paragraph:end"]
        );
    }

    #[test]
    fn test_failed_insert_chunk_keeps_anchor() {
        let store =
            MemoryStore::with_blocks(vec![Block::paragraph("a").with_id("b1")]).fail_on("b1");
        let orch = orchestrator(store).with_chunk_size(2);

        let report = synced(orch.sync("doc", &lines("a\nx\ny\nz")).unwrap());

        assert_eq!(report.inserted, 0);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().all(|f| f.kind == OperationKind::Insert));
        assert!(report.failures.iter().all(|f| f.target == "b1"));
        assert_eq!(report.failures[0].blocks, 2);
        assert_eq!(report.failures[1].blocks, 1);
    }

    #[test]
    fn test_debug_log_cleared_at_start() {
        let log = DebugLog::new();
        log.record(RequestTiming {
            method: "GET".into(),
            path: "/old".into(),
            attempt: 1,
            status: Some(200),
            elapsed_ms: 3,
        });
        let orch = orchestrator(MemoryStore::new()).with_debug_log(log.clone());

        orch.sync("doc", &lines("text")).unwrap();

        assert!(log.is_empty());
    }

    #[test]
    fn test_unchanged_document_makes_no_writes() {
        let store = MemoryStore::with_blocks(vec![
            Block::heading_1("Title").with_id("b1"),
            Block::new(BlockContent::Paragraph {
                text: vec![
                    RichText::plain("a "),
                    RichText {
                        bold: true,
                        ..RichText::plain("b")
                    },
                ],
            })
            .with_id("b2"),
        ]);
        let orch = orchestrator(store);

        let report = synced(orch.sync("doc", &lines("# Title\n\na **b**")).unwrap());

        assert_eq!(report.unchanged, 2);
        assert_eq!(report.applied(), 0);
        assert_eq!(orch.store().calls(), vec!["fetch:doc"]);
    }
}
