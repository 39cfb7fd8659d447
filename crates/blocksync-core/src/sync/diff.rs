//! Block diff engine
//!
//! Reconciles the blocks currently stored remotely (`existing`, each with an
//! id) against the blocks parsed from local content (`desired`, no ids).
//!
//! ## Algorithm
//!
//! Two pointers walk both sequences:
//! 1. Equal canonical strings: nothing to do, the existing block becomes the
//!    anchor.
//! 2. Same type, different content: update the existing block in place; it
//!    becomes the anchor.
//! 3. Otherwise find the nearest pair `(k, l)` with equal canonical strings,
//!    preferring the fewest existing-side skips, then the fewest desired-side
//!    skips. Delete `existing[i..k]`, insert `desired[j..l]` after the anchor
//!    and continue from `(k, l)`. With no such pair, everything left on both
//!    sides is replaced.
//!
//! Applying updates, then deletes, then inserts turns `existing` into
//! `desired`. Anchors are always blocks that survive (matched or updated),
//! so deletes never invalidate an insert position.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::block::Block;

/// Position a batch of new blocks is inserted at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Before every other block of the document
    Start,
    /// Directly after the block with this id
    After(String),
}

impl Anchor {
    /// Id to insert after, `None` for the start of the document
    pub fn block_id(&self) -> Option<&str> {
        match self {
            Anchor::Start => None,
            Anchor::After(id) => Some(id),
        }
    }

    fn from_last_stable(last: &Option<String>) -> Self {
        match last {
            Some(id) => Anchor::After(id.clone()),
            None => Anchor::Start,
        }
    }
}

/// In-place replacement of an existing block's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockUpdate {
    pub block_id: String,
    pub block: Block,
}

/// Ordered run of new blocks inserted at one anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertBatch {
    pub after: Anchor,
    pub children: Vec<Block>,
}

/// Operations that turn one block sequence into another
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub updates: Vec<BlockUpdate>,
    pub deletes: Vec<String>,
    pub inserts: Vec<InsertBatch>,
    /// Blocks left untouched (diagnostic only)
    pub noop: usize,
}

impl DiffResult {
    /// Check if no remote write is needed
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.deletes.is_empty() && self.inserts.is_empty()
    }

    /// Total number of blocks carried by insert batches
    pub fn inserted_blocks(&self) -> usize {
        self.inserts.iter().map(|b| b.children.len()).sum()
    }
}

/// Compute the operations turning `existing` into `desired`
pub fn diff_blocks(existing: &[Block], desired: &[Block]) -> DiffResult {
    let old_keys: Vec<String> = existing.iter().map(Block::comparable).collect();
    let new_keys: Vec<String> = desired.iter().map(Block::comparable).collect();
    let index = KeyIndex::new(&new_keys);

    let mut result = DiffResult::default();
    let mut last_stable: Option<String> = None;
    let (mut i, mut j) = (0, 0);

    while i < existing.len() && j < desired.len() {
        if old_keys[i] == new_keys[j] {
            result.noop += 1;
            last_stable = Some(block_id(&existing[i]));
            i += 1;
            j += 1;
            continue;
        }

        if existing[i].type_name() == desired[j].type_name() {
            let id = block_id(&existing[i]);
            result.updates.push(BlockUpdate {
                block_id: id.clone(),
                block: desired[j].clone(),
            });
            last_stable = Some(id);
            i += 1;
            j += 1;
            continue;
        }

        let Some((k, l)) = find_resync(&old_keys, &index, i, j) else {
            // no common block ahead: the leftover handling below replaces
            // both tails
            break;
        };

        result
            .deletes
            .extend(existing[i..k].iter().map(block_id));
        if l > j {
            result.inserts.push(InsertBatch {
                after: Anchor::from_last_stable(&last_stable),
                children: desired[j..l].to_vec(),
            });
        }
        i = k;
        j = l;
    }

    result
        .deletes
        .extend(existing[i..].iter().map(block_id));
    if j < desired.len() {
        result.inserts.push(InsertBatch {
            after: Anchor::from_last_stable(&last_stable),
            children: desired[j..].to_vec(),
        });
    }

    debug!(
        "Diff: {} updates, {} deletes, {} inserts in {} batches, {} unchanged",
        result.updates.len(),
        result.deletes.len(),
        result.inserted_blocks(),
        result.inserts.len(),
        result.noop
    );
    result
}

/// Positions of each canonical string in the desired sequence, ascending
struct KeyIndex<'a> {
    positions: HashMap<&'a str, Vec<usize>>,
}

impl<'a> KeyIndex<'a> {
    fn new(keys: &'a [String]) -> Self {
        let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
        for (pos, key) in keys.iter().enumerate() {
            positions.entry(key.as_str()).or_default().push(pos);
        }
        Self { positions }
    }

    /// First position `>= from` holding `key`
    fn first_at_or_after(&self, key: &str, from: usize) -> Option<usize> {
        let positions = self.positions.get(key)?;
        let idx = positions.partition_point(|&p| p < from);
        positions.get(idx).copied()
    }
}

/// Nearest resynchronization point at or after `(i, j)`
///
/// Scans `k` upward from `i`; for each `k` takes the smallest `l >= j`
/// whose canonical string matches. The first hit wins.
fn find_resync(
    old_keys: &[String],
    index: &KeyIndex<'_>,
    i: usize,
    j: usize,
) -> Option<(usize, usize)> {
    (i..old_keys.len()).find_map(|k| {
        index
            .first_at_or_after(&old_keys[k], j)
            .map(|l| (k, l))
    })
}

fn block_id(block: &Block) -> String {
    block.id.clone().unwrap_or_default()
}
