//! Chunk lists and their per-bin accumulation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{BuildError, Result};
use crate::offset::VirtualOffset;

/// A contiguous run `[start, end)` of the compressed stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Chunk {
    /// Virtual offset of the first record of the chunk
    pub start: VirtualOffset,
    /// Virtual offset just past the last record of the chunk
    pub end: VirtualOffset,
}
impl Chunk {
    #[must_use]
    pub fn new(start: VirtualOffset, end: VirtualOffset) -> Self {
        Self { start, end }
    }

    /// Checks if two chunks share at least one byte
    #[must_use]
    pub fn intersects(&self, other: &Chunk) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// When two chunks of the same bin are folded into one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Merge only chunks that touch or overlap
    Adjacent,
    /// Also merge when the next chunk starts in the compressed block the
    /// current one ends in
    ///
    /// Reading the gap costs nothing extra since the block is decompressed anyway.
    #[default]
    SameBlock,
}
impl MergePolicy {
    /// Checks if `next` (starting at or after `current.start`) folds into `current`
    #[must_use]
    pub fn can_merge(self, current: &Chunk, next: &Chunk) -> bool {
        match self {
            Self::Adjacent => next.start <= current.end,
            Self::SameBlock => next.start <= current.end || next.start.same_block(current.end),
        }
    }
}
impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adjacent" => Ok(Self::Adjacent),
            "same-block" | "same_block" | "sameblock" => Ok(Self::SameBlock),
            _ => Err(format!(
                "unknown merge policy '{s}' (expected adjacent or same-block)"
            )),
        }
    }
}
impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adjacent => write!(f, "adjacent"),
            Self::SameBlock => write!(f, "same-block"),
        }
    }
}

/// Sorts chunks by start and folds mergeable neighbours
///
/// Applying it to its own output returns the same list.
#[must_use]
pub fn merge_chunks(mut chunks: Vec<Chunk>, policy: MergePolicy) -> Vec<Chunk> {
    chunks.sort_unstable();
    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match merged.last_mut() {
            Some(current) if policy.can_merge(current, &chunk) => {
                current.end = current.end.max(chunk.end);
            }
            _ => merged.push(chunk),
        }
    }
    merged
}

/// Finished chunk lists keyed by bin, in ascending bin order
pub type BinIndex = BTreeMap<u32, Vec<Chunk>>;

/// Collects record chunks per bin while a reference is being indexed
#[derive(Debug, Default)]
pub struct ChunkAccumulator {
    policy: MergePolicy,
    raw: HashMap<u32, Vec<Chunk>>,
    finalized: HashSet<u32>,
}
impl ChunkAccumulator {
    #[must_use]
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Records that `[start, end)` holds a record stored in `bin`
    ///
    /// Records arrive in stream order, so a record continuing the bin's last
    /// chunk extends it in place instead of growing the list.
    pub fn add_record(&mut self, bin: u32, start: VirtualOffset, end: VirtualOffset) -> Result<()> {
        if self.finalized.contains(&bin) {
            return Err(BuildError::BinAlreadyFinalized(bin).into());
        }
        let chunk = Chunk::new(start, end);
        let chunks = self.raw.entry(bin).or_default();
        match chunks.last_mut() {
            Some(last) if last.start <= chunk.start && self.policy.can_merge(last, &chunk) => {
                last.end = last.end.max(chunk.end);
            }
            _ => chunks.push(chunk),
        }
        Ok(())
    }

    /// Bins that have received records and are not finalized yet, ascending
    #[must_use]
    pub fn pending_bins(&self) -> Vec<u32> {
        let mut bins: Vec<u32> = self.raw.keys().copied().collect();
        bins.sort_unstable();
        bins
    }

    /// Sorts and merges the chunks of `bin`, releasing its raw list
    pub fn finalize_bin(&mut self, bin: u32) -> Result<Vec<Chunk>> {
        if !self.finalized.insert(bin) {
            return Err(BuildError::BinAlreadyFinalized(bin).into());
        }
        let chunks = self.raw.remove(&bin).unwrap_or_default();
        Ok(merge_chunks(chunks, self.policy))
    }

    /// Finalizes every pending bin
    pub fn finish(&mut self) -> Result<BinIndex> {
        let mut index = BinIndex::new();
        for bin in self.pending_bins() {
            let chunks = self.finalize_bin(bin)?;
            index.insert(bin, chunks);
        }
        Ok(index)
    }
}
