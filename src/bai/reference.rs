//! Per-reference index construction.

use log::debug;

use super::bin::{bin_of, candidate_bins, UNMAPPED_BIN};
use super::chunk::{merge_chunks, BinIndex, Chunk, ChunkAccumulator, MergePolicy};
use super::linear::{window_of, LinearIndexBuilder};
use crate::error::{BuildError, Result};
use crate::offset::VirtualOffset;
use crate::record::AlignmentRecord;

/// Summary counts of a reference, stored in the metadata pseudo-bin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceMetadata {
    /// Start offset of the first record on the reference
    pub start_offset: VirtualOffset,
    /// End offset of the last record on the reference
    pub end_offset: VirtualOffset,
    /// Number of mapped records
    pub n_mapped: u64,
    /// Number of unmapped records placed on the reference
    pub n_unmapped: u64,
}

/// Finished binning and linear index of one reference sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceIndex {
    /// Merged chunk lists keyed by bin
    pub bins: BinIndex,
    /// Minimum offset per 16 Kbp window
    pub linear: Vec<VirtualOffset>,
    /// Summary counts, `None` for references without records
    pub metadata: Option<ReferenceMetadata>,
}
impl ReferenceIndex {
    /// Checks if no record was indexed on this reference
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty() && self.linear.is_empty()
    }

    /// Lower bound on the offset of any record overlapping `position`
    ///
    /// Positions past the last window use the last window's offset.
    #[must_use]
    pub fn min_offset(&self, position: u32) -> VirtualOffset {
        let window = window_of(position);
        self.linear
            .get(window)
            .or_else(|| self.linear.last())
            .copied()
            .unwrap_or(VirtualOffset::ZERO)
    }

    /// Chunks that may hold records overlapping `[start, end)`, sorted and merged
    pub fn query(&self, start: u32, end: u32) -> Result<Vec<Chunk>> {
        let min_offset = self.min_offset(start);
        let mut chunks = Vec::new();
        for bin in candidate_bins(start, end)? {
            if let Some(bin_chunks) = self.bins.get(&bin) {
                chunks.extend(
                    bin_chunks
                        .iter()
                        .filter(|chunk| chunk.end > min_offset)
                        .copied(),
                );
            }
        }
        Ok(merge_chunks(chunks, MergePolicy::Adjacent))
    }
}

/// Lifecycle of a [`ReferenceIndexBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Closed,
}

/// Builds the index of one reference from its records in stream order
#[derive(Debug)]
pub struct ReferenceIndexBuilder {
    reference_id: usize,
    phase: Phase,
    chunks: ChunkAccumulator,
    linear: LinearIndexBuilder,
    last_position: Option<u32>,
    last_offset: Option<VirtualOffset>,
    metadata: Option<ReferenceMetadata>,
}
impl ReferenceIndexBuilder {
    #[must_use]
    pub fn new(reference_id: usize, policy: MergePolicy) -> Self {
        Self {
            reference_id,
            phase: Phase::Open,
            chunks: ChunkAccumulator::new(policy),
            linear: LinearIndexBuilder::new(),
            last_position: None,
            last_offset: None,
            metadata: None,
        }
    }

    #[must_use]
    pub fn reference_id(&self) -> usize {
        self.reference_id
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    fn ensure_open(&self) -> Result<()> {
        match self.phase {
            Phase::Open => Ok(()),
            Phase::Closed => Err(BuildError::ClosedBuilder(self.reference_id).into()),
        }
    }

    /// Checks the record against the previous one on this reference
    fn check_order(&self, record: &AlignmentRecord) -> Result<()> {
        if record.end_offset <= record.start_offset {
            return Err(BuildError::InvalidChunk {
                start: record.start_offset,
                end: record.end_offset,
            }
            .into());
        }
        if let Some(previous) = self.last_offset {
            if record.start_offset < previous {
                return Err(BuildError::OffsetOutOfOrder {
                    reference_id: self.reference_id,
                    offset: record.start_offset,
                    previous,
                }
                .into());
            }
        }
        if let (Some(previous), Some(position)) = (self.last_position, record.position()) {
            if position < previous {
                return Err(BuildError::RecordOutOfOrder {
                    reference_id: self.reference_id,
                    position,
                    previous,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Adds one record placed on this reference
    ///
    /// Mapped records are stored in the bin of their interval; unmapped records
    /// go to the [`UNMAPPED_BIN`] pseudo-bin.
    pub fn add_record(&mut self, record: &AlignmentRecord) -> Result<()> {
        self.ensure_open()?;
        self.check_order(record)?;

        let bin = if record.unmapped {
            UNMAPPED_BIN
        } else {
            let Some(interval) = record.interval else {
                return Err(BuildError::MissingInterval {
                    record: None,
                    reference_id: self.reference_id,
                }
                .into());
            };
            bin_of(interval.start(), interval.end())?
        };

        self.chunks
            .add_record(bin, record.start_offset, record.end_offset)?;
        if let Some(interval) = record.interval {
            self.linear
                .add_record(interval.start(), interval.effective_end(), record.start_offset);
            self.last_position = Some(interval.start());
        }
        self.last_offset = Some(record.start_offset);

        let metadata = self.metadata.get_or_insert(ReferenceMetadata {
            start_offset: record.start_offset,
            end_offset: record.end_offset,
            n_mapped: 0,
            n_unmapped: 0,
        });
        metadata.end_offset = record.end_offset;
        if record.unmapped {
            metadata.n_unmapped += 1;
        } else {
            metadata.n_mapped += 1;
        }
        Ok(())
    }

    /// Finalizes every touched bin and the linear index
    ///
    /// The builder rejects any further use afterwards.
    pub fn close(&mut self) -> Result<ReferenceIndex> {
        self.ensure_open()?;
        self.phase = Phase::Closed;

        let bins = self.chunks.finish()?;
        let linear = std::mem::take(&mut self.linear).finalize();
        debug!(
            "Closed reference {}: {} bins, {} windows, {} records",
            self.reference_id,
            bins.len(),
            linear.len(),
            self.metadata.map_or(0, |m| m.n_mapped + m.n_unmapped)
        );
        Ok(ReferenceIndex {
            bins,
            linear,
            metadata: self.metadata,
        })
    }
}
