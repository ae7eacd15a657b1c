//! Whole-file index: one [`ReferenceIndex`] per declared reference plus the
//! count of records placed on no reference.

use log::info;

use super::chunk::Chunk;
use super::reference::ReferenceIndex;
use crate::error::{BuildError, IndexError, Result};

/// Complete BAI index of an alignment file
///
/// References appear in header order. A reference that received no records is
/// present with no bins and no linear index.
///
/// # Examples
///
/// ```rust
/// use baidx::bai::{GlobalIndexBuilder, ReferenceIndex};
///
/// let mut builder = GlobalIndexBuilder::new(3);
/// builder.insert(1, ReferenceIndex::default()).unwrap();
/// builder.add_unmapped_no_coordinate();
///
/// let index = builder.finish();
/// assert_eq!(index.n_references(), 3);
/// assert_eq!(index.n_no_coor(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalIndex {
    references: Vec<ReferenceIndex>,
    n_no_coor: u64,
}
impl GlobalIndex {
    #[must_use]
    pub fn new(references: Vec<ReferenceIndex>, n_no_coor: u64) -> Self {
        Self {
            references,
            n_no_coor,
        }
    }

    /// Number of references covered by the index
    #[must_use]
    pub fn n_references(&self) -> usize {
        self.references.len()
    }

    /// Number of unplaced records (no reference, no position)
    #[must_use]
    pub fn n_no_coor(&self) -> u64 {
        self.n_no_coor
    }

    #[must_use]
    pub fn references(&self) -> &[ReferenceIndex] {
        &self.references
    }

    #[must_use]
    pub fn reference(&self, reference_id: usize) -> Option<&ReferenceIndex> {
        self.references.get(reference_id)
    }

    /// Chunks that may hold records overlapping `[start, end)` on a reference
    ///
    /// # Errors
    ///
    /// Fails with [`IndexError::UnknownReference`] if the reference is not
    /// covered by the index, or with an interval error if `end < start`.
    pub fn query(&self, reference_id: usize, start: u32, end: u32) -> Result<Vec<Chunk>> {
        let Some(reference) = self.reference(reference_id) else {
            return Err(IndexError::UnknownReference {
                reference_id,
                n_references: self.n_references(),
            }
            .into());
        };
        reference.query(start, end)
    }
}

/// Collects finished reference indexes and the unplaced record count
#[derive(Debug)]
pub struct GlobalIndexBuilder {
    slots: Vec<Option<ReferenceIndex>>,
    n_no_coor: u64,
}
impl GlobalIndexBuilder {
    /// Creates a builder with one empty slot per declared reference
    #[must_use]
    pub fn new(n_references: usize) -> Self {
        Self {
            slots: vec![None; n_references],
            n_no_coor: 0,
        }
    }

    #[must_use]
    pub fn n_references(&self) -> usize {
        self.slots.len()
    }

    /// Counts one record with neither reference nor position
    pub fn add_unmapped_no_coordinate(&mut self) {
        self.n_no_coor += 1;
    }

    /// Stores the finished index of `reference_id`
    pub fn insert(&mut self, reference_id: usize, reference: ReferenceIndex) -> Result<()> {
        let n_references = self.slots.len();
        let Some(slot) = self.slots.get_mut(reference_id) else {
            return Err(BuildError::UnknownReference {
                reference_id,
                n_references,
            }
            .into());
        };
        *slot = Some(reference);
        Ok(())
    }

    /// Produces the index; references never inserted become empty
    #[must_use]
    pub fn finish(self) -> GlobalIndex {
        let references: Vec<ReferenceIndex> = self
            .slots
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();
        info!(
            "Finished index: {} references ({} with records), {} unplaced records",
            references.len(),
            references.iter().filter(|r| !r.is_empty()).count(),
            self.n_no_coor
        );
        GlobalIndex::new(references, self.n_no_coor)
    }
}
