//! # BAI Format
//!
//! A BAI file indexes a coordinate-sorted BAM file so that the records
//! overlapping a genomic region can be located without reading the whole file.
//!
//! ## Overview
//!
//! For every reference sequence the index stores two structures:
//!
//! * **Binning index**: records are assigned to the smallest bin of a six-level
//!   hierarchy that fully contains them, and each bin lists the chunks of the
//!   compressed stream holding its records.
//!
//! * **Linear index**: for every 16 Kbp window, the lowest virtual offset of any
//!   record overlapping it. Queries use it to skip chunks that end before the
//!   first record that could overlap the region.
//!
//! Records with no reference and no position are only counted.
//!
//! ## File Structure
//!
//! ```text
//! ┌───────────────────┐
//! │ magic  "BAI\1"    │ 4 bytes
//! │ n_ref             │ i32
//! ├───────────────────┤
//! │ reference 0       │ bins, chunks, linear index
//! ├───────────────────┤
//! │ ...               │
//! ├───────────────────┤
//! │ reference n-1     │
//! ├───────────────────┤
//! │ n_no_coor         │ u64 (optional)
//! └───────────────────┘
//! ```
//!
//! All integers are little-endian.

mod bin;
mod chunk;
mod index;
mod linear;
mod reader;
mod reference;
mod writer;

/// Magic number opening every BAI file
pub const MAGIC: &[u8; 4] = b"BAI\x01";

pub use bin::{
    bin_of, bin_region, candidate_bins, BinLevel, LEVELS, MAX_BIN, MAX_COORDINATE, METADATA_BIN,
    UNMAPPED_BIN,
};
pub use chunk::{merge_chunks, BinIndex, Chunk, ChunkAccumulator, MergePolicy};
pub use index::{GlobalIndex, GlobalIndexBuilder};
pub use linear::{window_of, LinearIndexBuilder, WINDOW_SHIFT, WINDOW_SIZE};
pub use reference::{ReferenceIndex, ReferenceIndexBuilder, ReferenceMetadata};
pub use writer::{IndexFormat, IndexWriter, PendingIndexFile};
