use std::error::Error as StdError;

use crate::offset::VirtualOffset;

/// Boxed error type used to carry the cause reported by an alignment source
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Custom Result type for indexing operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the library, encompassing all possible error cases
/// that can occur while building, writing, or reading a BAI index.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to virtual offset encoding
    OffsetError(#[from] OffsetError),
    /// Errors related to genomic intervals and binning
    IntervalError(#[from] IntervalError),
    /// Errors raised while accumulating records into the index
    BuildError(#[from] BuildError),
    /// The alignment source failed to decode a record
    DecodeError(#[from] DecodeError),
    /// Errors raised while parsing an existing index
    IndexError(#[from] IndexError),
    /// Standard I/O errors from the source or the sink
    IoError(#[from] std::io::Error),
}
impl Error {
    /// Checks if the error originates from a record the source could not decode
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::DecodeError(_))
    }

    /// Checks if the error is a sortedness violation of the input
    #[must_use]
    pub fn is_unsorted(&self) -> bool {
        matches!(
            self,
            Self::BuildError(
                BuildError::UnsortedInput { .. }
                    | BuildError::RecordOutOfOrder { .. }
                    | BuildError::OffsetOutOfOrder { .. }
            )
        )
    }

    /// Checks if the error rejects a record that cannot be binned as it is
    ///
    /// Only raised under [`crate::ValidationStringency::Strict`].
    #[must_use]
    pub fn is_invalid_record(&self) -> bool {
        matches!(
            self,
            Self::BuildError(BuildError::MissingInterval { .. })
                | Self::IntervalError(IntervalError::ExceedsMaximum { .. })
        )
    }

    /// Checks if the error is a plain I/O failure
    #[must_use]
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::IoError(_))
    }
}

/// Errors raised when composing a virtual offset
#[derive(thiserror::Error, Debug)]
pub enum OffsetError {
    /// The block start does not fit in 48 bits or the in-block offset does not fit in 16 bits
    #[error("Invalid virtual offset: block start {block_start} (max 2^48 - 1), in-block offset {in_block_offset} (max 65535)")]
    InvalidOffset {
        block_start: u64,
        in_block_offset: usize,
    },
}

/// Errors raised by the bin calculator
#[derive(thiserror::Error, Debug)]
pub enum IntervalError {
    /// The interval ends before it starts
    #[error("Invalid interval: end ({end}) precedes start ({start})")]
    InvalidInterval { start: u32, end: u32 },

    /// The interval reaches past the largest coordinate a BAI index can address
    #[error("Interval [{start}, {end}) exceeds the maximum indexable coordinate ({max})")]
    ExceedsMaximum { start: u32, end: u32, max: u32 },
}

/// Errors raised while feeding records into the index builders
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// A record starts before the previous record on the same reference
    #[error("Record out of order on reference {reference_id}: position {position} follows position {previous}")]
    RecordOutOfOrder {
        reference_id: usize,
        position: u32,
        previous: u32,
    },

    /// A record's virtual offset precedes the previous record's offset
    #[error("Record out of order on reference {reference_id}: offset {offset} follows offset {previous}")]
    OffsetOutOfOrder {
        reference_id: usize,
        offset: VirtualOffset,
        previous: VirtualOffset,
    },

    /// Reference ids decrease, or a placed record follows an unplaced one
    #[error("Unsorted input: {found} follows {previous}")]
    UnsortedInput { previous: String, found: String },

    /// The reference builder has already been closed
    #[error("Reference index builder for reference {0} is closed")]
    ClosedBuilder(usize),

    /// The bin has already been finalized
    #[error("Bin {0} has already been finalized")]
    BinAlreadyFinalized(u32),

    /// The record's end offset does not follow its start offset
    #[error("Invalid chunk: end offset {end} does not follow start offset {start}")]
    InvalidChunk {
        start: VirtualOffset,
        end: VirtualOffset,
    },

    /// The record names a reference the header does not declare
    #[error("Reference id {reference_id} is out of range for a header declaring {n_references} references")]
    UnknownReference {
        reference_id: usize,
        n_references: usize,
    },

    /// A mapped record carries no alignment interval
    #[error("Record{} is mapped to reference {reference_id} but has no alignment position", .record.map(|r| format!(" {r}")).unwrap_or_default())]
    MissingInterval {
        /// 1-based record number, when the stream position is known
        record: Option<u64>,
        reference_id: usize,
    },
}

/// A record could not be decoded by the alignment source
#[derive(thiserror::Error, Debug)]
#[error("Could not decode record {record}{}: {source}", .offset.as_ref().map(|o| format!(" at offset {o}")).unwrap_or_default())]
pub struct DecodeError {
    /// 1-based number of the record that failed
    pub record: u64,
    /// Virtual offset at which the record starts, if known
    pub offset: Option<VirtualOffset>,
    /// The error reported by the source
    #[source]
    pub source: BoxError,
}

/// Errors raised while parsing a serialized index
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// The magic number does not spell "BAI\1"
    #[error("Invalid magic number: {0:?}")]
    InvalidMagic([u8; 4]),

    /// A count field holds a negative value
    #[error("Invalid {field} count: {value}")]
    NegativeCount { field: &'static str, value: i32 },

    /// A bin id lies outside the binning scheme
    #[error("Invalid bin id: {0}")]
    InvalidBin(u32),

    /// The stream ends partway through the trailing unplaced count
    #[error("Truncated unplaced record count: {0} of 8 bytes")]
    TruncatedTrailer(usize),

    /// A query names a reference the index does not contain
    #[error("Reference id {reference_id} is out of range for an index of {n_references} references")]
    UnknownReference {
        reference_id: usize,
        n_references: usize,
    },
}
