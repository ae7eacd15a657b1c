//! Alignment records as seen by the indexer, and the source that yields them.
//!
//! The indexer never decodes the record encoding itself: an [`AlignmentSource`]
//! hands over already-decoded [`AlignmentRecord`]s together with the virtual
//! offsets bracketing each record in the compressed stream.

use auto_impl::auto_impl;

use crate::error::{BoxError, IntervalError, Result};
use crate::offset::VirtualOffset;

/// A 0-based, half-open genomic interval `[start, end)` on one reference
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    start: u32,
    end: u32,
}
impl Interval {
    /// Creates a new interval
    ///
    /// A zero-length interval (`start == end`) is accepted and covers the single
    /// base at `start` for binning purposes.
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if end < start {
            return Err(IntervalError::InvalidInterval { start, end }.into());
        }
        Ok(Self { start, end })
    }

    /// Creates an interval covering the single base at `position`
    #[must_use]
    pub fn single(position: u32) -> Self {
        Self {
            start: position,
            end: position.saturating_add(1),
        }
    }

    #[must_use]
    pub fn start(&self) -> u32 {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> u32 {
        self.end
    }

    /// End coordinate with zero-length intervals widened to one base
    #[must_use]
    pub fn effective_end(&self) -> u32 {
        self.end.max(self.start.saturating_add(1))
    }

    /// Checks if the interval covers `position`
    #[must_use]
    pub fn contains(&self, position: u32) -> bool {
        self.start <= position && position < self.effective_end()
    }
}

/// A decoded alignment record reduced to what the indexer needs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlignmentRecord {
    /// Reference sequence the record is placed on (`None` for unplaced records)
    pub reference_id: Option<usize>,

    /// Aligned interval (`None` when the record has no position)
    ///
    /// Placed-but-unmapped records usually carry their mate's position here.
    pub interval: Option<Interval>,

    /// Whether the record's unmapped flag is set
    pub unmapped: bool,

    /// Virtual offset of the first byte of the record
    pub start_offset: VirtualOffset,

    /// Virtual offset of the first byte of the following record
    pub end_offset: VirtualOffset,
}
impl AlignmentRecord {
    /// A record aligned to `interval` on `reference_id`
    #[must_use]
    pub fn mapped(
        reference_id: usize,
        interval: Interval,
        start_offset: VirtualOffset,
        end_offset: VirtualOffset,
    ) -> Self {
        Self {
            reference_id: Some(reference_id),
            interval: Some(interval),
            unmapped: false,
            start_offset,
            end_offset,
        }
    }

    /// An unmapped record placed on `reference_id`, optionally at `position`
    #[must_use]
    pub fn placed_unmapped(
        reference_id: usize,
        position: Option<u32>,
        start_offset: VirtualOffset,
        end_offset: VirtualOffset,
    ) -> Self {
        Self {
            reference_id: Some(reference_id),
            interval: position.map(Interval::single),
            unmapped: true,
            start_offset,
            end_offset,
        }
    }

    /// An unmapped record with neither reference nor position
    #[must_use]
    pub fn unplaced(start_offset: VirtualOffset, end_offset: VirtualOffset) -> Self {
        Self {
            reference_id: None,
            interval: None,
            unmapped: true,
            start_offset,
            end_offset,
        }
    }

    /// Checks if the record has neither a reference nor a position
    #[must_use]
    pub fn is_unplaced(&self) -> bool {
        self.reference_id.is_none()
    }

    /// Position used for the sortedness check, if any
    #[must_use]
    pub fn position(&self) -> Option<u32> {
        self.interval.map(|interval| interval.start())
    }
}

/// A forward-only stream of decoded alignment records
///
/// Implementations report failures through the `Err` variant of
/// [`AlignmentSource::read_record`]; the indexer stops at the first one. An
/// [`std::io::Error`] of kind `InvalidData` or `UnexpectedEof`, or any non-I/O
/// error, is a decode error; other I/O kinds are failures of the input itself.
#[auto_impl(&mut, Box)]
pub trait AlignmentSource {
    /// Number of reference sequences declared in the input header
    fn n_references(&self) -> usize;

    /// Returns the next record, or `Ok(None)` once the stream is exhausted
    fn read_record(&mut self) -> std::result::Result<Option<AlignmentRecord>, BoxError>;
}

/// Adapts any iterator of fallible records into an [`AlignmentSource`]
///
/// # Examples
///
/// ```
/// use baidx::{AlignmentRecord, AlignmentSource, Interval, IterSource, VirtualOffset};
///
/// let record = AlignmentRecord::mapped(
///     0,
///     Interval::new(100, 200).unwrap(),
///     VirtualOffset::from(0),
///     VirtualOffset::from(40),
/// );
/// let mut source = IterSource::new(1, vec![Ok::<_, std::io::Error>(record)]);
/// assert_eq!(source.n_references(), 1);
/// assert_eq!(source.read_record().unwrap(), Some(record));
/// assert_eq!(source.read_record().unwrap(), None);
/// ```
pub struct IterSource<I> {
    n_references: usize,
    records: I,
}
impl<I> IterSource<I> {
    pub fn new<T>(n_references: usize, records: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            n_references,
            records: records.into_iter(),
        }
    }
}
impl<I, E> AlignmentSource for IterSource<I>
where
    I: Iterator<Item = std::result::Result<AlignmentRecord, E>>,
    E: Into<BoxError>,
{
    fn n_references(&self) -> usize {
        self.n_references
    }

    fn read_record(&mut self) -> std::result::Result<Option<AlignmentRecord>, BoxError> {
        self.records.next().transpose().map_err(Into::into)
    }
}
