//! Single-pass construction of a BAI index from a sorted record stream.
//!
//! The [`Indexer`] pulls records from an [`AlignmentSource`] in file order,
//! routes each one to the builder of its reference, and closes that builder as
//! soon as the stream moves on to the next reference.
//!
//! ```rust
//! use baidx::{AlignmentRecord, IndexerBuilder, Interval, IterSource, VirtualOffset};
//!
//! let voff = |raw: u64| VirtualOffset::from(raw);
//! let records = vec![
//!     AlignmentRecord::mapped(0, Interval::new(100, 200).unwrap(), voff(0), voff(100)),
//!     AlignmentRecord::mapped(0, Interval::new(150, 250).unwrap(), voff(100), voff(200)),
//!     AlignmentRecord::unplaced(voff(200), voff(300)),
//! ];
//! let source = IterSource::new(2, records.into_iter().map(Ok::<_, std::io::Error>));
//!
//! let index = IndexerBuilder::default().build().build(source).unwrap();
//! assert_eq!(index.n_references(), 2);
//! assert_eq!(index.n_no_coor(), 1);
//! assert!(index.references()[1].is_empty());
//! ```

use std::io::{self, Write};
use std::path::Path;

use log::{debug, info};

use crate::bai::{
    GlobalIndex, GlobalIndexBuilder, IndexFormat, IndexWriter, MergePolicy, PendingIndexFile,
    ReferenceIndexBuilder, MAX_COORDINATE,
};
use crate::error::{BoxError, BuildError, DecodeError, Error, IntervalError, Result};
use crate::offset::VirtualOffset;
use crate::policy::ValidationStringency;
use crate::record::{AlignmentRecord, AlignmentSource};

/// A builder for configured [`Indexer`] instances
///
/// # Examples
///
/// ```rust
/// use baidx::{IndexerBuilder, MergePolicy, ValidationStringency};
///
/// let indexer = IndexerBuilder::default()
///     .stringency(ValidationStringency::Lenient)
///     .merge_policy(MergePolicy::Adjacent)
///     .build();
/// assert_eq!(indexer.stringency(), ValidationStringency::Lenient);
/// ```
#[derive(Debug, Default)]
pub struct IndexerBuilder {
    /// Treatment of inconsistent records
    stringency: Option<ValidationStringency>,
    /// Chunk merging within a bin
    merge_policy: Option<MergePolicy>,
}
impl IndexerBuilder {
    #[must_use]
    pub fn stringency(mut self, stringency: ValidationStringency) -> Self {
        self.stringency = Some(stringency);
        self
    }

    #[must_use]
    pub fn merge_policy(mut self, merge_policy: MergePolicy) -> Self {
        self.merge_policy = Some(merge_policy);
        self
    }

    /// Builds the indexer, using defaults for anything left unset
    #[must_use]
    pub fn build(self) -> Indexer {
        Indexer {
            stringency: self.stringency.unwrap_or_default(),
            merge_policy: self.merge_policy.unwrap_or_default(),
        }
    }
}

/// Drives index construction over an [`AlignmentSource`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Indexer {
    stringency: ValidationStringency,
    merge_policy: MergePolicy,
}
impl Indexer {
    #[must_use]
    pub fn new(stringency: ValidationStringency, merge_policy: MergePolicy) -> Self {
        Self {
            stringency,
            merge_policy,
        }
    }

    #[must_use]
    pub fn stringency(&self) -> ValidationStringency {
        self.stringency
    }

    #[must_use]
    pub fn merge_policy(&self) -> MergePolicy {
        self.merge_policy
    }

    /// Reads the whole stream and returns its index
    ///
    /// # Errors
    ///
    /// Stops at the first record the source fails to decode, at the first
    /// ordering violation, and (under [`ValidationStringency::Strict`]) at the
    /// first inconsistent record.
    pub fn build<S: AlignmentSource>(&self, mut source: S) -> Result<GlobalIndex> {
        let n_references = source.n_references();
        let mut global = GlobalIndexBuilder::new(n_references);
        let mut current: Option<ReferenceIndexBuilder> = None;
        let mut seen_unplaced = false;
        let mut next_offset: Option<VirtualOffset> = None;
        let mut n_records = 0u64;

        loop {
            let number = n_records + 1;
            let record = match source.read_record() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(source) => return Err(read_failure(number, next_offset, source)),
            };
            n_records = number;
            next_offset = Some(record.end_offset);

            let Some(reference_id) = record.reference_id else {
                seen_unplaced = true;
                global.add_unmapped_no_coordinate();
                continue;
            };
            if seen_unplaced {
                return Err(BuildError::UnsortedInput {
                    previous: "unplaced records".to_string(),
                    found: format!("record {number} on reference {reference_id}"),
                }
                .into());
            }
            if reference_id >= n_references {
                return Err(BuildError::UnknownReference {
                    reference_id,
                    n_references,
                }
                .into());
            }

            let builder = match current.take() {
                Some(builder) if builder.reference_id() == reference_id => builder,
                Some(builder) if builder.reference_id() > reference_id => {
                    return Err(BuildError::UnsortedInput {
                        previous: format!("reference {}", builder.reference_id()),
                        found: format!("record {number} on reference {reference_id}"),
                    }
                    .into());
                }
                previous => {
                    if let Some(mut builder) = previous {
                        global.insert(builder.reference_id(), builder.close()?)?;
                    }
                    debug!("Opened reference {reference_id} at record {number}");
                    ReferenceIndexBuilder::new(reference_id, self.merge_policy)
                }
            };
            let builder = current.insert(builder);

            let record = self.validate(number, reference_id, record)?;
            builder.add_record(&record)?;
        }

        if let Some(mut builder) = current {
            global.insert(builder.reference_id(), builder.close()?)?;
        }
        info!("Indexed {n_records} records");
        Ok(global.finish())
    }

    /// Applies the stringency to records that cannot be binned as they are
    ///
    /// Returns the record to index, re-placed as unmapped when it was accepted
    /// despite the inconsistency.
    fn validate(
        &self,
        number: u64,
        reference_id: usize,
        record: AlignmentRecord,
    ) -> Result<AlignmentRecord> {
        let issue: Option<Error> = match record.interval {
            None if !record.unmapped => Some(
                BuildError::MissingInterval {
                    record: Some(number),
                    reference_id,
                }
                .into(),
            ),
            Some(interval) if interval.effective_end() > MAX_COORDINATE => Some(
                IntervalError::ExceedsMaximum {
                    start: interval.start(),
                    end: interval.end(),
                    max: MAX_COORDINATE,
                }
                .into(),
            ),
            _ => None,
        };
        let Some(issue) = issue else {
            return Ok(record);
        };
        self.stringency.handle(number, issue)?;
        Ok(AlignmentRecord::placed_unmapped(
            reference_id,
            record.position().filter(|&position| position < MAX_COORDINATE),
            record.start_offset,
            record.end_offset,
        ))
    }

    /// Builds the index, then serializes it to `writer`
    ///
    /// Nothing is written unless construction succeeds.
    pub fn index_to_writer<S, W>(&self, source: S, writer: W, format: IndexFormat) -> Result<GlobalIndex>
    where
        S: AlignmentSource,
        W: Write,
    {
        let index = self.build(source)?;
        let mut writer = IndexWriter::new(writer, format);
        writer.write(&index)?;
        writer.flush()?;
        Ok(index)
    }

    /// Builds the index and saves it to `path`
    ///
    /// The destination is only created once the index has been fully built and
    /// written; on failure no file is left at `path`.
    pub fn index_to_path<S, P>(&self, source: S, path: P, format: IndexFormat) -> Result<GlobalIndex>
    where
        S: AlignmentSource,
        P: AsRef<Path>,
    {
        let pending = PendingIndexFile::create(path)?;
        let index = self.build(source)?;
        pending.commit(&index, format)?;
        Ok(index)
    }
}

/// Sorts a source failure into a decode error or a plain I/O error
///
/// Malformed or truncated records surface as `InvalidData` or `UnexpectedEof`;
/// any other I/O kind is a failure of the input itself.
fn read_failure(record: u64, offset: Option<VirtualOffset>, source: BoxError) -> Error {
    match source.downcast::<io::Error>() {
        Ok(err)
            if !matches!(
                err.kind(),
                io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
            ) =>
        {
            Error::IoError(*err)
        }
        Ok(err) => DecodeError {
            record,
            offset,
            source: err,
        }
        .into(),
        Err(source) => DecodeError {
            record,
            offset,
            source,
        }
        .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bai::{METADATA_BIN, UNMAPPED_BIN};
    use crate::record::{Interval, IterSource};

    /// Assigns consecutive 100-byte slots to each record
    fn with_offsets(records: Vec<(Option<usize>, Option<(u32, u32)>, bool)>) -> Vec<AlignmentRecord> {
        records
            .into_iter()
            .enumerate()
            .map(|(i, (reference_id, interval, unmapped))| AlignmentRecord {
                reference_id,
                interval: interval.map(|(start, end)| Interval::new(start, end).unwrap()),
                unmapped,
                start_offset: VirtualOffset::from(i as u64 * 100),
                end_offset: VirtualOffset::from((i as u64 + 1) * 100),
            })
            .collect()
    }

    fn source(
        n_references: usize,
        records: Vec<AlignmentRecord>,
    ) -> IterSource<impl Iterator<Item = std::result::Result<AlignmentRecord, std::io::Error>>> {
        IterSource::new(n_references, records.into_iter().map(Ok))
    }

    #[test]
    fn test_references_in_order() -> Result<()> {
        let records = with_offsets(vec![
            (Some(0), Some((100, 200)), false),
            (Some(0), Some((300, 400)), false),
            (Some(2), Some((50, 60)), false),
            (Some(2), Some((70, 80)), true),
            (None, None, true),
            (None, None, true),
        ]);
        let index = Indexer::default().build(source(4, records))?;

        assert_eq!(index.n_references(), 4);
        assert_eq!(index.n_no_coor(), 2);
        assert!(!index.references()[0].is_empty());
        assert!(index.references()[1].is_empty());
        assert!(index.references()[3].is_empty());

        let reference = &index.references()[2];
        assert!(reference.bins.contains_key(&UNMAPPED_BIN));
        let metadata = reference.metadata.unwrap();
        assert_eq!((metadata.n_mapped, metadata.n_unmapped), (1, 1));
        Ok(())
    }

    #[test]
    fn test_decreasing_reference() {
        let records = with_offsets(vec![
            (Some(1), Some((100, 200)), false),
            (Some(0), Some((100, 200)), false),
        ]);
        let err = Indexer::default().build(source(2, records)).unwrap_err();
        assert!(err.is_unsorted());
    }

    #[test]
    fn test_placed_after_unplaced() {
        let records = with_offsets(vec![
            (None, None, true),
            (Some(0), Some((100, 200)), false),
        ]);
        let err = Indexer::default().build(source(1, records)).unwrap_err();
        assert!(matches!(
            err,
            Error::BuildError(BuildError::UnsortedInput { .. })
        ));
    }

    #[test]
    fn test_unknown_reference() {
        let records = with_offsets(vec![(Some(3), Some((100, 200)), false)]);
        let err = Indexer::default().build(source(2, records)).unwrap_err();
        assert!(matches!(
            err,
            Error::BuildError(BuildError::UnknownReference {
                reference_id: 3,
                n_references: 2
            })
        ));
    }

    #[test]
    fn test_decode_error_reports_record() {
        let records = with_offsets(vec![
            (Some(0), Some((100, 200)), false),
            (Some(0), Some((150, 250)), false),
        ]);
        let stream = records
            .into_iter()
            .map(Ok)
            .chain(std::iter::once(Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "truncated record",
            ))));
        let err = Indexer::default()
            .build(IterSource::new(1, stream))
            .unwrap_err();
        let decode = match err {
            Error::DecodeError(decode) => decode,
            other => panic!("expected a decode error, got {other}"),
        };
        assert_eq!(decode.record, 3);
        assert_eq!(decode.offset, Some(VirtualOffset::from(200)));
    }

    #[test]
    fn test_input_io_failure() {
        let records = with_offsets(vec![(Some(0), Some((100, 200)), false)]);
        let stream = records
            .into_iter()
            .map(Ok)
            .chain(std::iter::once(Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "input vanished",
            ))));
        let err = Indexer::default()
            .build(IterSource::new(1, stream))
            .unwrap_err();
        assert!(err.is_io_error());
        assert!(!err.is_decode_error());
    }

    #[test]
    fn test_truncated_record_is_decode_error() {
        let stream = std::iter::once(Err::<AlignmentRecord, _>(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "record cut short",
        )));
        let err = Indexer::default()
            .build(IterSource::new(1, stream))
            .unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_missing_interval_stringency() -> Result<()> {
        let records = with_offsets(vec![
            (Some(0), Some((100, 200)), false),
            (Some(0), None, false),
        ]);

        let strict = Indexer::default().build(source(1, records.clone()));
        assert!(matches!(
            strict,
            Err(Error::BuildError(BuildError::MissingInterval {
                record: Some(2),
                ..
            }))
        ));

        for stringency in [ValidationStringency::Lenient, ValidationStringency::Silent] {
            let index = IndexerBuilder::default()
                .stringency(stringency)
                .build()
                .build(source(1, records.clone()))?;
            let reference = &index.references()[0];
            assert_eq!(
                reference.bins[&UNMAPPED_BIN],
                vec![crate::bai::Chunk::new(
                    VirtualOffset::from(100),
                    VirtualOffset::from(200)
                )]
            );
            assert_eq!(reference.metadata.unwrap().n_unmapped, 1);
        }
        Ok(())
    }

    #[test]
    fn test_exceeds_maximum_stringency() -> Result<()> {
        let records = with_offsets(vec![(Some(0), Some((MAX_COORDINATE - 10, MAX_COORDINATE + 10)), false)]);

        let strict = Indexer::default().build(source(1, records.clone()));
        assert!(matches!(
            strict,
            Err(Error::IntervalError(IntervalError::ExceedsMaximum { .. }))
        ));

        let index = IndexerBuilder::default()
            .stringency(ValidationStringency::Lenient)
            .build()
            .build(source(1, records))?;
        let reference = &index.references()[0];
        assert_eq!(reference.bins.keys().copied().collect::<Vec<_>>(), vec![UNMAPPED_BIN]);
        assert!(!reference.bins.contains_key(&METADATA_BIN));
        Ok(())
    }

    #[test]
    fn test_index_to_writer() -> Result<()> {
        let records = with_offsets(vec![(Some(0), Some((100, 200)), false)]);
        let mut buffer = Vec::new();
        let index = Indexer::default().index_to_writer(
            source(1, records),
            &mut buffer,
            IndexFormat::EXTENDED,
        )?;
        assert_eq!(GlobalIndex::read_from(&mut buffer.as_slice())?, index);
        Ok(())
    }
}
