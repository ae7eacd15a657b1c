//! # baidx
//!
//! Single-pass construction of BAI indexes for coordinate-sorted alignment files.
//!
//! The crate is split into the index format itself ([`bai`]) and the driver that
//! builds it from a stream of records ([`Indexer`]). Record decoding stays
//! outside the crate: any [`AlignmentSource`] yielding [`AlignmentRecord`]s with
//! their virtual offsets can be indexed.
//!
//! ```rust
//! use baidx::{AlignmentRecord, IndexFormat, Indexer, Interval, IterSource, VirtualOffset};
//!
//! let record = AlignmentRecord::mapped(
//!     0,
//!     Interval::new(1_000, 1_150).unwrap(),
//!     VirtualOffset::encode(0, 0).unwrap(),
//!     VirtualOffset::encode(0, 310).unwrap(),
//! );
//! let source = IterSource::new(1, vec![Ok::<_, std::io::Error>(record)]);
//!
//! let mut buffer = Vec::new();
//! Indexer::default()
//!     .index_to_writer(source, &mut buffer, IndexFormat::default())
//!     .unwrap();
//! assert_eq!(&buffer[..4], b"BAI\x01");
//! ```

pub mod bai;
mod error;
mod indexer;
mod offset;
mod policy;
mod record;

pub use bai::{GlobalIndex, IndexFormat, MergePolicy};
pub use error::{
    BoxError, BuildError, DecodeError, Error, IndexError, IntervalError, OffsetError, Result,
};
pub use indexer::{Indexer, IndexerBuilder};
pub use offset::VirtualOffset;
pub use policy::ValidationStringency;
pub use record::{AlignmentRecord, AlignmentSource, Interval, IterSource};

#[cfg(test)]
mod testing {

    use super::*;
    use anyhow::Result;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    /// Uncompressed payload carried by one simulated compressed block
    const BLOCK_PAYLOAD: u64 = 65_280;

    /// Compressed size of one simulated block
    const BLOCK_SIZE: u64 = 21_000;

    /// Lays records out back to back in a simulated compressed stream
    struct StreamLayout {
        position: u64,
    }
    impl StreamLayout {
        fn new() -> Self {
            Self { position: 0 }
        }

        fn offset(&self) -> VirtualOffset {
            let block = self.position / BLOCK_PAYLOAD;
            let within = (self.position % BLOCK_PAYLOAD) as usize;
            VirtualOffset::encode(block * BLOCK_SIZE, within).unwrap()
        }

        /// Reserves `len` bytes and returns the bracketing offsets
        fn reserve(&mut self, len: u64) -> (VirtualOffset, VirtualOffset) {
            let start = self.offset();
            self.position += len;
            (start, self.offset())
        }
    }

    fn source_of(
        n_references: usize,
        records: Vec<AlignmentRecord>,
    ) -> IterSource<impl Iterator<Item = std::result::Result<AlignmentRecord, std::io::Error>>> {
        IterSource::new(n_references, records.into_iter().map(Ok))
    }

    #[test]
    fn test_three_references() -> Result<()> {
        let mut layout = StreamLayout::new();
        let (s0, e0) = layout.reserve(300);
        let (s1, e1) = layout.reserve(280);
        let (s2, e2) = layout.reserve(120);
        let records = vec![
            AlignmentRecord::mapped(0, Interval::new(1_000, 1_150)?, s0, e0),
            AlignmentRecord::mapped(0, Interval::new(1_100, 1_250)?, s1, e1),
            AlignmentRecord::placed_unmapped(2, Some(5_000), s2, e2),
        ];

        let mut buffer = Vec::new();
        let index = Indexer::default().index_to_writer(
            source_of(3, records),
            &mut buffer,
            IndexFormat::EXTENDED,
        )?;

        assert_eq!(buffer[4..8], 3i32.to_le_bytes());
        assert_eq!(index.n_references(), 3);

        let reference = &index.references()[0];
        assert_eq!(reference.bins.len(), 1);
        assert_eq!(reference.bins[&4681], vec![bai::Chunk::new(s0, e1)]);

        let empty = &index.references()[1];
        assert!(empty.bins.is_empty());
        assert!(empty.linear.is_empty());

        let unmapped = &index.references()[2];
        assert_eq!(
            unmapped.bins.keys().copied().collect::<Vec<_>>(),
            vec![bai::UNMAPPED_BIN]
        );

        assert_eq!(GlobalIndex::read_from(&mut buffer.as_slice())?, index);
        Ok(())
    }

    #[test]
    fn test_linear_bound_over_50mb() -> Result<()> {
        const SPAN: u32 = 50_000_000;
        const QUERY: u32 = 25_000_000;

        let mut rng = SmallRng::seed_from_u64(42);
        let mut starts: Vec<u32> = (0..999)
            .map(|_| rng.random_range(0..SPAN - 1_000_000))
            .collect();
        starts.sort_unstable();

        let mut layout = StreamLayout::new();
        let mut records = Vec::with_capacity(1000);
        for start in starts {
            let len = rng.random_range(50..=40_000);
            let (s, e) = layout.reserve(rng.random_range(150..600));
            records.push(AlignmentRecord::mapped(0, Interval::new(start, start + len)?, s, e));
        }
        // the last record reaches the end of the span
        let (s, e) = layout.reserve(400);
        records.push(AlignmentRecord::mapped(0, Interval::new(SPAN - 1_000, SPAN)?, s, e));

        let index = Indexer::default().build(source_of(1, records.clone()))?;
        let reference = &index.references()[0];
        assert_eq!(reference.linear.len(), SPAN.div_ceil(bai::WINDOW_SIZE) as usize);
        assert_eq!(reference.linear.len(), 3052);

        // no record reaching past the query position may start before the bound
        let bound = reference.min_offset(QUERY);
        for record in &records {
            let interval = record.interval.unwrap();
            if interval.effective_end() > QUERY {
                assert!(record.start_offset >= bound);
            }
        }

        // every overlapping record is covered by a returned chunk
        let chunks = index.query(0, QUERY, QUERY + 100_000)?;
        for record in &records {
            let interval = record.interval.unwrap();
            if interval.start() < QUERY + 100_000 && interval.effective_end() > QUERY {
                assert!(chunks
                    .iter()
                    .any(|chunk| chunk.start <= record.start_offset
                        && record.end_offset <= chunk.end));
            }
        }
        Ok(())
    }

    #[test]
    fn test_no_records() -> Result<()> {
        let mut buffer = Vec::new();
        Indexer::default().index_to_writer(
            source_of(1, Vec::new()),
            &mut buffer,
            IndexFormat::STANDARD,
        )?;

        let mut expected = b"BAI\x01".to_vec();
        expected.extend_from_slice(&1i32.to_le_bytes());
        expected.extend_from_slice(&0i32.to_le_bytes());
        expected.extend_from_slice(&0i32.to_le_bytes());
        expected.extend_from_slice(&0u64.to_le_bytes());
        assert_eq!(buffer, expected);
        Ok(())
    }

    fn failing_stream(
        fail_at: usize,
    ) -> impl Iterator<Item = std::result::Result<AlignmentRecord, std::io::Error>> {
        let mut layout = StreamLayout::new();
        (1..=1000).map(move |i| {
            if i == fail_at {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "record length exceeds block",
                ));
            }
            let (s, e) = layout.reserve(250);
            let start = i as u32 * 1_000;
            Ok(AlignmentRecord::mapped(
                0,
                Interval::new(start, start + 150).unwrap(),
                s,
                e,
            ))
        })
    }

    #[test]
    fn test_decode_failure_writes_nothing() -> Result<()> {
        let mut buffer = Vec::new();
        let err = Indexer::default()
            .index_to_writer(
                IterSource::new(1, failing_stream(500)),
                &mut buffer,
                IndexFormat::STANDARD,
            )
            .unwrap_err();
        assert!(err.is_decode_error());
        assert!(!err.is_io_error());
        assert!(err.to_string().contains("record 500"));
        assert!(buffer.is_empty());
        Ok(())
    }

    #[test]
    fn test_decode_failure_leaves_no_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reads.bam.bai");
        let err = Indexer::default()
            .index_to_path(
                IterSource::new(1, failing_stream(500)),
                &path,
                IndexFormat::STANDARD,
            )
            .unwrap_err();
        assert!(err.is_decode_error());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_index_to_path() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reads.bam.bai");
        let index = Indexer::default().index_to_path(
            IterSource::new(1, failing_stream(0)),
            &path,
            IndexFormat::EXTENDED,
        )?;
        assert_eq!(GlobalIndex::from_path(&path)?, index);

        let metadata = index.references()[0].metadata.unwrap();
        assert_eq!(metadata.n_mapped, 1000);
        Ok(())
    }

    #[test]
    fn test_unsorted_input_leaves_no_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reads.bam.bai");
        let mut layout = StreamLayout::new();
        let (s0, e0) = layout.reserve(200);
        let (s1, e1) = layout.reserve(200);
        let records = vec![
            AlignmentRecord::mapped(0, Interval::new(9_000, 9_100)?, s0, e0),
            AlignmentRecord::mapped(0, Interval::new(100, 200)?, s1, e1),
        ];
        let err = Indexer::default()
            .index_to_path(source_of(1, records), &path, IndexFormat::STANDARD)
            .unwrap_err();
        assert!(err.is_unsorted());
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_merge_policies() -> Result<()> {
        // a record in a coarser bin sits between two records of bin 4681,
        // all three inside the same compressed block
        let mut layout = StreamLayout::new();
        let mut records = Vec::new();
        for (start, end) in [(100, 200), (150, 20_000), (300, 400)] {
            let (s, e) = layout.reserve(100);
            records.push(AlignmentRecord::mapped(0, Interval::new(start, end)?, s, e));
        }

        let adjacent = IndexerBuilder::default()
            .merge_policy(MergePolicy::Adjacent)
            .build()
            .build(source_of(1, records.clone()))?;
        let same_block = Indexer::default().build(source_of(1, records))?;

        assert_eq!(adjacent.references()[0].bins[&4681].len(), 2);
        assert_eq!(same_block.references()[0].bins[&4681].len(), 1);
        assert_eq!(same_block.references()[0].bins[&585].len(), 1);
        Ok(())
    }
}
