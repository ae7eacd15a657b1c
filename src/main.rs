use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use baidx::bai::PendingIndexFile;
use baidx::{
    AlignmentRecord, AlignmentSource, BoxError, IndexFormat, Indexer, IndexerBuilder, Interval,
    MergePolicy, ValidationStringency, VirtualOffset,
};
use clap::Parser;
use log::info;
use noodles::{bam, bgzf, sam};

const EXIT_USAGE: u8 = 3;
const EXIT_OPEN_INPUT: u8 = 4;
const EXIT_OPEN_OUTPUT: u8 = 5;
const EXIT_DECODE: u8 = 6;
const EXIT_UNSORTED: u8 = 7;
const EXIT_WRITE: u8 = 8;
const EXIT_OTHER: u8 = 9;

#[derive(Parser, Debug)]
#[command(
    name = "baidx",
    version,
    about = "Build a BAI index for a coordinate-sorted BAM file"
)]
struct Args {
    /// Coordinate-sorted BAM file to index
    input: PathBuf,

    /// Output index path [default: <INPUT>.bai]
    output: Option<PathBuf>,

    /// Treatment of records that cannot be binned as they are
    ///
    /// [STRICT, LENIENT, SILENT]
    #[clap(long, default_value_t = ValidationStringency::Strict)]
    validation_stringency: ValidationStringency,

    /// When chunks of the same bin are merged
    ///
    /// [adjacent, same-block]
    #[clap(long, default_value_t = MergePolicy::SameBlock)]
    merge: MergePolicy,

    /// Omit the trailing count of unplaced records
    #[clap(long)]
    legacy: bool,

    /// Emit the per-reference metadata pseudo-bin
    #[clap(long)]
    metadata: bool,
}
impl Args {
    fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let mut path = self.input.clone().into_os_string();
            path.push(".bai");
            PathBuf::from(path)
        })
    }

    fn format(&self) -> IndexFormat {
        IndexFormat {
            no_coordinate_count: !self.legacy,
            metadata_bins: self.metadata,
        }
    }

    fn indexer(&self) -> Indexer {
        IndexerBuilder::default()
            .stringency(self.validation_stringency)
            .merge_policy(self.merge)
            .build()
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("Could not open input {}: {source}", .path.display())]
    OpenInput { path: PathBuf, source: baidx::Error },

    #[error("Could not create output {}: {source}", .path.display())]
    OpenOutput { path: PathBuf, source: baidx::Error },

    #[error("Failed to index {}: {source}", .path.display())]
    Index { path: PathBuf, source: baidx::Error },

    #[error("Could not write index {}: {source}", .path.display())]
    Write { path: PathBuf, source: baidx::Error },
}
impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::OpenInput { .. } => EXIT_OPEN_INPUT,
            Self::OpenOutput { .. } => EXIT_OPEN_OUTPUT,
            Self::Index { source, .. }
                if source.is_decode_error() || source.is_invalid_record() =>
            {
                EXIT_DECODE
            }
            Self::Index { source, .. } if source.is_unsorted() => EXIT_UNSORTED,
            Self::Index { source, .. } if source.is_io_error() => EXIT_OPEN_INPUT,
            Self::Index { .. } => EXIT_OTHER,
            Self::Write { .. } => EXIT_WRITE,
        }
    }
}

/// Alignment records decoded from a BAM file with noodles
struct BamSource {
    reader: bam::io::Reader<bgzf::Reader<File>>,
    record: bam::Record,
    n_references: usize,
}
impl BamSource {
    fn open(path: &Path) -> baidx::Result<Self> {
        let mut reader = File::open(path).map(bam::io::Reader::new)?;
        let header = reader.read_header()?;
        Ok(Self {
            reader,
            record: bam::Record::default(),
            n_references: header.reference_sequences().len(),
        })
    }
}

/// Converts a 1-based position to a 0-based coordinate
fn coordinate(position: noodles::core::Position) -> u32 {
    u32::try_from(usize::from(position) - 1).unwrap_or(u32::MAX)
}

impl AlignmentSource for BamSource {
    fn n_references(&self) -> usize {
        self.n_references
    }

    fn read_record(&mut self) -> Result<Option<AlignmentRecord>, BoxError> {
        let start_offset = VirtualOffset::from(u64::from(self.reader.get_ref().virtual_position()));
        if self.reader.read_record(&mut self.record)? == 0 {
            return Ok(None);
        }
        let end_offset = VirtualOffset::from(u64::from(self.reader.get_ref().virtual_position()));

        let record = &self.record;
        let Some(reference_id) = record.reference_sequence_id().transpose()? else {
            return Ok(Some(AlignmentRecord::unplaced(start_offset, end_offset)));
        };
        let start = record.alignment_start().transpose()?.map(coordinate);
        if record.flags().is_unmapped() {
            return Ok(Some(AlignmentRecord::placed_unmapped(
                reference_id,
                start,
                start_offset,
                end_offset,
            )));
        }

        let interval = match start {
            Some(start) => {
                // 1-based inclusive end equals the 0-based exclusive end
                let end = sam::alignment::Record::alignment_end(record)
                    .transpose()?
                    .map_or(start.saturating_add(1), |end| coordinate(end).saturating_add(1));
                Some(Interval::new(start, end.max(start))?)
            }
            None => None,
        };
        Ok(Some(AlignmentRecord {
            reference_id: Some(reference_id),
            interval,
            unmapped: false,
            start_offset,
            end_offset,
        }))
    }
}

fn run(args: &Args) -> Result<(), CliError> {
    let input = args.input.clone();
    let output = args.output_path();

    let source = BamSource::open(&input).map_err(|source| CliError::OpenInput {
        path: input.clone(),
        source,
    })?;
    let pending = PendingIndexFile::create(&output).map_err(|source| CliError::OpenOutput {
        path: output.clone(),
        source,
    })?;

    info!(
        "Indexing {} into {} ({} references, stringency {}, merge {})",
        input.display(),
        pending.path().display(),
        source.n_references(),
        args.validation_stringency,
        args.merge
    );
    let index = args
        .indexer()
        .build(source)
        .map_err(|source| CliError::Index {
            path: input.clone(),
            source,
        })?;

    pending
        .commit(&index, args.format())
        .map_err(|source| CliError::Write {
            path: output,
            source,
        })
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = if err.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("baidx :: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baidx::{BuildError, DecodeError, IntervalError};

    fn index_failure(source: baidx::Error) -> CliError {
        CliError::Index {
            path: PathBuf::from("reads.bam"),
            source,
        }
    }

    #[test]
    fn test_exit_codes() {
        let decode = DecodeError {
            record: 4,
            offset: None,
            source: "bad cigar".into(),
        };
        assert_eq!(index_failure(decode.into()).exit_code(), EXIT_DECODE);

        let strict = BuildError::MissingInterval {
            record: Some(4),
            reference_id: 0,
        };
        assert_eq!(index_failure(strict.into()).exit_code(), EXIT_DECODE);

        let beyond = IntervalError::ExceedsMaximum {
            start: 0,
            end: 1 << 30,
            max: 1 << 29,
        };
        assert_eq!(index_failure(beyond.into()).exit_code(), EXIT_DECODE);

        let unsorted = BuildError::UnsortedInput {
            previous: "reference 1".to_string(),
            found: "reference 0".to_string(),
        };
        assert_eq!(index_failure(unsorted.into()).exit_code(), EXIT_UNSORTED);

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(index_failure(io.into()).exit_code(), EXIT_OPEN_INPUT);

        let unknown = BuildError::UnknownReference {
            reference_id: 9,
            n_references: 2,
        };
        assert_eq!(index_failure(unknown.into()).exit_code(), EXIT_OTHER);
    }

    #[test]
    fn test_default_output_path() {
        let args = Args::try_parse_from(["baidx", "data/reads.bam"]).unwrap();
        assert_eq!(args.output_path(), PathBuf::from("data/reads.bam.bai"));
        assert_eq!(args.format(), IndexFormat::STANDARD);
    }
}
