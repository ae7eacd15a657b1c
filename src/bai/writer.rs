//! Serialization of a [`GlobalIndex`] in the little-endian BAI layout.
//!
//! ```text
//! magic      "BAI\1"
//! n_ref      i32
//! per reference:
//!   n_bin    i32
//!   per bin: bin u32, n_chunk i32, n_chunk x (chunk_beg u64, chunk_end u64)
//!   n_intv   i32
//!   n_intv x ioffset u64
//! n_no_coor  u64   (optional)
//! ```

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use log::info;
use tempfile::NamedTempFile;

use super::bin::METADATA_BIN;
use super::index::GlobalIndex;
use super::reference::ReferenceIndex;
use super::MAGIC;
use crate::error::Result;

/// Optional parts of the BAI layout the writer emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFormat {
    /// Append the trailing count of unplaced records
    pub no_coordinate_count: bool,
    /// Emit the metadata pseudo-bin for every reference with records
    pub metadata_bins: bool,
}
impl IndexFormat {
    /// The original layout, without any trailing count
    pub const LEGACY: Self = Self {
        no_coordinate_count: false,
        metadata_bins: false,
    };

    /// Trailing unplaced count, no metadata pseudo-bins
    pub const STANDARD: Self = Self {
        no_coordinate_count: true,
        metadata_bins: false,
    };

    /// Trailing unplaced count and metadata pseudo-bins
    pub const EXTENDED: Self = Self {
        no_coordinate_count: true,
        metadata_bins: true,
    };
}
impl Default for IndexFormat {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Counts are stored as signed 32-bit integers
fn write_count<W: Write>(writer: &mut W, count: usize) -> Result<()> {
    let count = i32::try_from(count).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("count {count} does not fit in a BAI count field"),
        )
    })?;
    writer.write_i32::<LittleEndian>(count)?;
    Ok(())
}

/// Writes a [`GlobalIndex`] to any byte sink
pub struct IndexWriter<W: Write> {
    inner: W,
    format: IndexFormat,
}
impl<W: Write> IndexWriter<W> {
    #[must_use]
    pub fn new(inner: W, format: IndexFormat) -> Self {
        Self { inner, format }
    }

    #[must_use]
    pub fn format(&self) -> IndexFormat {
        self.format
    }

    /// Serializes the whole index
    pub fn write(&mut self, index: &GlobalIndex) -> Result<()> {
        self.inner.write_all(MAGIC)?;
        write_count(&mut self.inner, index.n_references())?;
        for reference in index.references() {
            self.write_reference(reference)?;
        }
        if self.format.no_coordinate_count {
            self.inner.write_u64::<LittleEndian>(index.n_no_coor())?;
        }
        Ok(())
    }

    fn write_reference(&mut self, reference: &ReferenceIndex) -> Result<()> {
        let metadata = reference.metadata.filter(|_| self.format.metadata_bins);

        write_count(
            &mut self.inner,
            reference.bins.len() + usize::from(metadata.is_some()),
        )?;
        for (&bin, chunks) in &reference.bins {
            self.inner.write_u32::<LittleEndian>(bin)?;
            write_count(&mut self.inner, chunks.len())?;
            for chunk in chunks {
                self.inner.write_u64::<LittleEndian>(chunk.start.raw())?;
                self.inner.write_u64::<LittleEndian>(chunk.end.raw())?;
            }
        }
        if let Some(metadata) = metadata {
            // two pseudo-chunks: offset span, then record counts
            self.inner.write_u32::<LittleEndian>(METADATA_BIN)?;
            write_count(&mut self.inner, 2)?;
            self.inner
                .write_u64::<LittleEndian>(metadata.start_offset.raw())?;
            self.inner.write_u64::<LittleEndian>(metadata.end_offset.raw())?;
            self.inner.write_u64::<LittleEndian>(metadata.n_mapped)?;
            self.inner.write_u64::<LittleEndian>(metadata.n_unmapped)?;
        }

        write_count(&mut self.inner, reference.linear.len())?;
        for offset in &reference.linear {
            self.inner.write_u64::<LittleEndian>(offset.raw())?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// An index file that only appears at its destination once committed
///
/// The index is written to a temporary file next to the destination and
/// renamed into place by [`PendingIndexFile::commit`]. Dropping the value
/// without committing removes the temporary file.
pub struct PendingIndexFile {
    path: PathBuf,
    file: NamedTempFile,
}
impl PendingIndexFile {
    /// Opens a temporary file in the destination's directory
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file = NamedTempFile::new_in(parent)?;
        Ok(Self { path, file })
    }

    /// Final location of the index
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the index and moves it to its destination
    pub fn commit(self, index: &GlobalIndex, format: IndexFormat) -> Result<()> {
        let Self { path, file } = self;
        let mut writer = IndexWriter::new(BufWriter::new(file.as_file()), format);
        writer.write(index)?;
        writer.flush()?;
        drop(writer);
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|err| err.error)?;
        info!("Wrote index of {} references to {}", index.n_references(), path.display());
        Ok(())
    }
}

impl GlobalIndex {
    /// Serializes the index to any byte sink
    pub fn write_bytes<W: Write>(&self, writer: &mut W, format: IndexFormat) -> Result<()> {
        IndexWriter::new(writer, format).write(self)
    }

    /// Saves the index to `path`, replacing any existing file only on success
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use baidx::bai::{GlobalIndex, IndexFormat};
    ///
    /// let index = GlobalIndex::new(Vec::new(), 0);
    /// index.save_to_path("reads.bam.bai", IndexFormat::default()).unwrap();
    /// ```
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P, format: IndexFormat) -> Result<()> {
        PendingIndexFile::create(path)?.commit(self, format)
    }
}
