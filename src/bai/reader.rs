//! Parsing of serialized BAI indexes.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use super::bin::{bin_region, METADATA_BIN};
use super::chunk::{BinIndex, Chunk};
use super::index::GlobalIndex;
use super::reference::{ReferenceIndex, ReferenceMetadata};
use super::MAGIC;
use crate::error::{IndexError, Result};
use crate::offset::VirtualOffset;

fn read_count<R: Read>(reader: &mut R, field: &'static str) -> Result<usize> {
    let value = reader.read_i32::<LittleEndian>()?;
    usize::try_from(value).map_err(|_| IndexError::NegativeCount { field, value }.into())
}

fn read_offset<R: Read>(reader: &mut R) -> Result<VirtualOffset> {
    Ok(VirtualOffset::from(reader.read_u64::<LittleEndian>()?))
}

/// Reads the optional trailing unplaced count
///
/// Only a stream ending exactly at the trailer counts as absent.
fn read_no_coordinate_count<R: Read>(reader: &mut R) -> Result<Option<u64>> {
    let mut buffer = [0u8; 8];
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    match filled {
        0 => Ok(None),
        8 => Ok(Some(u64::from_le_bytes(buffer))),
        len => Err(IndexError::TruncatedTrailer(len).into()),
    }
}

fn read_reference<R: Read>(reader: &mut R) -> Result<ReferenceIndex> {
    let n_bin = read_count(reader, "bin")?;
    let mut bins = BinIndex::new();
    let mut metadata = None;
    for _ in 0..n_bin {
        let bin = reader.read_u32::<LittleEndian>()?;
        let n_chunk = read_count(reader, "chunk")?;
        if bin == METADATA_BIN && n_chunk == 2 {
            metadata = Some(ReferenceMetadata {
                start_offset: read_offset(reader)?,
                end_offset: read_offset(reader)?,
                n_mapped: reader.read_u64::<LittleEndian>()?,
                n_unmapped: reader.read_u64::<LittleEndian>()?,
            });
            continue;
        }
        if bin_region(bin).is_none() {
            return Err(IndexError::InvalidBin(bin).into());
        }
        let chunks = (0..n_chunk)
            .map(|_| -> Result<Chunk> { Ok(Chunk::new(read_offset(reader)?, read_offset(reader)?)) })
            .collect::<Result<Vec<_>>>()?;
        bins.insert(bin, chunks);
    }

    let n_intv = read_count(reader, "interval")?;
    let linear = (0..n_intv)
        .map(|_| read_offset(reader))
        .collect::<Result<Vec<_>>>()?;

    Ok(ReferenceIndex {
        bins,
        linear,
        metadata,
    })
}

impl GlobalIndex {
    /// Parses an index from a byte stream
    ///
    /// A stream ending right after the last reference is accepted and yields
    /// an unplaced count of zero. A partial unplaced count is rejected.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(IndexError::InvalidMagic(magic).into());
        }

        let n_ref = read_count(reader, "reference")?;
        let references = (0..n_ref)
            .map(|_| read_reference(reader))
            .collect::<Result<Vec<_>>>()?;

        let n_no_coor = read_no_coordinate_count(reader)?.unwrap_or(0);
        Ok(Self::new(references, n_no_coor))
    }

    /// Reads an index file through a memory map
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Self::read_from(&mut &mmap[..])
    }
}
