//! # Virtual file offsets
//!
//! A BGZF stream is a series of independently compressed blocks, so a plain byte
//! offset cannot point inside a block. A virtual offset packs both coordinates into
//! a single `u64`:
//!
//! ```text
//! ┌──────────────────────────────────────────┬──────────────────┐
//! │  compressed block start (48 bits)        │ in-block (16)    │
//! └──────────────────────────────────────────┴──────────────────┘
//! ```
//!
//! Ordering virtual offsets as integers matches their order in the stream.

use std::fmt;

use crate::error::{OffsetError, Result};

/// Number of bits reserved for the offset within a decompressed block
const IN_BLOCK_BITS: u32 = 16;

/// Largest compressed block start a virtual offset can hold (48 bits)
pub const MAX_BLOCK_START: u64 = (1 << (64 - IN_BLOCK_BITS)) - 1;

/// Virtual file offset: `block_start << 16 | in_block_offset`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualOffset(u64);
impl VirtualOffset {
    /// The zero offset, also used as the "no data" sentinel of the linear index
    pub const ZERO: Self = Self(0);

    /// Composes a virtual offset from a compressed block start and an offset into
    /// the decompressed block.
    ///
    /// # Errors
    ///
    /// Returns [`OffsetError::InvalidOffset`] if `block_start` does not fit in 48 bits
    /// or `in_block_offset` does not fit in 16 bits.
    ///
    /// # Examples
    ///
    /// ```
    /// use baidx::VirtualOffset;
    ///
    /// let offset = VirtualOffset::encode(1024, 512).unwrap();
    /// assert_eq!(offset.decode(), (1024, 512));
    /// assert!(VirtualOffset::encode(1024, 70_000).is_err());
    /// ```
    pub fn encode(block_start: u64, in_block_offset: usize) -> Result<Self> {
        match u16::try_from(in_block_offset) {
            Ok(in_block) if block_start <= MAX_BLOCK_START => {
                Ok(Self((block_start << IN_BLOCK_BITS) | u64::from(in_block)))
            }
            _ => Err(OffsetError::InvalidOffset {
                block_start,
                in_block_offset,
            }
            .into()),
        }
    }

    /// Splits the offset into `(block_start, in_block_offset)`
    #[must_use]
    pub fn decode(self) -> (u64, u16) {
        (self.block_start(), self.in_block_offset())
    }

    /// Byte position of the compressed block in the underlying stream
    #[must_use]
    pub fn block_start(self) -> u64 {
        self.0 >> IN_BLOCK_BITS
    }

    /// Byte position within the decompressed block
    #[must_use]
    pub fn in_block_offset(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Raw 64-bit value as stored on disk
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Checks if both offsets point into the same compressed block
    #[must_use]
    pub fn same_block(self, other: Self) -> bool {
        self.block_start() == other.block_start()
    }
}

impl From<u64> for VirtualOffset {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<VirtualOffset> for u64 {
    fn from(offset: VirtualOffset) -> Self {
        offset.0
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.block_start(), self.in_block_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() -> Result<()> {
        let offset = VirtualOffset::encode(1024, 512)?;
        assert_eq!(offset.block_start(), 1024);
        assert_eq!(offset.in_block_offset(), 512);
        assert_eq!(offset.raw(), (1024 << 16) | 512);

        for (block, within) in [(0, 0), (0, 65_535), (MAX_BLOCK_START, 0), (77, 31)] {
            let offset = VirtualOffset::encode(block, within)?;
            assert_eq!(offset.decode(), (block, within as u16));
        }
        Ok(())
    }

    #[test]
    fn test_encode_out_of_range() {
        assert!(VirtualOffset::encode(0, 65_536).is_err());
        assert!(VirtualOffset::encode(MAX_BLOCK_START + 1, 0).is_err());
    }

    #[test]
    fn test_ordering() -> Result<()> {
        let a = VirtualOffset::encode(1000, 100)?;
        let b = VirtualOffset::encode(1000, 200)?;
        let c = VirtualOffset::encode(2000, 0)?;
        assert!(a < b);
        assert!(b < c);
        assert!(a.same_block(b));
        assert!(!b.same_block(c));
        Ok(())
    }

    #[test]
    fn test_display() {
        assert_eq!(VirtualOffset::from((7 << 16) | 3).to_string(), "7/3");
    }
}
