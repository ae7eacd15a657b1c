//! # Hierarchical binning
//!
//! The BAI binning scheme tiles a reference with six levels of bins:
//!
//! | level | bin size | bins           |
//! |-------|----------|----------------|
//! | 0     | 512 Mbp  | 0              |
//! | 1     | 64 Mbp   | 1 - 8          |
//! | 2     | 8 Mbp    | 9 - 72         |
//! | 3     | 1 Mbp    | 73 - 584       |
//! | 4     | 128 Kbp  | 585 - 4680     |
//! | 5     | 16 Kbp   | 4681 - 37448   |
//!
//! A record is stored in the smallest bin that fully contains it.

use crate::error::{IntervalError, Result};

/// One level of the binning hierarchy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinLevel {
    /// log2 of the bin width at this level
    pub shift: u32,
    /// Id of the first bin at this level
    pub first_bin: u32,
}
impl BinLevel {
    const fn new(shift: u32) -> Self {
        // 1 + 8 + 64 + ... bins precede this level
        let depth = (29 - shift) / 3;
        Self {
            shift,
            first_bin: ((1 << (3 * depth)) - 1) / 7,
        }
    }

    /// Bin at this level containing `position`
    #[must_use]
    pub fn bin(&self, position: u32) -> u32 {
        self.first_bin + (position >> self.shift)
    }

    /// Number of bins at this level
    #[must_use]
    pub fn n_bins(&self) -> u32 {
        1 << (29 - self.shift)
    }
}

/// Binning levels from finest (16 Kbp) to coarsest (whole reference)
pub const LEVELS: [BinLevel; 6] = [
    BinLevel::new(14),
    BinLevel::new(17),
    BinLevel::new(20),
    BinLevel::new(23),
    BinLevel::new(26),
    BinLevel::new(29),
];

/// Largest coordinate (exclusive) a BAI index can address: 2^29
pub const MAX_COORDINATE: u32 = 1 << 29;

/// Largest regular bin id
pub const MAX_BIN: u32 = 37448;

/// Pseudo-bin holding unmapped records placed on a reference
pub const UNMAPPED_BIN: u32 = 4680;

/// Pseudo-bin holding per-reference metadata
pub const METADATA_BIN: u32 = 37450;

/// Checks the interval and returns its end with zero-length intervals widened
fn checked_end(start: u32, end: u32) -> Result<u32> {
    if end < start {
        return Err(IntervalError::InvalidInterval { start, end }.into());
    }
    Ok(end.max(start.saturating_add(1)))
}

/// Returns the smallest bin fully containing `[start, end)`
///
/// # Examples
///
/// ```
/// use baidx::bai::bin_of;
///
/// assert_eq!(bin_of(0, 100).unwrap(), 4681);
/// assert_eq!(bin_of(16_000, 17_000).unwrap(), 585);
/// assert_eq!(bin_of(0, 1 << 29).unwrap(), 0);
/// ```
pub fn bin_of(start: u32, end: u32) -> Result<u32> {
    let end = checked_end(start, end)?;
    if end > MAX_COORDINATE {
        return Err(IntervalError::ExceedsMaximum {
            start,
            end,
            max: MAX_COORDINATE,
        }
        .into());
    }
    let last = end - 1;
    Ok(LEVELS
        .iter()
        .find(|level| start >> level.shift == last >> level.shift)
        .map_or(0, |level| level.bin(start)))
}

/// Returns every bin that may hold records overlapping `[start, end)`, ascending
///
/// Bin 0 is always included. Ends past [`MAX_COORDINATE`] are clamped.
pub fn candidate_bins(start: u32, end: u32) -> Result<Vec<u32>> {
    let end = checked_end(start, end)?.min(MAX_COORDINATE);
    let mut bins = Vec::new();
    if start >= end {
        // query starts beyond the addressable range
        bins.push(0);
        return Ok(bins);
    }
    let last = end - 1;
    for level in LEVELS.iter().rev() {
        bins.extend(level.bin(start)..=level.bin(last));
    }
    Ok(bins)
}

/// Returns the region `[start, end)` covered by a regular bin
#[must_use]
pub fn bin_region(bin: u32) -> Option<(u32, u32)> {
    LEVELS.iter().find_map(|level| {
        let index = bin.checked_sub(level.first_bin)?;
        (index < level.n_bins()).then(|| {
            let width = 1u64 << level.shift;
            let start = u64::from(index) * width;
            (start as u32, (start + width).min(u64::from(MAX_COORDINATE)) as u32)
        })
    })
}
