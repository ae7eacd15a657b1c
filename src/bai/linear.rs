//! Linear index: the lowest record offset per 16 Kbp window of a reference.

use crate::offset::VirtualOffset;

/// log2 of the linear index window width
pub const WINDOW_SHIFT: u32 = 14;

/// Width of a linear index window in bases (16 Kbp)
pub const WINDOW_SIZE: u32 = 1 << WINDOW_SHIFT;

/// Window index holding `position`
#[must_use]
pub fn window_of(position: u32) -> usize {
    (position >> WINDOW_SHIFT) as usize
}

/// Accumulates the minimum record offset of every window a record overlaps
#[derive(Debug, Default, Clone)]
pub struct LinearIndexBuilder {
    windows: Vec<Option<VirtualOffset>>,
}
impl LinearIndexBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowers every window overlapped by `[start, end)` to at most `offset`
    ///
    /// Zero-length intervals touch the window of `start`.
    pub fn add_record(&mut self, start: u32, end: u32, offset: VirtualOffset) {
        let first = window_of(start);
        let last = window_of(end.max(start.saturating_add(1)) - 1);
        if self.windows.len() <= last {
            self.windows.resize(last + 1, None);
        }
        for window in &mut self.windows[first..=last] {
            *window = Some(window.map_or(offset, |current| current.min(offset)));
        }
    }

    /// Highest window touched so far
    #[must_use]
    pub fn max_window_index(&self) -> Option<usize> {
        self.windows.len().checked_sub(1)
    }

    /// Produces one offset per window up to the highest touched one
    ///
    /// Untouched windows inherit the nearest preceding window's offset, or
    /// [`VirtualOffset::ZERO`] when no window precedes them.
    #[must_use]
    pub fn finalize(self) -> Vec<VirtualOffset> {
        let mut previous = VirtualOffset::ZERO;
        self.windows
            .into_iter()
            .map(|window| {
                if let Some(offset) = window {
                    previous = offset;
                }
                previous
            })
            .collect()
    }
}
