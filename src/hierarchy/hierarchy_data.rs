//! Hierarchy data structures

use crate::compaction::RangeLevel;
use crate::heap::HeapEpoch;

/// Range index pyramid; `levels[0]` is exact, every other level is conservative
#[derive(Debug, Clone, PartialEq)]
pub struct RangePyramid {
    pub levels: Vec<RangeLevel>,
    /// Levels the viewport could have supported without the configured cap
    pub dimension_limit: u32,
    /// Addressing epoch of the depth arrays the offsets point into
    pub epoch: HeapEpoch,
}

impl RangePyramid {
    /// Levels actually built, handed to the ray march as its upper bound
    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn top_level(&self) -> u32 {
        self.level_count().saturating_sub(1)
    }

    /// True when the configured maximum stopped the build before the viewport did
    pub fn truncated(&self) -> bool {
        self.level_count() < self.dimension_limit
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.levels
            .first()
            .map(|level| (level.width, level.height))
            .unwrap_or((0, 0))
    }
}
