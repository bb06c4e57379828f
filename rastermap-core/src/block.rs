//! Compressed block ranges and row-block geometry
//!
//! Block-oriented decoders work in whole blocks of rows. A [`BlockRange`] names
//! the blocks a decoded buffer satisfies; [`BlockGeometry`] maps row requests
//! onto those blocks.

use crate::error::{LayoutError, Result};
use alloc::vec::Vec;

/// Ordered, de-duplicated, non-empty set of block numbers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<u64>", into = "Vec<u64>"))]
pub struct BlockRange {
    blocks: Vec<u64>,
}

impl BlockRange {
    /// Every block from `first` through `last` inclusive
    pub fn contiguous(first: u64, last: u64) -> Result<Self> {
        if first > last {
            return Err(LayoutError::EmptyBlockRange);
        }
        Ok(Self {
            blocks: (first..=last).collect(),
        })
    }

    /// A single block
    pub fn single(block: u64) -> Self {
        Self {
            blocks: alloc::vec![block],
        }
    }

    /// Build from arbitrary block numbers, sorting and removing duplicates
    pub fn from_blocks<I: IntoIterator<Item = u64>>(blocks: I) -> Result<Self> {
        let mut blocks: Vec<u64> = blocks.into_iter().collect();
        if blocks.is_empty() {
            return Err(LayoutError::EmptyBlockRange);
        }
        blocks.sort_unstable();
        blocks.dedup();
        Ok(Self { blocks })
    }

    pub fn first(&self) -> u64 {
        self.blocks[0]
    }

    pub fn last(&self) -> u64 {
        self.blocks[self.blocks.len() - 1]
    }

    pub fn count(&self) -> usize {
        self.blocks.len()
    }

    pub fn contains(&self, block: u64) -> bool {
        self.blocks.binary_search(&block).is_ok()
    }

    /// Whether every block of `other` is also in this range
    pub fn covers(&self, other: &BlockRange) -> bool {
        other.blocks.iter().all(|&block| self.contains(block))
    }

    /// Position of `block` within this range, i.e. its slot in a decoded buffer
    pub fn position(&self, block: u64) -> Option<usize> {
        self.blocks.binary_search(&block).ok()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.blocks
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.blocks.iter().copied()
    }
}

impl TryFrom<Vec<u64>> for BlockRange {
    type Error = LayoutError;

    fn try_from(blocks: Vec<u64>) -> Result<Self> {
        Self::from_blocks(blocks)
    }
}

impl From<BlockRange> for Vec<u64> {
    fn from(range: BlockRange) -> Self {
        range.blocks
    }
}

/// Row-block geometry of a block-compressed raster stored band interleaved by pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockGeometry {
    pub rows_per_block: u32,
    pub rows: u32,
    pub columns: u32,
    pub bands: u32,
    pub element_size: u32,
}

impl BlockGeometry {
    pub fn validate(&self) -> Result<()> {
        if self.element_size == 0 {
            return Err(LayoutError::ZeroElementSize);
        }
        if self.rows_per_block == 0 || self.rows == 0 || self.columns == 0 || self.bands == 0 {
            return Err(LayoutError::InvalidDimensions);
        }
        self.block_size_bytes().map(|_| ())
    }

    /// Bytes in one decoded row
    pub fn row_bytes(&self) -> Result<u64> {
        (self.columns as u64)
            .checked_mul(self.bands as u64)
            .and_then(|v| v.checked_mul(self.element_size as u64))
            .ok_or(LayoutError::SizeOverflow)
    }

    /// Bytes in one decoded block
    pub fn block_size_bytes(&self) -> Result<u64> {
        self.row_bytes()?
            .checked_mul(self.rows_per_block as u64)
            .ok_or(LayoutError::SizeOverflow)
    }

    /// Total number of blocks; the last one may be partially filled
    pub fn block_count(&self) -> u64 {
        (self.rows as u64).div_ceil(self.rows_per_block as u64)
    }

    pub fn block_of_row(&self, row: u32) -> u64 {
        row as u64 / self.rows_per_block as u64
    }

    pub fn first_row_of_block(&self, block: u64) -> u64 {
        block * self.rows_per_block as u64
    }

    /// Blocks covering `row_count` rows starting at `start_row`
    pub fn blocks_for_rows(&self, start_row: u32, row_count: u32) -> Result<BlockRange> {
        if row_count == 0 {
            return Err(LayoutError::EmptyBlockRange);
        }
        let stop_row = start_row
            .checked_add(row_count - 1)
            .ok_or(LayoutError::SizeOverflow)?;
        if stop_row >= self.rows {
            return Err(LayoutError::IndexOutOfBounds);
        }
        BlockRange::contiguous(self.block_of_row(start_row), self.block_of_row(stop_row))
    }
}
