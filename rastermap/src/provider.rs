//! Page providers: turning logical page requests into page handles
//!
//! [`MappedPager`] serves uncompressed interleaved files through mapped views.
//! [`BlockPager`] serves block-compressed rasters through a [`BlockCache`]
//! and a caller-supplied [`BlockDecoder`].
//!
//! [`BlockCache`]: crate::BlockCache
//! [`BlockDecoder`]: rastermap_core::BlockDecoder

pub mod block;
pub mod mapped;

pub use block::BlockPager;
pub use mapped::MappedPager;

use crate::error::Result;
use crate::page::PageHandle;
use rastermap_core::constants::DEFAULT_CONCURRENT_ROWS;

/// A request for the page starting at a logical sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageRequest {
    pub start_row: u32,
    pub start_column: u32,
    pub start_band: u32,
    /// Rows the page should span; clamped to the rows remaining
    pub concurrent_rows: u32,
    pub writable: bool,
}

impl PageRequest {
    pub fn new(start_row: u32, start_column: u32, start_band: u32) -> Self {
        Self {
            start_row,
            start_column,
            start_band,
            concurrent_rows: DEFAULT_CONCURRENT_ROWS,
            writable: false,
        }
    }

    pub fn with_concurrent_rows(mut self, rows: u32) -> Self {
        self.concurrent_rows = rows;
        self
    }

    pub fn with_writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    /// Rows to serve given `remaining` rows from the start row on
    pub(crate) fn rows_within(&self, remaining: u32) -> u32 {
        self.concurrent_rows.max(1).min(remaining)
    }
}

/// Source of pages for raster readers
pub trait PageProvider {
    /// Lease the page described by `request`
    fn get_page(&self, request: &PageRequest) -> Result<PageHandle>;

    /// Give a page back
    ///
    /// Dropping the handle has the same effect.
    fn release_page(&self, page: PageHandle) {
        page.release();
    }
}
