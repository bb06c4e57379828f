#![no_std]

//! rastermap-core - Raster Cube Layout Definitions
//!
//! This crate provides the pure, I/O-free pieces of raster paging: interleave
//! geometry and address formulas, window alignment arithmetic, block ranges
//! and the decoder interface used by block-oriented pagers.

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
pub mod block;
pub mod error;
pub mod format;
pub mod layout;
pub mod traits;
pub mod validation;

#[cfg(feature = "alloc")]
pub use block::{BlockGeometry, BlockRange};
pub use error::{LayoutError, Result};
pub use format::constants;
pub use layout::{ByteOrder, InterleaveFormat, RasterLayout, RasterLayoutBuilder, Strides};
#[cfg(feature = "alloc")]
pub use traits::BlockDecoder;
pub use validation::{
    align_down, align_to_boundary, plan_window, validate_granularity, validate_window_size,
    WindowPlan,
};
