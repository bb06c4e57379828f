//! rastermap - Windowed access to large interleaved raster cubes
//!
//! This library pages multi-band raster files through memory-mapped windows,
//! and caches decoded buffers of block-compressed rasters so overlapping
//! requests share a single decode.
//!
//! ## Architecture
//!
//! rastermap follows a clean definition/implementation separation:
//!
//! - **rastermap-core**: Layouts, interleave address formulas, window
//!   planning and the decoder interface (no I/O)
//! - **rastermap**: Platform mapping, views, the block cache and page providers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rastermap::{InterleaveFormat, MatrixMapper, RasterLayout};
//!
//! fn example() -> rastermap::Result<()> {
//!     let layout = RasterLayout::builder(InterleaveFormat::Bil, 1024, 2048, 4)
//!         .element_size(2)
//!         .header_offset(512)
//!         .build()?;
//!     let mapper = MatrixMapper::open("scene.bil", layout)?;
//!
//!     // one row of every band at a time
//!     let mut view = mapper.create_view(layout.row_stride()?)?;
//!     let mut window = view.window_at(0, 0, 0)?;
//!     while let Some(current) = window {
//!         println!("{} bytes at offset {}", current.bytes().len(), current.address());
//!         window = view.next_window()?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Memory-mapped I/O**: Granularity-aligned windows clamped to end of file
//! - **Buffered fallback**: The same windows through positioned reads
//! - **Block cache**: Reference-counted decoded units with oldest-first eviction
//! - **Page providers**: Uniform page leases over mapped and decoded data
//! - **Byte order**: Foreign-endian rasters swapped on the way out

// Re-export core abstractions and layout definitions
pub use rastermap_core::{
    // Layout
    ByteOrder, InterleaveFormat, RasterLayout, RasterLayoutBuilder, Strides,
    // Blocks and decoding
    BlockDecoder, BlockGeometry, BlockRange,
    // Window placement
    align_down, align_to_boundary, plan_window, WindowPlan,
    // Errors
    LayoutError,
};

// Implementation modules
pub mod cache;
pub mod config;
pub mod endian;
pub mod error;
pub mod mapper;
pub mod page;
pub mod platform;
pub mod provider;
pub mod view;

// Public exports
pub use cache::{BlockCache, CacheStats, CacheUnit, UnitLease};
pub use config::{CacheConfig, MapperConfig, MappingBackend, PagerConfig};
pub use error::{CacheError, Error, IoError, PageError, Result};
pub use mapper::MatrixMapper;
pub use page::{PageExtents, PageHandle};
pub use provider::{BlockPager, MappedPager, PageProvider, PageRequest};
pub use view::{MappedView, Window, WindowFault, WindowMut};

#[cfg(feature = "serde")]
pub use config::from_json_str;

#[cfg(test)]
pub(crate) mod test_support;
