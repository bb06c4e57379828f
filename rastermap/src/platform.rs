//! Platform mapping capability
//!
//! The rest of the crate maps windows exclusively through [`PlatformMapping`].
//! Two implementations exist: [`MmapPlatform`] maps file ranges with the
//! operating system's memory mapping primitive, and [`BufferedPlatform`] reads
//! ranges into owned buffers (writing them back when writable). The choice is
//! made at configuration time through [`MappingBackend`], and the `mmap`
//! feature decides at build time whether the first is available at all.

use crate::config::{MapperConfig, MappingBackend};
use crate::error::{IoError, Result};
#[cfg(not(windows))]
use rastermap_core::constants::FALLBACK_GRANULARITY;
use std::fmt;
use std::fs::File;
use std::path::Path;

mod buffered;
#[cfg(feature = "mmap")]
mod mmap;

pub use buffered::{BufferedPlatform, BufferedRegion};
#[cfg(feature = "mmap")]
pub use mmap::{MmapPlatform, MmapRegion};

/// A file that windows can be mapped from
pub trait PlatformMapping: Send + Sync + fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Alignment required of every window base
    fn granularity(&self) -> u64;

    /// File size in bytes, taken from filesystem metadata at open time
    fn file_size(&self) -> u64;

    /// Whether regions may be written
    fn writable(&self) -> bool;

    /// Map `len` bytes starting at the granularity-aligned `base`
    fn map_region(&self, base: u64, len: usize) -> std::io::Result<Box<dyn MappedRegion>>;
}

/// Bytes of one mapped window, valid for as long as the region lives
pub trait MappedRegion: Send + fmt::Debug {
    fn bytes(&self) -> &[u8];

    /// Mutable access, `None` for read-only regions
    fn bytes_mut(&mut self) -> Option<&mut [u8]>;

    /// Make writes visible in the underlying file
    fn flush(&mut self) -> std::io::Result<()>;
}

/// Allocation granularity of the executing system
#[cfg(unix)]
pub fn system_granularity() -> u64 {
    // SAFETY: sysconf has no memory-safety preconditions
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size > 0 {
        page_size as u64
    } else {
        FALLBACK_GRANULARITY
    }
}

/// Allocation granularity of the executing system
#[cfg(windows)]
pub fn system_granularity() -> u64 {
    rastermap_core::constants::WINDOWS_ALLOCATION_GRANULARITY
}

/// Allocation granularity of the executing system
#[cfg(not(any(unix, windows)))]
pub fn system_granularity() -> u64 {
    FALLBACK_GRANULARITY
}

/// Create the configured platform mapping over an opened file
pub(crate) fn create_platform(
    path: &Path,
    file: File,
    writable: bool,
    config: &MapperConfig,
) -> Result<Box<dyn PlatformMapping>> {
    let granularity = config.granularity.unwrap_or_else(system_granularity);
    rastermap_core::validate_granularity(granularity)?;

    let unavailable = |reason: String| IoError::MappingUnavailable {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = file
        .metadata()
        .map_err(|e| unavailable(format!("cannot read metadata: {e}")))?;
    if !metadata.is_file() {
        return Err(unavailable("not a regular file".to_string()).into());
    }
    let file_size = metadata.len();

    let platform: Box<dyn PlatformMapping> = match config.backend {
        #[cfg(feature = "mmap")]
        MappingBackend::Mmap => Box::new(MmapPlatform::new(file, file_size, granularity, writable)),
        #[cfg(not(feature = "mmap"))]
        MappingBackend::Mmap => {
            drop(file);
            return Err(unavailable("built without memory mapping support".to_string()).into());
        }
        MappingBackend::Buffered => {
            Box::new(BufferedPlatform::new(file, file_size, granularity, writable))
        }
    };

    Ok(platform)
}
