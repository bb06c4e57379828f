//! Error types for mapping, caching and paging

use rastermap_core::LayoutError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures opening files or mapping windows of them
#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot open {path}: {source}")]
    CannotOpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("mapping unavailable for {path}: {reason}")]
    MappingUnavailable { path: PathBuf, reason: String },

    #[error("failed to map {len} bytes at offset {base}: {source}")]
    MapWindowFailed {
        base: u64,
        len: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("{live} view(s) created by this mapper are still open")]
    ViewsStillOpen { live: usize },

    #[error("matrix mapper is closed")]
    MapperClosed,

    #[error("window size must be greater than zero")]
    InvalidWindowSize,

    #[error("window is mapped read-only")]
    ReadOnly,

    #[error("failed to write back {len} bytes at offset {base}: {source}")]
    FlushFailed {
        base: u64,
        len: u64,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of block cache operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("failed to allocate {bytes} bytes for a cache unit")]
    AllocationFailed { bytes: usize },

    #[error("decoded data of {len} bytes does not fit a unit of {capacity} bytes")]
    BufferOverflow { capacity: usize, len: usize },

    #[error("cache unit is already populated")]
    AlreadyPopulated,
}

/// Failures serving a page request
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("page request is outside the raster")]
    OutOfBounds,

    #[error("writable pages are not available from this pager")]
    WriteNotPermitted,

    #[error("page request starts past the end of the data")]
    EndOfData,

    #[error("unsupported page request: {0}")]
    Unsupported(&'static str),

    #[error("decoder failed: {0}")]
    Decode(String),

    #[error("page bytes cannot be viewed as {0}")]
    SampleCast(&'static str),
}

/// Any error produced by this crate
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error("invalid layout: {0}")]
    Layout(LayoutError),

    #[cfg(feature = "serde")]
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl From<LayoutError> for Error {
    fn from(err: LayoutError) -> Self {
        Error::Layout(err)
    }
}

/// Result type for rastermap operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
