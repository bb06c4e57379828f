//! Sizing constants for windows and caches

/// Granularity assumed when the platform cannot report one
pub const FALLBACK_GRANULARITY: u64 = 4096;

/// Allocation granularity for mapping start addresses on Windows
pub const WINDOWS_ALLOCATION_GRANULARITY: u64 = 64 * 1024;

/// Default number of decoded units a block cache retains
pub const DEFAULT_CACHE_UNITS: usize = 64;

/// Default byte budget of a block cache (50MB)
pub const DEFAULT_CACHE_BYTES: usize = 50 * 1024 * 1024;

/// Default number of rows a mapped page spans
pub const DEFAULT_CONCURRENT_ROWS: u32 = 1;
