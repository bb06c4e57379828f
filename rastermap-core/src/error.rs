//! Error types for raster layout and window arithmetic

/// Errors that can occur while describing or addressing a raster cube
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// Rows, columns or bands is zero
    InvalidDimensions,
    /// Element size is zero
    ZeroElementSize,
    /// Coordinate outside the cube extents
    IndexOutOfBounds,
    /// Byte offset calculation does not fit in 64 bits
    SizeOverflow,
    /// Granularity is zero or not a power of two
    InvalidGranularity,
    /// Block range with no block numbers
    EmptyBlockRange,
    /// Interleave tag not recognised
    UnknownInterleave,
}

impl core::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            LayoutError::InvalidDimensions => "Raster dimensions must be non-zero",
            LayoutError::ZeroElementSize => "Element size must be non-zero",
            LayoutError::IndexOutOfBounds => "Index out of bounds",
            LayoutError::SizeOverflow => "Byte offset overflow",
            LayoutError::InvalidGranularity => "Granularity must be a non-zero power of two",
            LayoutError::EmptyBlockRange => "Block range is empty",
            LayoutError::UnknownInterleave => "Unknown interleave format",
        };
        write!(f, "{msg}")
    }
}

impl core::error::Error for LayoutError {}

/// Result type for layout operations
pub type Result<T> = core::result::Result<T, LayoutError>;
