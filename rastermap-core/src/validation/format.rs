//! Alignment arithmetic for mapping boundaries

use crate::LayoutError;

/// Align an offset up to the next multiple of `boundary`
///
/// `boundary` must be a power of two. Returns `None` on overflow.
pub const fn align_to_boundary(offset: u64, boundary: u64) -> Option<u64> {
    match offset.checked_add(boundary - 1) {
        Some(v) => Some(v & !(boundary - 1)),
        None => None,
    }
}

/// Align an offset down to the previous multiple of `boundary`
///
/// `boundary` must be a power of two.
pub const fn align_down(offset: u64, boundary: u64) -> u64 {
    offset & !(boundary - 1)
}

/// Validate that a granularity is a power of 2
pub const fn validate_granularity(granularity: u64) -> Result<(), LayoutError> {
    if granularity == 0 || (granularity & (granularity - 1)) != 0 {
        return Err(LayoutError::InvalidGranularity);
    }
    Ok(())
}
