//! Window placement against file extents

use super::format::{align_down, align_to_boundary, validate_granularity};
use crate::LayoutError;

/// Where a window lands in a file
///
/// `base` is granularity aligned; `offset` is the distance from `base` to the
/// requested address. `mapped_len` bytes starting at `base` must be mapped;
/// the caller's logical window is the `logical_len` bytes starting at
/// `base + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    pub base: u64,
    pub offset: u64,
    pub mapped_len: u64,
    pub logical_len: u64,
}

impl WindowPlan {
    /// File offset the caller asked for
    pub const fn address(&self) -> u64 {
        self.base + self.offset
    }

    /// File offset one past the mapped bytes
    pub const fn mapped_end(&self) -> u64 {
        self.base + self.mapped_len
    }
}

/// Window sizes must be non-zero
pub const fn validate_window_size(bytes: u64) -> Result<(), LayoutError> {
    if bytes == 0 {
        return Err(LayoutError::InvalidDimensions);
    }
    Ok(())
}

/// Place a window of `requested` bytes at `address`
///
/// The mapped length is `requested + offset` rounded up to `granularity` and
/// clamped to the end of file. Returns `Ok(None)` when `address` is at or past
/// `file_size`: end of file is not an error.
pub const fn plan_window(
    address: u64,
    requested: u64,
    granularity: u64,
    file_size: u64,
) -> Result<Option<WindowPlan>, LayoutError> {
    if let Err(e) = validate_granularity(granularity) {
        return Err(e);
    }
    if let Err(e) = validate_window_size(requested) {
        return Err(e);
    }
    if address >= file_size {
        return Ok(None);
    }

    let base = align_down(address, granularity);
    let offset = address - base;
    let wanted = match requested.checked_add(offset) {
        Some(v) => v,
        None => return Err(LayoutError::SizeOverflow),
    };
    let aligned = match align_to_boundary(wanted, granularity) {
        Some(v) => v,
        None => u64::MAX,
    };

    let available = file_size - base;
    let mapped_len = if aligned < available { aligned } else { available };
    let remaining = file_size - address;
    let logical_len = if requested < remaining { requested } else { remaining };

    Ok(Some(WindowPlan {
        base,
        offset,
        mapped_len,
        logical_len,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_window_inside_file() {
        let plan = plan_window(5000, 1000, 4096, 1 << 20).unwrap().unwrap();
        assert_eq!(plan.base, 4096);
        assert_eq!(plan.offset, 904);
        assert_eq!(plan.mapped_len, 4096);
        assert_eq!(plan.logical_len, 1000);
        assert_eq!(plan.address(), 5000);
    }

    #[test]
    fn test_plan_window_spanning_granules() {
        let plan = plan_window(4000, 200, 4096, 1 << 20).unwrap().unwrap();
        assert_eq!(plan.base, 0);
        assert_eq!(plan.mapped_len, 8192);
        assert_eq!(plan.logical_len, 200);
    }

    #[test]
    fn test_plan_window_clamped_at_end_of_file() {
        let file_size = 10_000;
        let plan = plan_window(9000, 4096, 4096, file_size).unwrap().unwrap();
        assert_eq!(plan.base, 8192);
        assert_eq!(plan.mapped_len, file_size - plan.base);
        assert_eq!(plan.mapped_end(), file_size);
        assert_eq!(plan.logical_len, 1000);
    }

    #[test]
    fn test_plan_window_at_or_past_end_of_file() {
        assert_eq!(plan_window(10_000, 16, 4096, 10_000), Ok(None));
        assert_eq!(plan_window(50_000, 16, 4096, 10_000), Ok(None));
        assert_eq!(plan_window(0, 16, 4096, 0), Ok(None));
    }

    #[test]
    fn test_plan_window_rejects_bad_inputs() {
        assert_eq!(
            plan_window(0, 16, 3000, 10_000),
            Err(LayoutError::InvalidGranularity)
        );
        assert_eq!(
            plan_window(0, 0, 4096, 10_000),
            Err(LayoutError::InvalidDimensions)
        );
    }

    #[test]
    fn test_plan_window_base_always_aligned() {
        for address in (0..20_000u64).step_by(333) {
            let plan = plan_window(address, 777, 1024, 20_000).unwrap().unwrap();
            assert_eq!(plan.base % 1024, 0);
            assert!(plan.base <= address && address < plan.base + 1024);
            assert!(plan.mapped_end() <= 20_000);
            assert!(plan.offset + plan.logical_len <= plan.mapped_len);
        }
    }
}
