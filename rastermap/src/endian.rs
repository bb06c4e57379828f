//! In-place byte order conversion of raster rows

use rayon::prelude::*;

/// Pages at least this large are swapped in parallel
const PARALLEL_THRESHOLD: usize = 1 << 20;

/// Reverse the bytes of every `element_size`-byte element in `bytes`
///
/// Trailing bytes that do not form a whole element are left alone.
pub fn swap_elements(bytes: &mut [u8], element_size: usize) {
    if element_size < 2 {
        return;
    }
    for element in bytes.chunks_exact_mut(element_size) {
        element.reverse();
    }
}

/// Swap the elements of consecutive rows laid out `row_stride` bytes apart
///
/// Only the first `row_data_bytes` of each row hold samples; the inter-line
/// padding after them is not touched.
pub fn swap_rows(bytes: &mut [u8], element_size: usize, row_data_bytes: usize, row_stride: usize) {
    if element_size < 2 || row_stride == 0 {
        return;
    }
    let data = row_data_bytes.min(row_stride);
    let swap_row = |row: &mut [u8]| {
        let end = data.min(row.len());
        swap_elements(&mut row[..end], element_size);
    };

    if bytes.len() >= PARALLEL_THRESHOLD {
        bytes.par_chunks_mut(row_stride).for_each(swap_row);
    } else {
        bytes.chunks_mut(row_stride).for_each(swap_row);
    }
}
