//! Synthetic raster cubes whose samples encode their own coordinates

use rastermap_core::RasterLayout;
use std::path::PathBuf;

/// Fill byte for header bytes
pub const CUBE_HEADER: u8 = 0x11;
/// Fill byte for inter-line and inter-band padding
pub const CUBE_PAD: u8 = 0xEE;

/// Bytes of the sample at `(row, column, band)`
pub fn sample_bytes(row: u32, column: u32, band: u32, element_size: u32) -> Vec<u8> {
    (0..element_size)
        .map(|k| match k {
            0 => row as u8,
            1 => column as u8,
            2 => band as u8,
            _ => 0xA5,
        })
        .collect()
}

/// Contents of a file holding `layout`
pub fn cube_bytes(layout: &RasterLayout) -> Vec<u8> {
    let total = layout.total_size_bytes().unwrap() as usize;
    let header = layout.header_offset() as usize;
    let mut bytes = vec![CUBE_PAD; total];
    bytes[..header].fill(CUBE_HEADER);

    let element_size = layout.element_size() as usize;
    for row in 0..layout.rows() {
        for column in 0..layout.columns() {
            for band in 0..layout.bands() {
                let at = layout.address(row, column, band).unwrap() as usize;
                bytes[at..at + element_size].copy_from_slice(&sample_bytes(
                    row,
                    column,
                    band,
                    layout.element_size(),
                ));
            }
        }
    }
    bytes
}

/// Write `layout`'s cube to a fresh temporary directory
pub fn write_cube(layout: &RasterLayout) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cube.raw");
    std::fs::write(&path, cube_bytes(layout)).unwrap();
    (dir, path)
}
