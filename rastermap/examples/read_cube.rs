//! Write a small synthetic cube, then read it back through views and pagers

use rastermap::{
    BlockCache, BlockRange, InterleaveFormat, MappedPager, MatrixMapper, PageProvider,
    PageRequest, PagerConfig, RasterLayout,
};
use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let layout = RasterLayout::builder(InterleaveFormat::Bsq, 256, 320, 3)
        .element_size(2)
        .inter_line_pad(4)
        .header_offset(128)
        .build()?;

    let dir = std::env::temp_dir().join("rastermap-demo");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("cube.bsq");

    println!("Writing {} byte cube to '{}'...", layout.total_size_bytes()?, path.display());
    let mut bytes = vec![0u8; layout.total_size_bytes()? as usize];
    for band in 0..layout.bands() {
        for row in 0..layout.rows() {
            for column in 0..layout.columns() {
                let at = layout.address(row, column, band)? as usize;
                let value = (row * 7 + column * 3 + band * 1000) as u16;
                bytes[at..at + 2].copy_from_slice(&value.to_ne_bytes());
            }
        }
    }
    std::fs::write(&path, &bytes)?;

    // Scan the whole file in windows
    let mapper = MatrixMapper::open(&path, layout)?;
    println!(
        "File size: {} bytes, granularity: {} bytes",
        mapper.file_size_bytes()?,
        mapper.granularity()?
    );
    let start = Instant::now();
    let mut view = mapper.create_view(64 * 1024)?;
    let mut windows = 0;
    let mut scanned = 0;
    let mut window = view.first_window()?;
    while let Some(current) = window {
        windows += 1;
        scanned += current.bytes().len();
        window = view.next_window()?;
    }
    println!(
        "Scanned {scanned} bytes in {windows} windows in {:.3}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    drop(view);

    // Read a few samples through the mapped pager
    let pager = MappedPager::open(&path, layout, PagerConfig::default())?;
    for (row, column, band) in [(0, 0, 0), (100, 17, 1), (255, 319, 2)] {
        let page = pager.get_page(&PageRequest::new(row, column, band))?;
        let value = u16::from_ne_bytes([page.raw_bytes()[0], page.raw_bytes()[1]]);
        println!("   cube[{row}, {column}, {band}] = {value}");
    }

    // Show block cache reuse
    let cache = BlockCache::with_capacity(2);
    let first = cache.acquire(&BlockRange::contiguous(0, 3)?, 4096)?;
    first.populate(&[1; 4096])?;
    let again = cache.acquire(&BlockRange::contiguous(0, 3)?, 4096)?;
    println!(
        "Block cache: same unit = {}, references = {}, stats = {:?}",
        rastermap::UnitLease::ptr_eq(&first, &again),
        again.reference_count(),
        cache.stats()
    );

    drop(pager);
    std::fs::remove_file(&path)?;
    Ok(())
}
