//! Uncompressed pages served through mapped views

use super::{PageProvider, PageRequest};
use crate::config::PagerConfig;
use crate::endian::{swap_elements, swap_rows};
use crate::error::{PageError, Result};
use crate::mapper::MatrixMapper;
use crate::page::{OutstandingGuard, PageExtents, PageHandle};
use parking_lot::Mutex;
use rastermap_core::{InterleaveFormat, LayoutError, RasterLayout};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Pages of a raw interleaved raster, one mapped view per page
///
/// The raster is either one interleaved file or one file per band. When the
/// configured byte order differs from the host's, pages are copied and
/// swapped instead of handed out as mapped bytes.
#[derive(Debug)]
pub struct MappedPager {
    mappers: Vec<MatrixMapper>,
    layout: RasterLayout,
    config: PagerConfig,
    band_files: bool,
    lock: Mutex<()>,
    outstanding: Arc<AtomicUsize>,
}

impl MappedPager {
    /// Pager over a single interleaved file
    ///
    /// The file is opened writable only if `config.writable` is set.
    pub fn open<P: AsRef<Path>>(path: P, layout: RasterLayout, config: PagerConfig) -> Result<Self> {
        let layout = layout.to_builder().read_only(!config.writable).build()?;
        let mapper = MatrixMapper::open_with_config(path, layout, &config.mapper)?;
        Ok(Self {
            mappers: vec![mapper],
            layout,
            config,
            band_files: false,
            lock: Mutex::new(()),
            outstanding: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Pager over one single-band file per band of `layout`
    ///
    /// Band files are always opened read-only.
    pub fn open_band_files<P: AsRef<Path>>(
        paths: &[P],
        layout: RasterLayout,
        config: PagerConfig,
    ) -> Result<Self> {
        if paths.len() != layout.bands() as usize {
            return Err(PageError::Unsupported("band file count differs from band count").into());
        }
        let band_layout = layout.to_builder().bands(1).read_only(true).build()?;
        let mappers = paths
            .iter()
            .map(|path| MatrixMapper::open_with_config(path, band_layout, &config.mapper))
            .collect::<Result<Vec<_>>>()?;
        debug!(bands = mappers.len(), "opened band files");

        Ok(Self {
            mappers,
            layout,
            config,
            band_files: true,
            lock: Mutex::new(()),
            outstanding: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Logical layout of the whole raster
    pub fn layout(&self) -> &RasterLayout {
        &self.layout
    }

    pub fn config(&self) -> &PagerConfig {
        &self.config
    }

    /// Number of view-backed pages handed out and not yet released
    pub fn outstanding_pages(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    fn writes_permitted(&self) -> bool {
        self.config.writable && !self.band_files && !self.config.swaps_bytes()
    }
}

impl PageProvider for MappedPager {
    fn get_page(&self, request: &PageRequest) -> Result<PageHandle> {
        let _serialized = self.lock.lock();

        if request.writable && !self.writes_permitted() {
            return Err(PageError::WriteNotPermitted.into());
        }

        let row = request
            .start_row
            .checked_add(self.config.row_origin)
            .ok_or(PageError::OutOfBounds)?;
        let column = request
            .start_column
            .checked_add(self.config.column_origin)
            .ok_or(PageError::OutOfBounds)?;
        let band = request.start_band;
        if row >= self.layout.rows() {
            return Err(PageError::EndOfData.into());
        }
        if !self.layout.contains(row, column, band) {
            return Err(PageError::OutOfBounds.into());
        }

        let (mapper, file_band) = if self.band_files {
            (&self.mappers[band as usize], 0)
        } else {
            (&self.mappers[0], band)
        };
        let file_layout = mapper.layout()?;

        let rows = request.rows_within(self.layout.rows() - row);
        let row_stride = file_layout.row_stride()?;
        let segment = row_stride
            .checked_mul(rows as u64)
            .ok_or(LayoutError::SizeOverflow)?;

        let mut view = mapper.create_view(segment)?;
        if view.window_at(row, column, file_band)?.is_none() {
            return Err(PageError::EndOfData.into());
        }
        trace!(row, column, band, rows, segment, "mapped page");

        let extents = PageExtents {
            rows,
            columns: self.layout.columns(),
            bands: self.layout.bands_per_page(),
            interline_bytes: self.layout.inter_line_pad_bytes(),
        };

        if !self.config.swaps_bytes() {
            let outstanding = OutstandingGuard::new(&self.outstanding);
            return Ok(PageHandle::mapped(view, extents, request.writable, outstanding));
        }

        // Copy out the page up to its last sample and swap it
        let pad = file_layout.inter_line_pad_bytes() as u64;
        let row_data = row_stride - pad;
        let row_start_band = match file_layout.interleave() {
            InterleaveFormat::Bsq => file_band,
            InterleaveFormat::Bip | InterleaveFormat::Bil => 0,
        };
        let lead = file_layout.address(row, column, file_band)?
            - file_layout.address(row, 0, row_start_band)?;
        let wanted = (rows as u64 - 1) * row_stride + row_data - lead;

        let mut bytes = view
            .current_window()
            .map(|window| window.bytes().to_vec())
            .unwrap_or_default();
        drop(view);
        bytes.truncate(wanted as usize);

        let element_size = file_layout.element_size() as usize;
        let first = ((row_data - lead) as usize).min(bytes.len());
        swap_elements(&mut bytes[..first], element_size);
        if let Some(rest) = bytes.get_mut(first + pad as usize..) {
            swap_rows(rest, element_size, row_data as usize, row_stride as usize);
        }

        Ok(PageHandle::owned(bytes, extents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MapperConfig, MappingBackend};
    use crate::test_support::{cube_bytes, sample_bytes, write_cube, CUBE_PAD};
    use crate::Error;
    use rastermap_core::ByteOrder;

    fn padded(interleave: InterleaveFormat) -> RasterLayout {
        RasterLayout::builder(interleave, 7, 9, 3)
            .element_size(4)
            .inter_line_pad(4)
            .inter_band_pad(8)
            .header_offset(24)
            .build()
            .unwrap()
    }

    fn foreign_order() -> ByteOrder {
        match ByteOrder::native() {
            ByteOrder::Little => ByteOrder::Big,
            ByteOrder::Big => ByteOrder::Little,
        }
    }

    #[test]
    fn test_bip_page_spans_rows_with_padding() {
        let layout = padded(InterleaveFormat::Bip);
        let (_dir, path) = write_cube(&layout);
        let file = cube_bytes(&layout);
        let pager = MappedPager::open(&path, layout, PagerConfig::default()).unwrap();

        let page = pager
            .get_page(&PageRequest::new(2, 0, 0).with_concurrent_rows(2))
            .unwrap();
        assert_eq!(page.rows(), 2);
        assert_eq!(page.columns(), 9);
        assert_eq!(page.bands(), 3);
        assert_eq!(page.interline_bytes(), 4);
        assert!(!page.is_cached());
        assert_eq!(page.first_block(), None);

        let start = layout.address(2, 0, 0).unwrap() as usize;
        assert_eq!(page.raw_bytes(), &file[start..start + 2 * 112]);
        assert_eq!(page.raw_bytes()[108..112], [CUBE_PAD; 4]);
        assert_eq!(page.raw_bytes()[112..116], sample_bytes(3, 0, 0, 4)[..]);
    }

    #[test]
    fn test_page_rows_clamp_at_last_row() {
        let layout = padded(InterleaveFormat::Bil);
        let (_dir, path) = write_cube(&layout);
        let pager = MappedPager::open(&path, layout, PagerConfig::default()).unwrap();

        let page = pager
            .get_page(&PageRequest::new(5, 0, 0).with_concurrent_rows(10))
            .unwrap();
        assert_eq!(page.rows(), 2);
        assert_eq!(page.raw_bytes().len(), 2 * 112);
    }

    #[test]
    fn test_bsq_page_holds_one_band() {
        let layout = padded(InterleaveFormat::Bsq);
        let (_dir, path) = write_cube(&layout);
        let pager = MappedPager::open(&path, layout, PagerConfig::default()).unwrap();

        let page = pager.get_page(&PageRequest::new(6, 0, 2)).unwrap();
        assert_eq!(page.bands(), 1);
        assert_eq!(page.raw_bytes().len(), 40);
        assert_eq!(page.raw_bytes()[..4], sample_bytes(6, 0, 2, 4)[..]);
        assert_eq!(page.raw_bytes()[32..36], sample_bytes(6, 8, 2, 4)[..]);
    }

    #[test]
    fn test_origin_offsets_requests() {
        let layout = padded(InterleaveFormat::Bip);
        let (_dir, path) = write_cube(&layout);
        let config = PagerConfig::default().with_origin(1, 2);
        let pager = MappedPager::open(&path, layout, config).unwrap();

        let page = pager.get_page(&PageRequest::new(0, 0, 1)).unwrap();
        assert_eq!(page.raw_bytes()[..4], sample_bytes(1, 2, 1, 4)[..]);

        assert!(matches!(
            pager.get_page(&PageRequest::new(6, 0, 0)).unwrap_err(),
            Error::Page(PageError::EndOfData)
        ));
        assert!(matches!(
            pager.get_page(&PageRequest::new(0, 7, 0)).unwrap_err(),
            Error::Page(PageError::OutOfBounds)
        ));
        assert!(matches!(
            pager.get_page(&PageRequest::new(0, 0, 3)).unwrap_err(),
            Error::Page(PageError::OutOfBounds)
        ));
    }

    #[test]
    fn test_outstanding_pages() {
        let layout = padded(InterleaveFormat::Bip);
        let (_dir, path) = write_cube(&layout);
        let pager = MappedPager::open(&path, layout, PagerConfig::default()).unwrap();

        let first = pager.get_page(&PageRequest::new(0, 0, 0)).unwrap();
        let second = pager.get_page(&PageRequest::new(1, 0, 0)).unwrap();
        assert_eq!(pager.outstanding_pages(), 2);
        pager.release_page(first);
        assert_eq!(pager.outstanding_pages(), 1);
        drop(second);
        assert_eq!(pager.outstanding_pages(), 0);
    }

    #[test]
    fn test_writable_pages() {
        let layout = padded(InterleaveFormat::Bsq);
        let (_dir, path) = write_cube(&layout);

        let read_only = MappedPager::open(&path, layout, PagerConfig::default()).unwrap();
        let request = PageRequest::new(3, 4, 1).with_writable(true);
        assert!(matches!(
            read_only.get_page(&request).unwrap_err(),
            Error::Page(PageError::WriteNotPermitted)
        ));
        drop(read_only);

        let pager =
            MappedPager::open(&path, layout, PagerConfig::default().with_writable(true)).unwrap();
        let mut page = pager.get_page(&request).unwrap();
        page.raw_bytes_mut().unwrap()[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        drop(page);

        let at = layout.address(3, 4, 1).unwrap() as usize;
        assert_eq!(std::fs::read(&path).unwrap()[at..at + 4], [0xDE, 0xAD, 0xBE, 0xEF]);

        let mut unrequested = pager.get_page(&PageRequest::new(0, 0, 0)).unwrap();
        assert!(matches!(
            unrequested.raw_bytes_mut().unwrap_err(),
            Error::Page(PageError::WriteNotPermitted)
        ));
    }

    #[test]
    fn test_band_files() {
        let band_layout = RasterLayout::builder(InterleaveFormat::Bsq, 4, 5, 1)
            .element_size(4)
            .build()
            .unwrap();
        let files: Vec<_> = (0..3).map(|_| write_cube(&band_layout)).collect();
        // mark each band file's first byte with its band number
        for (band, (_, path)) in files.iter().enumerate() {
            let mut bytes = std::fs::read(path).unwrap();
            bytes[2] = band as u8;
            std::fs::write(path, bytes).unwrap();
        }
        let paths: Vec<_> = files.iter().map(|(_, path)| path.clone()).collect();

        let layout = band_layout.to_builder().bands(3).build().unwrap();
        let config = PagerConfig::default().with_writable(true);
        let pager = MappedPager::open_band_files(&paths, layout, config).unwrap();
        assert_eq!(pager.layout().bands(), 3);

        let page = pager.get_page(&PageRequest::new(0, 0, 2)).unwrap();
        assert_eq!(page.raw_bytes()[..4], [0, 0, 2, 0xA5]);
        assert_eq!(page.bands(), 1);

        let page = pager.get_page(&PageRequest::new(3, 1, 1)).unwrap();
        assert_eq!(page.raw_bytes()[..4], sample_bytes(3, 1, 0, 4)[..]);

        assert!(matches!(
            pager
                .get_page(&PageRequest::new(0, 0, 0).with_writable(true))
                .unwrap_err(),
            Error::Page(PageError::WriteNotPermitted)
        ));
        assert!(matches!(
            MappedPager::open_band_files(&paths[..2], layout, PagerConfig::default()).unwrap_err(),
            Error::Page(PageError::Unsupported(_))
        ));
    }

    #[test]
    fn test_foreign_byte_order_pages_are_swapped() {
        let layout = padded(InterleaveFormat::Bil);
        let (_dir, path) = write_cube(&layout);
        let file = cube_bytes(&layout);
        let config = PagerConfig::default()
            .with_byte_order(foreign_order())
            .with_mapper(MapperConfig::default().with_backend(MappingBackend::Buffered));
        let pager = MappedPager::open(&path, layout, config).unwrap();

        let page = pager
            .get_page(&PageRequest::new(2, 3, 1).with_concurrent_rows(2))
            .unwrap();
        assert_eq!(pager.outstanding_pages(), 0);

        // 15 samples to the end of row 2, 4 pad bytes, then all of row 3
        let start = layout.address(2, 3, 1).unwrap() as usize;
        let mut expected = file[start..start + 172].to_vec();
        for sample in expected[..60].chunks_mut(4) {
            sample.reverse();
        }
        for sample in expected[64..].chunks_mut(4) {
            sample.reverse();
        }
        assert_eq!(page.raw_bytes(), &expected[..]);
        assert_eq!(page.raw_bytes()[..4], [0xA5, 1, 3, 2]);
        assert_eq!(page.raw_bytes()[60..64], [CUBE_PAD; 4]);

        assert!(matches!(
            pager
                .get_page(&PageRequest::new(0, 0, 0).with_writable(true))
                .unwrap_err(),
            Error::Page(PageError::WriteNotPermitted)
        ));
    }

    #[test]
    fn test_pages_from_many_threads() {
        let layout = padded(InterleaveFormat::Bip);
        let (_dir, path) = write_cube(&layout);
        let pager = MappedPager::open(&path, layout, PagerConfig::default()).unwrap();

        std::thread::scope(|scope| {
            for row in 0..layout.rows() {
                let pager = &pager;
                scope.spawn(move || {
                    let page = pager.get_page(&PageRequest::new(row, 0, 0)).unwrap();
                    assert_eq!(page.raw_bytes()[..4], sample_bytes(row, 0, 0, 4)[..]);
                });
            }
        });
        assert_eq!(pager.outstanding_pages(), 0);
    }
}
