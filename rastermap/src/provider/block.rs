//! Block-compressed pages served from a decoded block cache

use super::{PageProvider, PageRequest};
use crate::cache::{BlockCache, UnitLease};
use crate::config::CacheConfig;
use crate::error::{Error, PageError, Result};
use crate::page::{PageExtents, PageHandle};
use parking_lot::Mutex;
use rastermap_core::{BlockDecoder, BlockGeometry, BlockRange, LayoutError};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Pages of whole decoded rows, each block range decoded once while cached
///
/// Acquiring a unit and decoding into it happen under one pager-wide lock,
/// so concurrent requests for the same blocks never decode twice. Reading
/// a page needs no lock.
pub struct BlockPager<D> {
    decoder: D,
    geometry: BlockGeometry,
    row_bytes: usize,
    block_size: usize,
    blocks_per_fetch: u64,
    cache: BlockCache,
    lock: Mutex<()>,
    decodes: AtomicU64,
}

impl<D> BlockPager<D> {
    /// Decode at least `blocks` blocks per cache miss
    ///
    /// Later requests falling inside an earlier, wider fetch are served from
    /// it without decoding.
    pub fn with_blocks_per_fetch(mut self, blocks: u64) -> Self {
        self.blocks_per_fetch = blocks.max(1);
        self
    }

    pub fn geometry(&self) -> &BlockGeometry {
        &self.geometry
    }

    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Number of times the decoder has been invoked
    pub fn decode_count(&self) -> u64 {
        self.decodes.load(Ordering::Acquire)
    }
}

impl<D> BlockPager<D>
where
    D: BlockDecoder,
    D::Error: fmt::Display,
{
    pub fn new(decoder: D, cache: CacheConfig) -> Result<Self> {
        let geometry = decoder.geometry();
        geometry.validate()?;
        let to_usize = |bytes: u64| usize::try_from(bytes).map_err(|_| LayoutError::SizeOverflow);
        let row_bytes = to_usize(geometry.row_bytes()?)?;
        let block_size = to_usize(geometry.block_size_bytes()?)?;

        Ok(Self {
            decoder,
            geometry,
            row_bytes,
            block_size,
            blocks_per_fetch: 1,
            cache: BlockCache::new(cache),
            lock: Mutex::new(()),
            decodes: AtomicU64::new(0),
        })
    }

    fn lease_for(&self, needed: &BlockRange) -> Result<UnitLease> {
        let _serialized = self.lock.lock();

        if let Some(lease) = self.cache.acquire_covering(needed) {
            return Ok(lease);
        }

        let last_block = self.geometry.block_count() - 1;
        let fetch_last = needed
            .first()
            .saturating_add(self.blocks_per_fetch - 1)
            .max(needed.last())
            .min(last_block);
        let fetch = BlockRange::contiguous(needed.first(), fetch_last)?;

        let lease = self.cache.acquire(&fetch, self.block_size)?;
        if lease.is_empty() {
            self.decodes.fetch_add(1, Ordering::AcqRel);
            trace!(first = fetch.first(), last = fetch.last(), "decoding blocks");

            let decoded = lease.populate_with(|buffer| {
                self.decoder
                    .decode(&fetch, buffer)
                    .map_err(|e| Error::from(PageError::Decode(e.to_string())))
            });
            if let Err(e) = decoded {
                // a unit that failed to decode must not be served later
                self.cache.invalidate(&fetch);
                return Err(e);
            }
        }
        Ok(lease)
    }
}

impl<D> PageProvider for BlockPager<D>
where
    D: BlockDecoder,
    D::Error: fmt::Display,
{
    fn get_page(&self, request: &PageRequest) -> Result<PageHandle> {
        if request.writable {
            return Err(PageError::WriteNotPermitted.into());
        }
        if request.start_column != 0 || request.start_band != 0 {
            return Err(PageError::Unsupported("block pages start at column 0 and band 0").into());
        }
        let row = request.start_row;
        if row >= self.geometry.rows {
            return Err(PageError::EndOfData.into());
        }

        let rows = request.rows_within(self.geometry.rows - row);
        let needed = self.geometry.blocks_for_rows(row, rows)?;
        let lease = self.lease_for(&needed)?;

        let block = self.geometry.block_of_row(row);
        let position = lease
            .blocks()
            .position(block)
            .ok_or(PageError::OutOfBounds)?;
        let row_in_block = (row as u64 - self.geometry.first_row_of_block(block)) as usize;
        let offset = position * self.block_size + row_in_block * self.row_bytes;
        let len = rows as usize * self.row_bytes;

        let extents = PageExtents {
            rows,
            columns: self.geometry.columns,
            bands: self.geometry.bands,
            interline_bytes: 0,
        };
        Ok(PageHandle::cached(lease, offset, len, extents))
    }
}

impl<D: fmt::Debug> fmt::Debug for BlockPager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPager")
            .field("decoder", &self.decoder)
            .field("geometry", &self.geometry)
            .field("blocks_per_fetch", &self.blocks_per_fetch)
            .field("cache", &self.cache)
            .field("decodes", &self.decode_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    /// Writes `(row, column, band, 0x5C)` for every sample
    #[derive(Debug, Default)]
    struct CoordinateDecoder {
        fail: AtomicBool,
    }

    impl BlockDecoder for CoordinateDecoder {
        type Error = String;

        fn geometry(&self) -> BlockGeometry {
            BlockGeometry {
                rows_per_block: 4,
                rows: 10,
                columns: 3,
                bands: 2,
                element_size: 4,
            }
        }

        fn decode(&self, blocks: &BlockRange, out: &mut [u8]) -> std::result::Result<(), String> {
            if self.fail.load(Ordering::Acquire) {
                return Err("corrupt codestream".to_string());
            }
            let geometry = self.geometry();
            let block_size = geometry.block_size_bytes().unwrap() as usize;
            for (position, block) in blocks.iter().enumerate() {
                let first_row = geometry.first_row_of_block(block) as u32;
                let block_out = &mut out[position * block_size..(position + 1) * block_size];
                for (i, sample) in block_out.chunks_exact_mut(4).enumerate() {
                    let i = i as u32;
                    let row = first_row + i / (geometry.columns * geometry.bands);
                    let column = i / geometry.bands % geometry.columns;
                    let band = i % geometry.bands;
                    sample.copy_from_slice(&[row as u8, column as u8, band as u8, 0x5C]);
                }
            }
            Ok(())
        }
    }

    fn pager() -> BlockPager<CoordinateDecoder> {
        BlockPager::new(CoordinateDecoder::default(), CacheConfig::with_max_units(8)).unwrap()
    }

    #[test]
    fn test_page_starts_at_requested_row() {
        let pager = pager();
        let page = pager
            .get_page(&PageRequest::new(5, 0, 0).with_concurrent_rows(2))
            .unwrap();

        assert!(page.is_cached());
        assert_eq!((page.rows(), page.columns(), page.bands()), (2, 3, 2));
        assert_eq!(page.raw_bytes().len(), 2 * 24);
        assert_eq!(page.raw_bytes()[..4], [5, 0, 0, 0x5C]);
        assert_eq!(page.raw_bytes()[24..28], [6, 0, 0, 0x5C]);
        assert_eq!(page.raw_bytes()[44..48], [6, 2, 1, 0x5C]);
        assert_eq!((page.first_block(), page.last_block()), (Some(1), Some(1)));
    }

    #[test]
    fn test_overlapping_requests_share_a_decode() {
        let pager = pager();
        let first = pager.get_page(&PageRequest::new(4, 0, 0)).unwrap();
        let second = pager
            .get_page(&PageRequest::new(5, 0, 0).with_concurrent_rows(3))
            .unwrap();
        assert_eq!(pager.decode_count(), 1);
        assert_eq!(first.first_block(), second.first_block());

        // rows 7 and 8 straddle blocks 1 and 2
        let straddling = pager
            .get_page(&PageRequest::new(7, 0, 0).with_concurrent_rows(2))
            .unwrap();
        assert_eq!(pager.decode_count(), 2);
        assert_eq!((straddling.first_block(), straddling.last_block()), (Some(1), Some(2)));
        assert_eq!(straddling.raw_bytes()[..4], [7, 0, 0, 0x5C]);
        assert_eq!(straddling.raw_bytes()[24..28], [8, 0, 0, 0x5C]);

        // block 2 alone is covered by the straddling unit
        let inside = pager.get_page(&PageRequest::new(9, 0, 0)).unwrap();
        assert_eq!(pager.decode_count(), 2);
        assert_eq!(inside.raw_bytes()[..4], [9, 0, 0, 0x5C]);
    }

    #[test]
    fn test_wide_fetches() {
        let pager = pager().with_blocks_per_fetch(8);
        let page = pager.get_page(&PageRequest::new(0, 0, 0)).unwrap();
        assert_eq!((page.first_block(), page.last_block()), (Some(0), Some(2)));

        for row in 0..10 {
            let page = pager.get_page(&PageRequest::new(row, 0, 0)).unwrap();
            assert_eq!(page.raw_bytes()[..4], [row as u8, 0, 0, 0x5C]);
        }
        assert_eq!(pager.decode_count(), 1);
    }

    #[test]
    fn test_rejected_requests() {
        let pager = pager();
        let cases = [
            (PageRequest::new(0, 0, 0).with_writable(true), PageError::WriteNotPermitted),
            (PageRequest::new(10, 0, 0), PageError::EndOfData),
        ];
        for (request, expected) in cases {
            match pager.get_page(&request).unwrap_err() {
                Error::Page(err) => assert_eq!(err, expected),
                other => panic!("unexpected error {other}"),
            }
        }
        assert!(matches!(
            pager.get_page(&PageRequest::new(0, 1, 0)).unwrap_err(),
            Error::Page(PageError::Unsupported(_))
        ));
        assert_eq!(pager.decode_count(), 0);
    }

    #[test]
    fn test_decode_failure_is_not_cached() {
        let pager = pager();
        pager.decoder().fail.store(true, Ordering::Release);
        let err = pager.get_page(&PageRequest::new(0, 0, 0)).unwrap_err();
        assert!(matches!(err, Error::Page(PageError::Decode(ref msg)) if msg == "corrupt codestream"));
        assert!(pager.cache().is_empty());

        pager.decoder().fail.store(false, Ordering::Release);
        let page = pager.get_page(&PageRequest::new(0, 0, 0)).unwrap();
        assert_eq!(page.raw_bytes()[..4], [0, 0, 0, 0x5C]);
        assert_eq!(pager.decode_count(), 2);
    }

    #[test]
    fn test_released_pages_become_evictable() {
        let pager = BlockPager::new(CoordinateDecoder::default(), CacheConfig::with_max_units(1))
            .unwrap();
        let held = pager.get_page(&PageRequest::new(0, 0, 0)).unwrap();
        let other = pager.get_page(&PageRequest::new(4, 0, 0)).unwrap();
        assert_eq!(pager.cache().len(), 2);

        pager.release_page(held);
        pager.release_page(other);
        let _third = pager.get_page(&PageRequest::new(8, 0, 0)).unwrap();
        assert_eq!(pager.cache().len(), 1);
        assert_eq!(pager.cache().stats().evictions, 2);
    }

    #[test]
    fn test_concurrent_requests_decode_once() {
        let pager = pager();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let pager = &pager;
                scope.spawn(move || {
                    let page = pager.get_page(&PageRequest::new(2, 0, 0)).unwrap();
                    assert_eq!(page.raw_bytes()[..4], [2, 0, 0, 0x5C]);
                });
            }
        });
        assert_eq!(pager.decode_count(), 1);
    }

    #[test]
    fn test_debug_reports_decodes() {
        let pager = pager();
        let _page = pager.get_page(&PageRequest::new(0, 0, 0)).unwrap();
        let rendered = format!("{pager:?}");
        assert!(rendered.starts_with("BlockPager"));
        assert!(rendered.contains("decodes: 1"));
        assert!(rendered.contains("blocks_per_fetch: 1"));
    }
}
