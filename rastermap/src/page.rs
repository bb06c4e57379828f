//! Caller-facing page leases

use crate::cache::UnitLease;
use crate::error::{PageError, Result};
use crate::view::{MappedView, WindowMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// How many samples a page's bytes represent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageExtents {
    pub rows: u32,
    pub columns: u32,
    pub bands: u32,
    /// Padding bytes between the end of one row's samples and the next row
    pub interline_bytes: u32,
}

#[derive(Debug)]
enum Backing {
    /// Bytes of the view's current window
    Mapped(MappedView),
    /// A slice of a cached decoded unit
    Cached {
        lease: UnitLease,
        offset: usize,
        len: usize,
    },
    /// Bytes copied out of the file, e.g. after byte swapping
    Owned(Vec<u8>),
}

/// Decrements a pager's outstanding-page count when dropped
#[derive(Debug)]
pub(crate) struct OutstandingGuard(Arc<AtomicUsize>);

impl OutstandingGuard {
    pub(crate) fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counter))
    }
}

impl Drop for OutstandingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A page of raster samples leased from a [`PageProvider`](crate::PageProvider)
///
/// Dropping the handle releases whatever backs it: the mapped window of a
/// view-backed page, or the cache unit reference of a cache-backed page.
/// Handles are move-only.
#[derive(Debug)]
pub struct PageHandle {
    backing: Backing,
    extents: PageExtents,
    writable: bool,
    _outstanding: Option<OutstandingGuard>,
}

impl PageHandle {
    pub(crate) fn mapped(
        view: MappedView,
        extents: PageExtents,
        writable: bool,
        outstanding: OutstandingGuard,
    ) -> Self {
        Self {
            backing: Backing::Mapped(view),
            extents,
            writable,
            _outstanding: Some(outstanding),
        }
    }

    pub(crate) fn cached(lease: UnitLease, offset: usize, len: usize, extents: PageExtents) -> Self {
        Self {
            backing: Backing::Cached { lease, offset, len },
            extents,
            writable: false,
            _outstanding: None,
        }
    }

    pub(crate) fn owned(bytes: Vec<u8>, extents: PageExtents) -> Self {
        Self {
            backing: Backing::Owned(bytes),
            extents,
            writable: false,
            _outstanding: None,
        }
    }

    /// Page bytes, starting at the first requested sample
    ///
    /// Multi-row pages include the inter-line padding between rows.
    pub fn raw_bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(view) => view
                .current_window()
                .map(|window| window.bytes())
                .unwrap_or_default(),
            Backing::Cached { lease, offset, len } => lease
                .bytes()
                .and_then(|bytes| bytes.get(*offset..*offset + *len))
                .unwrap_or(&[]),
            Backing::Owned(bytes) => bytes,
        }
    }

    /// Writable page bytes; only pages requested as writable allow this
    pub fn raw_bytes_mut(&mut self) -> Result<&mut [u8]> {
        if !self.writable {
            return Err(PageError::WriteNotPermitted.into());
        }
        match &mut self.backing {
            Backing::Mapped(view) => Ok(view
                .current_window_mut()?
                .map(WindowMut::into_bytes_mut)
                .unwrap_or_default()),
            Backing::Cached { .. } | Backing::Owned(_) => Err(PageError::WriteNotPermitted.into()),
        }
    }

    /// Page bytes as samples of type `T`
    ///
    /// Fails when the bytes are not a whole number of `T`s or are not aligned
    /// for `T`.
    pub fn samples<T: bytemuck::Pod>(&self) -> Result<&[T]> {
        bytemuck::try_cast_slice(self.raw_bytes())
            .map_err(|_| PageError::SampleCast(std::any::type_name::<T>()).into())
    }

    pub fn extents(&self) -> PageExtents {
        self.extents
    }

    pub fn rows(&self) -> u32 {
        self.extents.rows
    }

    pub fn columns(&self) -> u32 {
        self.extents.columns
    }

    pub fn bands(&self) -> u32 {
        self.extents.bands
    }

    pub fn interline_bytes(&self) -> u32 {
        self.extents.interline_bytes
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Whether the page is served from the block cache
    pub fn is_cached(&self) -> bool {
        matches!(self.backing, Backing::Cached { .. })
    }

    /// Lowest block of a cache-backed page's unit
    pub fn first_block(&self) -> Option<u64> {
        match &self.backing {
            Backing::Cached { lease, .. } => Some(lease.blocks().first()),
            _ => None,
        }
    }

    /// Highest block of a cache-backed page's unit
    pub fn last_block(&self) -> Option<u64> {
        match &self.backing {
            Backing::Cached { lease, .. } => Some(lease.blocks().last()),
            _ => None,
        }
    }

    /// Release the page; same as dropping it
    pub fn release(self) {}
}
