//! Single-window views into a mapped raster file
//!
//! A [`MappedView`] holds at most one mapped window at a time. Asking for a
//! new window releases the previous one first. The window is handed out as a
//! [`Window`] borrowing the view, so the borrow checker guarantees no slice
//! into a released mapping survives the next request.

use crate::error::{IoError, Result};
use crate::mapper::MapperShared;
use crate::platform::MappedRegion;
use rastermap_core::{plan_window, WindowPlan};
use std::sync::Arc;
use tracing::{trace, warn};

/// Record of the most recent window that failed to map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFault {
    pub base: u64,
    pub len: u64,
    pub kind: std::io::ErrorKind,
}

#[derive(Debug)]
struct ActiveWindow {
    region: Box<dyn MappedRegion>,
    plan: WindowPlan,
}

/// A read-only borrow of the currently mapped window
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    plan: WindowPlan,
    mapped: &'a [u8],
}

impl<'a> Window<'a> {
    /// The caller's logical window: from the requested address for the
    /// requested size, clamped at end of file
    pub fn bytes(&self) -> &'a [u8] {
        let start = self.plan.offset as usize;
        &self.mapped[start..start + self.plan.logical_len as usize]
    }

    /// Everything mapped, starting at the aligned base
    pub fn mapped(&self) -> &'a [u8] {
        self.mapped
    }

    /// Requested file offset
    pub fn address(&self) -> u64 {
        self.plan.address()
    }

    /// Granularity-aligned file offset of the mapping
    pub fn base(&self) -> u64 {
        self.plan.base
    }

    /// Distance from the aligned base to the requested address
    pub fn offset(&self) -> u64 {
        self.plan.offset
    }

    /// Bytes actually mapped
    pub fn aligned_len(&self) -> u64 {
        self.plan.mapped_len
    }

    /// File offset one past the mapped bytes
    pub fn end_of_window(&self) -> u64 {
        self.plan.mapped_end()
    }

    /// Pointer to the requested address
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes().as_ptr()
    }
}

/// A writable borrow of the currently mapped window
#[derive(Debug)]
pub struct WindowMut<'a> {
    plan: WindowPlan,
    mapped: &'a mut [u8],
}

impl<'a> WindowMut<'a> {
    pub fn bytes(&self) -> &[u8] {
        let start = self.plan.offset as usize;
        &self.mapped[start..start + self.plan.logical_len as usize]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let start = self.plan.offset as usize;
        &mut self.mapped[start..start + self.plan.logical_len as usize]
    }

    pub fn address(&self) -> u64 {
        self.plan.address()
    }

    /// Consume the window, keeping the logical bytes borrowed from the view
    pub fn into_bytes_mut(self) -> &'a mut [u8] {
        let start = self.plan.offset as usize;
        &mut self.mapped[start..start + self.plan.logical_len as usize]
    }
}

/// One active window into a [`MatrixMapper`](crate::MatrixMapper)'s file
///
/// Not safe for concurrent use; create one view per thread or serialize
/// access. Dropping the view releases its window.
#[derive(Debug)]
pub struct MappedView {
    shared: Arc<MapperShared>,
    requested: u64,
    active: Option<ActiveWindow>,
    next_address: u64,
    last_fault: Option<WindowFault>,
}

impl MappedView {
    pub(crate) fn new(shared: Arc<MapperShared>, requested: u64) -> Self {
        let next_address = shared.layout.header_offset();
        Self {
            shared,
            requested,
            active: None,
            next_address,
            last_fault: None,
        }
    }

    /// Window at the start of the pixel data
    pub fn first_window(&mut self) -> Result<Option<Window<'_>>> {
        self.window_at_address(self.shared.layout.header_offset())
    }

    /// Window starting at the sample `(row, column, band)`
    pub fn window_at(&mut self, row: u32, column: u32, band: u32) -> Result<Option<Window<'_>>> {
        let address = self.shared.layout.address(row, column, band)?;
        self.window_at_address(address)
    }

    /// Window starting at file offset `address`
    ///
    /// Returns `Ok(None)` at or past end of file. A mapping failure is
    /// returned as [`IoError::MapWindowFailed`] and also recorded in
    /// [`last_fault`](Self::last_fault); the view remains usable.
    pub fn window_at_address(&mut self, address: u64) -> Result<Option<Window<'_>>> {
        self.map_at(address)?;
        Ok(self.current_window())
    }

    /// Writable window starting at file offset `address`
    pub fn window_at_address_mut(&mut self, address: u64) -> Result<Option<WindowMut<'_>>> {
        if !self.shared.platform.writable() {
            return Err(IoError::ReadOnly.into());
        }
        self.map_at(address)?;
        self.current_window_mut()
    }

    /// Writable window starting at the sample `(row, column, band)`
    pub fn window_at_mut(
        &mut self,
        row: u32,
        column: u32,
        band: u32,
    ) -> Result<Option<WindowMut<'_>>> {
        let address = self.shared.layout.address(row, column, band)?;
        self.window_at_address_mut(address)
    }

    /// Window immediately following the previous logical window
    ///
    /// Successive calls starting from [`first_window`](Self::first_window)
    /// cover the file without gaps or overlaps.
    pub fn next_window(&mut self) -> Result<Option<Window<'_>>> {
        self.window_at_address(self.next_address)
    }

    fn map_at(&mut self, address: u64) -> Result<()> {
        self.release();

        let requested = self.requested;
        let platform = &self.shared.platform;
        let Some(plan) = plan_window(
            address,
            requested,
            platform.granularity(),
            platform.file_size(),
        )?
        else {
            trace!(address, file_size = platform.file_size(), "window past end of file");
            self.next_address = address.saturating_add(requested);
            return Ok(());
        };

        let mapped = usize::try_from(plan.mapped_len)
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))
            .and_then(|len| platform.map_region(plan.base, len));

        match mapped {
            Ok(region) => {
                trace!(
                    address,
                    base = plan.base,
                    len = plan.mapped_len,
                    backend = platform.name(),
                    "mapped window"
                );
                self.next_address = address.saturating_add(requested);
                self.last_fault = None;
                self.active = Some(ActiveWindow { region, plan });
                Ok(())
            }
            Err(source) => {
                warn!(
                    base = plan.base,
                    len = plan.mapped_len,
                    error = %source,
                    "failed to map window"
                );
                self.last_fault = Some(WindowFault {
                    base: plan.base,
                    len: plan.mapped_len,
                    kind: source.kind(),
                });
                Err(IoError::MapWindowFailed {
                    base: plan.base,
                    len: plan.mapped_len,
                    source,
                }
                .into())
            }
        }
    }

    /// The currently mapped window, if any
    pub fn current_window(&self) -> Option<Window<'_>> {
        self.active.as_ref().map(|active| Window {
            plan: active.plan,
            mapped: active.region.bytes(),
        })
    }

    /// The currently mapped window for writing
    pub fn current_window_mut(&mut self) -> Result<Option<WindowMut<'_>>> {
        let Some(active) = self.active.as_mut() else {
            return Ok(None);
        };
        let plan = active.plan;
        let mapped = active.region.bytes_mut().ok_or(IoError::ReadOnly)?;
        Ok(Some(WindowMut { plan, mapped }))
    }

    /// Change the window size used by subsequent requests
    ///
    /// The current window is not affected.
    pub fn set_window_size(&mut self, bytes: u64) -> Result<()> {
        if bytes == 0 {
            return Err(IoError::InvalidWindowSize.into());
        }
        self.requested = bytes;
        Ok(())
    }

    pub fn requested_window_size(&self) -> u64 {
        self.requested
    }

    /// Bytes mapped for the current window
    pub fn aligned_window_size(&self) -> Option<u64> {
        self.active.as_ref().map(|active| active.plan.mapped_len)
    }

    /// Aligned file offset of the current window
    pub fn current_base_address(&self) -> Option<u64> {
        self.active.as_ref().map(|active| active.plan.base)
    }

    /// Distance from the aligned base to the requested address
    pub fn offset_within_window(&self) -> Option<u64> {
        self.active.as_ref().map(|active| active.plan.offset)
    }

    /// File offset one past the mapped bytes of the current window
    pub fn end_of_current_window(&self) -> Option<u64> {
        self.active.as_ref().map(|active| active.plan.mapped_end())
    }

    /// The most recent mapping failure, cleared by the next successful mapping
    pub fn last_fault(&self) -> Option<WindowFault> {
        self.last_fault
    }

    /// Unmap the current window, writing back any changes
    pub fn release(&mut self) {
        if let Some(mut active) = self.active.take() {
            if let Err(e) = active.region.flush() {
                warn!(
                    base = active.plan.base,
                    len = active.plan.mapped_len,
                    error = %e,
                    "failed to write back window"
                );
            }
        }
    }

    /// Unmap the current window, reporting write-back failures
    pub fn flush_and_release(&mut self) -> Result<()> {
        if let Some(mut active) = self.active.take() {
            active
                .region
                .flush()
                .map_err(|source| IoError::FlushFailed {
                    base: active.plan.base,
                    len: active.plan.mapped_len,
                    source,
                })?;
        }
        Ok(())
    }

    pub fn layout(&self) -> &rastermap_core::RasterLayout {
        &self.shared.layout
    }
}

impl Drop for MappedView {
    fn drop(&mut self) {
        self.release();
        self.shared.view_closed();
    }
}
