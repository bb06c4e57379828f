//! Matrix mapper: an opened raster file and the views issued over it

use crate::config::MapperConfig;
use crate::error::{IoError, Result};
use crate::platform::{create_platform, PlatformMapping};
use crate::view::MappedView;
use rastermap_core::RasterLayout;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// State shared between a mapper and the views it issued
#[derive(Debug)]
pub(crate) struct MapperShared {
    pub(crate) path: PathBuf,
    pub(crate) layout: RasterLayout,
    pub(crate) platform: Box<dyn PlatformMapping>,
    live_views: AtomicUsize,
}

impl MapperShared {
    pub(crate) fn view_closed(&self) {
        self.live_views.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Owns an open raster file and its layout; factory for [`MappedView`]s
///
/// Views keep the underlying file alive on their own, but the mapper keeps
/// count of them so that [`close`](MatrixMapper::close) can refuse to run
/// while any is still open.
#[derive(Debug)]
pub struct MatrixMapper {
    shared: Option<Arc<MapperShared>>,
}

impl MatrixMapper {
    /// Open `path` with the default configuration
    ///
    /// The file is opened read-only or read-write according to
    /// [`RasterLayout::read_only`].
    pub fn open<P: AsRef<Path>>(path: P, layout: RasterLayout) -> Result<Self> {
        Self::open_with_config(path, layout, &MapperConfig::default())
    }

    /// Open `path` with an explicit mapping configuration
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        layout: RasterLayout,
        config: &MapperConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        layout.validate()?;

        let writable = !layout.read_only();
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .map_err(|source| IoError::CannotOpenFile {
                path: path.to_path_buf(),
                source,
            })?;

        let platform = create_platform(path, file, writable, config)?;

        debug!(
            path = %path.display(),
            backend = platform.name(),
            file_size = platform.file_size(),
            granularity = platform.granularity(),
            interleave = %layout.interleave(),
            writable,
            "opened matrix mapper"
        );
        if let Ok(expected) = layout.total_size_bytes() {
            if expected > platform.file_size() {
                debug!(
                    expected,
                    actual = platform.file_size(),
                    "file is shorter than its layout; trailing windows will be clamped"
                );
            }
        }

        Ok(Self {
            shared: Some(Arc::new(MapperShared {
                path: path.to_path_buf(),
                layout,
                platform,
                live_views: AtomicUsize::new(0),
            })),
        })
    }

    fn shared(&self) -> Result<&Arc<MapperShared>> {
        self.shared.as_ref().ok_or_else(|| IoError::MapperClosed.into())
    }

    /// Create a view with the given requested window size
    ///
    /// Nothing is mapped until the view is asked for a window.
    pub fn create_view(&self, requested_window_bytes: u64) -> Result<MappedView> {
        let shared = self.shared()?;
        if requested_window_bytes == 0 {
            return Err(IoError::InvalidWindowSize.into());
        }
        shared.live_views.fetch_add(1, Ordering::AcqRel);
        Ok(MappedView::new(Arc::clone(shared), requested_window_bytes))
    }

    /// Size of the file in bytes, from filesystem metadata
    pub fn file_size_bytes(&self) -> Result<u64> {
        Ok(self.shared()?.platform.file_size())
    }

    /// Alignment applied to every window base
    pub fn granularity(&self) -> Result<u64> {
        Ok(self.shared()?.platform.granularity())
    }

    pub fn layout(&self) -> Result<&RasterLayout> {
        Ok(&self.shared()?.layout)
    }

    pub fn path(&self) -> Result<&Path> {
        Ok(&self.shared()?.path)
    }

    /// Number of views created by this mapper that are still alive
    pub fn live_views(&self) -> usize {
        self.shared
            .as_ref()
            .map_or(0, |shared| shared.live_views.load(Ordering::Acquire))
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_none()
    }

    /// Release the file
    ///
    /// Fails with [`IoError::ViewsStillOpen`] while views issued by this mapper
    /// exist; the mapper stays usable in that case. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(shared) = self.shared.as_ref() else {
            return Ok(());
        };

        let live = shared.live_views.load(Ordering::Acquire);
        if live > 0 {
            return Err(IoError::ViewsStillOpen { live }.into());
        }

        debug!(path = %shared.path.display(), "closed matrix mapper");
        self.shared = None;
        Ok(())
    }
}
