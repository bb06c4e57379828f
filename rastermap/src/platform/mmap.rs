//! Operating system memory mapping through memmap2

use super::{MappedRegion, PlatformMapping};
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::File;

/// Maps windows with the operating system's file mapping primitive
#[derive(Debug)]
pub struct MmapPlatform {
    file: File,
    file_size: u64,
    granularity: u64,
    writable: bool,
}

impl MmapPlatform {
    pub fn new(file: File, file_size: u64, granularity: u64, writable: bool) -> Self {
        Self {
            file,
            file_size,
            granularity,
            writable,
        }
    }
}

impl PlatformMapping for MmapPlatform {
    fn name(&self) -> &'static str {
        "mmap"
    }

    fn granularity(&self) -> u64 {
        self.granularity
    }

    fn file_size(&self) -> u64 {
        self.file_size
    }

    fn writable(&self) -> bool {
        self.writable
    }

    fn map_region(&self, base: u64, len: usize) -> std::io::Result<Box<dyn MappedRegion>> {
        let mut options = MmapOptions::new();
        options.offset(base).len(len);

        // SAFETY: the mapping is owned by the returned region and never outlives
        // it. Concurrent truncation of the file by another process is outside
        // what this crate can guard against, as with any file mapping.
        let region = if self.writable {
            MmapRegion::Writable(unsafe { options.map_mut(&self.file)? })
        } else {
            MmapRegion::ReadOnly(unsafe { options.map(&self.file)? })
        };
        Ok(Box::new(region))
    }
}

/// A window mapped by [`MmapPlatform`]
#[derive(Debug)]
pub enum MmapRegion {
    ReadOnly(Mmap),
    Writable(MmapMut),
}

impl MappedRegion for MmapRegion {
    fn bytes(&self) -> &[u8] {
        match self {
            MmapRegion::ReadOnly(map) => &map[..],
            MmapRegion::Writable(map) => &map[..],
        }
    }

    fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            MmapRegion::ReadOnly(_) => None,
            MmapRegion::Writable(map) => Some(&mut map[..]),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            MmapRegion::ReadOnly(_) => Ok(()),
            MmapRegion::Writable(map) => map.flush(),
        }
    }
}
