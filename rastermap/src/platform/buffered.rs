//! Window emulation through positioned reads
//!
//! Used where memory mapping is unavailable or undesirable (network
//! filesystems, special files, tests that need a small granularity).

use super::{MappedRegion, PlatformMapping};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

/// Reads windows into owned buffers, writing dirty ones back on flush
#[derive(Debug)]
pub struct BufferedPlatform {
    file: Arc<Mutex<File>>,
    file_size: u64,
    granularity: u64,
    writable: bool,
}

impl BufferedPlatform {
    pub fn new(file: File, file_size: u64, granularity: u64, writable: bool) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
            file_size,
            granularity,
            writable,
        }
    }
}

impl PlatformMapping for BufferedPlatform {
    fn name(&self) -> &'static str {
        "buffered"
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
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::OutOfMemory, e))?;
        data.resize(len, 0);

        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(base))?;
            file.read_exact(&mut data)?;
        }

        Ok(Box::new(BufferedRegion {
            base,
            data,
            dirty: false,
            file: self.writable.then(|| Arc::clone(&self.file)),
        }))
    }
}

/// A window read by [`BufferedPlatform`]
#[derive(Debug)]
pub struct BufferedRegion {
    base: u64,
    data: Vec<u8>,
    dirty: bool,
    file: Option<Arc<Mutex<File>>>,
}

impl MappedRegion for BufferedRegion {
    fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        // Any mutable borrow is assumed to write
        self.file.as_ref()?;
        self.dirty = true;
        Some(self.data.as_mut_slice())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let Some(file) = self.file.as_ref().filter(|_| self.dirty) else {
            return Ok(());
        };

        let mut file = file.lock();
        file.seek(SeekFrom::Start(self.base))?;
        file.write_all(&self.data)?;
        file.flush()?;
        self.dirty = false;
        Ok(())
    }
}
