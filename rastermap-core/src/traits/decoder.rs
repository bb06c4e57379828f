//! Interface to block-oriented codecs such as JPEG2000
//!
//! The decoding algorithm itself lives outside this workspace. Pagers only
//! need to know the block geometry and how to ask for a run of blocks to be
//! decoded into a caller-provided buffer.

use crate::block::{BlockGeometry, BlockRange};

/// A decoder that turns compressed blocks into band interleaved by pixel samples
pub trait BlockDecoder {
    /// Error type reported by the decoder
    type Error;

    /// Geometry of the decoded raster
    fn geometry(&self) -> BlockGeometry;

    /// Decode `blocks` into `out`
    ///
    /// `out` holds `blocks.count() * geometry().block_size_bytes()` bytes; the
    /// block at position `i` of the range is written at
    /// `i * block_size_bytes`. Rows past the end of the raster are left as is.
    fn decode(&self, blocks: &BlockRange, out: &mut [u8]) -> Result<(), Self::Error>;
}
