//! Interleaved raster cube geometry
//!
//! A raster cube is stored as `rows x columns x bands` samples of a fixed
//! element size, ordered on disk by one of three interleave formats. This
//! module owns the address formulas that translate a logical
//! `(row, column, band)` coordinate into a byte offset within the file.

use crate::error::{LayoutError, Result};

/// On-disk ordering of samples across bands, columns and rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterleaveFormat {
    /// Band interleaved by pixel
    Bip,
    /// Band sequential
    Bsq,
    /// Band interleaved by line
    Bil,
}

impl core::str::FromStr for InterleaveFormat {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("bip") {
            Ok(InterleaveFormat::Bip)
        } else if s.eq_ignore_ascii_case("bsq") {
            Ok(InterleaveFormat::Bsq)
        } else if s.eq_ignore_ascii_case("bil") {
            Ok(InterleaveFormat::Bil)
        } else {
            Err(LayoutError::UnknownInterleave)
        }
    }
}

impl core::fmt::Display for InterleaveFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InterleaveFormat::Bip => write!(f, "BIP"),
            InterleaveFormat::Bsq => write!(f, "BSQ"),
            InterleaveFormat::Bil => write!(f, "BIL"),
        }
    }
}

/// Byte order of multi-byte samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the executing host
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// Whether samples in this order can be used without swapping
    pub const fn is_native(self) -> bool {
        matches!(
            (self, Self::native()),
            (ByteOrder::Little, ByteOrder::Little) | (ByteOrder::Big, ByteOrder::Big)
        )
    }
}

/// Byte distances between neighbouring samples along each interleave axis
///
/// `minor` is the element size, `middle` the stride of the second-fastest
/// axis and `major` the stride of the slowest axis, padding included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strides {
    pub minor: u64,
    pub middle: u64,
    pub major: u64,
}

/// Immutable description of an interleaved raster cube on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RasterLayout {
    interleave: InterleaveFormat,
    element_size: u32,
    rows: u32,
    columns: u32,
    bands: u32,
    inter_line_pad_bytes: u32,
    inter_band_pad_bytes: u32,
    header_offset: u64,
    read_only: bool,
}

#[inline]
fn mul(a: u64, b: u64) -> Result<u64> {
    a.checked_mul(b).ok_or(LayoutError::SizeOverflow)
}

#[inline]
fn add(a: u64, b: u64) -> Result<u64> {
    a.checked_add(b).ok_or(LayoutError::SizeOverflow)
}

impl RasterLayout {
    /// Start describing a cube with the given interleave and extents
    pub const fn builder(
        interleave: InterleaveFormat,
        rows: u32,
        columns: u32,
        bands: u32,
    ) -> RasterLayoutBuilder {
        RasterLayoutBuilder::new(interleave, rows, columns, bands)
    }

    pub fn interleave(&self) -> InterleaveFormat {
        self.interleave
    }
    pub fn element_size(&self) -> u32 {
        self.element_size
    }
    pub fn rows(&self) -> u32 {
        self.rows
    }
    pub fn columns(&self) -> u32 {
        self.columns
    }
    pub fn bands(&self) -> u32 {
        self.bands
    }
    pub fn inter_line_pad_bytes(&self) -> u32 {
        self.inter_line_pad_bytes
    }
    pub fn inter_band_pad_bytes(&self) -> u32 {
        self.inter_band_pad_bytes
    }
    pub fn header_offset(&self) -> u64 {
        self.header_offset
    }
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Reopen the builder from this layout, e.g. to derive a per-band file layout
    pub fn to_builder(&self) -> RasterLayoutBuilder {
        RasterLayoutBuilder { layout: *self }
    }

    /// Check extents and that the whole cube is addressable
    pub fn validate(&self) -> Result<()> {
        if self.element_size == 0 {
            return Err(LayoutError::ZeroElementSize);
        }
        if self.rows == 0 || self.columns == 0 || self.bands == 0 {
            return Err(LayoutError::InvalidDimensions);
        }
        self.total_size_bytes().map(|_| ())
    }

    /// Strides for this layout's interleave
    pub fn strides(&self) -> Result<Strides> {
        let minor = self.element_size as u64;
        let columns = self.columns as u64;
        let line_pad = self.inter_line_pad_bytes as u64;

        let (middle, major) = match self.interleave {
            InterleaveFormat::Bip => {
                let middle = mul(minor, self.bands as u64)?;
                (middle, add(mul(middle, columns)?, line_pad)?)
            }
            InterleaveFormat::Bsq => {
                let middle = add(mul(minor, columns)?, line_pad)?;
                let major = add(
                    mul(middle, self.rows as u64)?,
                    self.inter_band_pad_bytes as u64,
                )?;
                (middle, major)
            }
            InterleaveFormat::Bil => {
                let middle = mul(minor, columns)?;
                (middle, add(mul(middle, self.bands as u64)?, line_pad)?)
            }
        };

        Ok(Strides {
            minor,
            middle,
            major,
        })
    }

    /// Whether the coordinate lies inside the cube
    pub fn contains(&self, row: u32, column: u32, band: u32) -> bool {
        row < self.rows && column < self.columns && band < self.bands
    }

    /// Byte offset of the sample at `(row, column, band)`, header included
    pub fn address(&self, row: u32, column: u32, band: u32) -> Result<u64> {
        if !self.contains(row, column, band) {
            return Err(LayoutError::IndexOutOfBounds);
        }

        let Strides {
            minor,
            middle,
            major,
        } = self.strides()?;
        let (row, column, band) = (row as u64, column as u64, band as u64);

        let offset = match self.interleave {
            InterleaveFormat::Bip => add(add(mul(row, major)?, mul(column, middle)?)?, mul(band, minor)?)?,
            InterleaveFormat::Bsq => add(add(mul(band, major)?, mul(row, middle)?)?, mul(column, minor)?)?,
            InterleaveFormat::Bil => add(add(mul(row, major)?, mul(band, middle)?)?, mul(column, minor)?)?,
        };

        add(offset, self.header_offset)
    }

    /// Bytes between the starts of two consecutive rows of the same band
    pub fn row_stride(&self) -> Result<u64> {
        let strides = self.strides()?;
        Ok(match self.interleave {
            InterleaveFormat::Bip | InterleaveFormat::Bil => strides.major,
            InterleaveFormat::Bsq => strides.middle,
        })
    }

    /// Bytes of pixel data following the header, padding included
    pub fn data_size_bytes(&self) -> Result<u64> {
        let strides = self.strides()?;
        match self.interleave {
            InterleaveFormat::Bip | InterleaveFormat::Bil => mul(strides.major, self.rows as u64),
            InterleaveFormat::Bsq => mul(strides.major, self.bands as u64),
        }
    }

    /// Expected size of a file holding this cube
    pub fn total_size_bytes(&self) -> Result<u64> {
        add(self.data_size_bytes()?, self.header_offset)
    }

    /// Number of bands a single page of this layout carries
    ///
    /// Band sequential pages hold one band; the others hold every band.
    pub fn bands_per_page(&self) -> u32 {
        match self.interleave {
            InterleaveFormat::Bsq => 1,
            InterleaveFormat::Bip | InterleaveFormat::Bil => self.bands,
        }
    }
}

/// Builder for [`RasterLayout`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RasterLayoutBuilder {
    layout: RasterLayout,
}

impl RasterLayoutBuilder {
    /// Create a builder with one-byte elements, no padding and no header
    pub const fn new(interleave: InterleaveFormat, rows: u32, columns: u32, bands: u32) -> Self {
        Self {
            layout: RasterLayout {
                interleave,
                element_size: 1,
                rows,
                columns,
                bands,
                inter_line_pad_bytes: 0,
                inter_band_pad_bytes: 0,
                header_offset: 0,
                read_only: true,
            },
        }
    }

    pub const fn element_size(mut self, bytes: u32) -> Self {
        self.layout.element_size = bytes;
        self
    }

    pub const fn rows(mut self, rows: u32) -> Self {
        self.layout.rows = rows;
        self
    }

    pub const fn columns(mut self, columns: u32) -> Self {
        self.layout.columns = columns;
        self
    }

    pub const fn bands(mut self, bands: u32) -> Self {
        self.layout.bands = bands;
        self
    }

    /// Padding bytes after every line
    pub const fn inter_line_pad(mut self, bytes: u32) -> Self {
        self.layout.inter_line_pad_bytes = bytes;
        self
    }

    /// Padding bytes after every band (band sequential only)
    pub const fn inter_band_pad(mut self, bytes: u32) -> Self {
        self.layout.inter_band_pad_bytes = bytes;
        self
    }

    /// Bytes preceding the pixel data
    pub const fn header_offset(mut self, bytes: u64) -> Self {
        self.layout.header_offset = bytes;
        self
    }

    pub const fn read_only(mut self, read_only: bool) -> Self {
        self.layout.read_only = read_only;
        self
    }

    /// Validate and produce the layout
    pub fn build(self) -> Result<RasterLayout> {
        self.layout.validate()?;
        Ok(self.layout)
    }
}
