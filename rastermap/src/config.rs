//! Configuration for mappers, caches and pagers
//!
//! Every struct here has a usable `Default`, builder-style `with_*` setters,
//! and (with the `serde` feature) can be loaded from JSON.

#[cfg(feature = "serde")]
use crate::error::Result;
use rastermap_core::constants::{DEFAULT_CACHE_BYTES, DEFAULT_CACHE_UNITS};
use rastermap_core::ByteOrder;

/// Which [`PlatformMapping`](crate::platform::PlatformMapping) implementation backs a mapper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MappingBackend {
    /// Operating system memory mapping
    Mmap,
    /// Positioned reads into owned buffers
    Buffered,
}

impl Default for MappingBackend {
    fn default() -> Self {
        if cfg!(feature = "mmap") {
            MappingBackend::Mmap
        } else {
            MappingBackend::Buffered
        }
    }
}

/// Configuration for opening a [`MatrixMapper`](crate::MatrixMapper)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MapperConfig {
    /// Mapping implementation
    pub backend: MappingBackend,
    /// Overrides the platform granularity; must be a power of two
    pub granularity: Option<u64>,
}

impl MapperConfig {
    pub fn with_backend(mut self, backend: MappingBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_granularity(mut self, granularity: u64) -> Self {
        self.granularity = Some(granularity);
        self
    }
}

/// Capacity bounds of a [`BlockCache`](crate::BlockCache)
///
/// Both bounds are soft: units still referenced are never evicted, so the
/// cache may temporarily hold more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CacheConfig {
    /// Maximum number of retained units
    pub max_units: usize,
    /// Maximum bytes of retained unit buffers
    pub max_bytes: Option<usize>,
}

impl CacheConfig {
    /// Config bounded by unit count only
    pub fn with_max_units(max_units: usize) -> Self {
        Self {
            max_units,
            max_bytes: None,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    pub fn without_byte_limit(mut self) -> Self {
        self.max_bytes = None;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_units: DEFAULT_CACHE_UNITS,
            max_bytes: Some(DEFAULT_CACHE_BYTES),
        }
    }
}

/// Configuration for a [`MappedPager`](crate::MappedPager)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PagerConfig {
    /// Mapper settings used for every file the pager opens
    pub mapper: MapperConfig,
    /// On-disk row of the pager's row 0 (sub-cube access)
    pub row_origin: u32,
    /// On-disk column of the pager's column 0 (sub-cube access)
    pub column_origin: u32,
    /// Byte order of the samples on disk
    pub byte_order: ByteOrder,
    /// Open the backing files for writing
    pub writable: bool,
}

impl PagerConfig {
    pub fn with_mapper(mut self, mapper: MapperConfig) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_origin(mut self, row: u32, column: u32) -> Self {
        self.row_origin = row;
        self.column_origin = column;
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    /// Whether pages need their sample bytes swapped
    pub fn swaps_bytes(&self) -> bool {
        !self.byte_order.is_native()
    }
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            mapper: MapperConfig::default(),
            row_origin: 0,
            column_origin: 0,
            byte_order: ByteOrder::native(),
            writable: false,
        }
    }
}

/// Parse any of the configuration structs from JSON
#[cfg(feature = "serde")]
pub fn from_json_str<T: serde::de::DeserializeOwned>(json: &str) -> Result<T> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.max_units, DEFAULT_CACHE_UNITS);
        assert_eq!(config.max_bytes, Some(DEFAULT_CACHE_BYTES));

        let small = CacheConfig::with_max_units(2);
        assert_eq!(small.max_units, 2);
        assert_eq!(small.max_bytes, None);
    }

    #[test]
    fn test_pager_config_swaps_only_foreign_order() {
        assert!(!PagerConfig::default().swaps_bytes());
        let foreign = match ByteOrder::native() {
            ByteOrder::Little => ByteOrder::Big,
            ByteOrder::Big => ByteOrder::Little,
        };
        assert!(PagerConfig::default().with_byte_order(foreign).swaps_bytes());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_configs_from_json() {
        let cache: CacheConfig = from_json_str(r#"{ "max_units": 3 }"#).unwrap();
        assert_eq!(cache.max_units, 3);
        assert_eq!(cache.max_bytes, Some(DEFAULT_CACHE_BYTES));

        let pager: PagerConfig = from_json_str(
            r#"{
                "mapper": { "backend": "buffered", "granularity": 64 },
                "row_origin": 10,
                "byte_order": "Big",
                "writable": false
            }"#,
        )
        .unwrap();
        assert_eq!(pager.mapper.backend, MappingBackend::Buffered);
        assert_eq!(pager.mapper.granularity, Some(64));
        assert_eq!(pager.row_origin, 10);
        assert_eq!(pager.column_origin, 0);
        assert_eq!(pager.byte_order, ByteOrder::Big);

        assert!(from_json_str::<CacheConfig>("{ \"max_units\": \"many\" }").is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_block_ranges_from_json_are_normalised() {
        use rastermap_core::BlockRange;

        let range: BlockRange = from_json_str("[4, 2, 3, 3]").unwrap();
        assert_eq!(range, BlockRange::contiguous(2, 4).unwrap());
        assert!(from_json_str::<BlockRange>("[]").is_err());
    }
}
