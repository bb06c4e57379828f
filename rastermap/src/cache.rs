//! Reference-counted cache of decoded block buffers
//!
//! Units are keyed by the [`BlockRange`] they were decoded from. A unit is
//! handed out as a [`UnitLease`]; while any lease on it exists the unit is
//! never evicted. Released units linger until a later [`BlockCache::acquire`]
//! needs the room.
//!
//! A freshly allocated unit is empty. The caller that sees
//! [`CacheUnit::is_empty`] after acquiring must decode into it with
//! [`CacheUnit::populate`] or [`CacheUnit::populate_with`]; the populated
//! bytes are then readable from any thread without further locking.

use crate::config::CacheConfig;
use crate::error::CacheError;
use hashbrown::HashMap;
use parking_lot::Mutex;
use rastermap_core::BlockRange;
use std::collections::VecDeque;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// A decoded buffer covering a range of compressed blocks
pub struct CacheUnit {
    blocks: BlockRange,
    capacity: usize,
    // Buffer being filled; moved into `ready` once populated
    staging: Mutex<Option<Vec<u8>>>,
    ready: OnceLock<Box<[u8]>>,
    references: AtomicUsize,
}

impl CacheUnit {
    fn allocate(blocks: BlockRange, capacity: usize) -> Result<Self, CacheError> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(capacity)
            .map_err(|_| CacheError::AllocationFailed { bytes: capacity })?;
        buffer.resize(capacity, 0);

        Ok(Self {
            blocks,
            capacity,
            staging: Mutex::new(Some(buffer)),
            ready: OnceLock::new(),
            references: AtomicUsize::new(0),
        })
    }

    /// Block numbers this unit's buffer satisfies
    pub fn blocks(&self) -> &BlockRange {
        &self.blocks
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True until the unit has been populated
    pub fn is_empty(&self) -> bool {
        self.ready.get().is_none()
    }

    /// Number of live leases on this unit
    pub fn reference_count(&self) -> usize {
        self.references.load(Ordering::Acquire)
    }

    /// Populated bytes, or `None` while the unit is empty
    pub fn bytes(&self) -> Option<&[u8]> {
        self.ready.get().map(|bytes| &bytes[..])
    }

    /// Copy decoded bytes into the unit
    ///
    /// Shorter input leaves the remainder zeroed.
    pub fn populate(&self, decoded: &[u8]) -> Result<(), CacheError> {
        self.populate_with(|buffer: &mut [u8]| {
            let capacity = buffer.len();
            let target = buffer
                .get_mut(..decoded.len())
                .ok_or(CacheError::BufferOverflow {
                    capacity,
                    len: decoded.len(),
                })?;
            target.copy_from_slice(decoded);
            Ok(())
        })
    }

    /// Fill the unit in place
    ///
    /// If `fill` fails the unit stays empty and may be filled again.
    pub fn populate_with<E, F>(&self, fill: F) -> Result<(), E>
    where
        E: From<CacheError>,
        F: FnOnce(&mut [u8]) -> Result<(), E>,
    {
        let mut staging = self.staging.lock();
        if !self.is_empty() {
            return Err(CacheError::AlreadyPopulated.into());
        }
        let Some(buffer) = staging.as_mut() else {
            return Err(CacheError::AlreadyPopulated.into());
        };

        fill(buffer.as_mut_slice())?;

        let Some(buffer) = staging.take() else {
            return Err(CacheError::AlreadyPopulated.into());
        };
        self.ready
            .set(buffer.into_boxed_slice())
            .map_err(|_| CacheError::AlreadyPopulated.into())
    }

    fn retain(&self) {
        self.references.fetch_add(1, Ordering::AcqRel);
    }

    fn release(&self) {
        self.references.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for CacheUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheUnit")
            .field("blocks", &self.blocks)
            .field("capacity", &self.capacity)
            .field("references", &self.reference_count())
            .field("empty", &self.is_empty())
            .finish()
    }
}

/// A counted reference to a [`CacheUnit`]
///
/// Cloning takes another reference; dropping gives one back.
#[derive(Debug)]
pub struct UnitLease {
    unit: Arc<CacheUnit>,
}

impl UnitLease {
    fn new(unit: Arc<CacheUnit>) -> Self {
        unit.retain();
        Self { unit }
    }

    /// Whether two leases refer to the same unit
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.unit, &b.unit)
    }

    /// Give the reference back; same as dropping the lease
    pub fn release(self) {}
}

impl Deref for UnitLease {
    type Target = CacheUnit;

    fn deref(&self) -> &CacheUnit {
        &self.unit
    }
}

impl Clone for UnitLease {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.unit))
    }
}

impl Drop for UnitLease {
    fn drop(&mut self) {
        self.unit.release();
    }
}

/// Counters describing cache activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub units: usize,
    pub referenced: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Default)]
struct CacheState {
    // Oldest first
    order: VecDeque<Arc<CacheUnit>>,
    index: HashMap<BlockRange, Arc<CacheUnit>>,
    bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheState {
    fn over_capacity(&self, config: &CacheConfig) -> bool {
        self.order.len() > config.max_units
            || config.max_bytes.is_some_and(|limit| self.bytes > limit)
    }

    fn remove_at(&mut self, position: usize) -> Option<Arc<CacheUnit>> {
        let unit = self.order.remove(position)?;
        self.index.remove(unit.blocks());
        self.bytes -= unit.capacity();
        Some(unit)
    }

    fn trim(&mut self, config: &CacheConfig) {
        while self.over_capacity(config) {
            let candidate = self
                .order
                .iter()
                .position(|unit| unit.reference_count() == 0);
            let Some(position) = candidate else {
                debug!(
                    units = self.order.len(),
                    bytes = self.bytes,
                    max_units = config.max_units,
                    "block cache over capacity; every unit is referenced"
                );
                return;
            };
            if let Some(unit) = self.remove_at(position) {
                self.evictions += 1;
                trace!(
                    first = unit.blocks().first(),
                    last = unit.blocks().last(),
                    bytes = unit.capacity(),
                    "evicted cache unit"
                );
            }
        }
    }
}

/// Bounded, oldest-first collection of [`CacheUnit`]s
///
/// The bounds are soft: when every unit is referenced the cache grows past
/// them instead of failing, and shrinks back on later acquisitions.
pub struct BlockCache {
    config: CacheConfig,
    state: Mutex<CacheState>,
}

impl BlockCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Cache bounded to `max_units` units, with no byte limit
    pub fn with_capacity(max_units: usize) -> Self {
        Self::new(CacheConfig::with_max_units(max_units))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Lease the unit for exactly `blocks`, allocating it if needed
    ///
    /// A new unit holds `blocks.count() * block_size_bytes` bytes and is
    /// empty. Inserting it may evict the oldest unreferenced units.
    pub fn acquire(
        &self,
        blocks: &BlockRange,
        block_size_bytes: usize,
    ) -> Result<UnitLease, CacheError> {
        let mut state = self.state.lock();

        if let Some(unit) = state.index.get(blocks) {
            let lease = UnitLease::new(Arc::clone(unit));
            state.hits += 1;
            trace!(first = blocks.first(), last = blocks.last(), "cache hit");
            state.trim(&self.config);
            return Ok(lease);
        }

        let bytes = blocks
            .count()
            .checked_mul(block_size_bytes)
            .ok_or(CacheError::AllocationFailed { bytes: usize::MAX })?;
        let unit = Arc::new(CacheUnit::allocate(blocks.clone(), bytes)?);
        let lease = UnitLease::new(Arc::clone(&unit));

        state.misses += 1;
        state.bytes += bytes;
        state.index.insert(blocks.clone(), Arc::clone(&unit));
        state.order.push_back(unit);
        trace!(
            first = blocks.first(),
            last = blocks.last(),
            bytes,
            "cache miss; allocated unit"
        );

        state.trim(&self.config);
        Ok(lease)
    }

    /// Lease a populated unit whose blocks include all of `blocks`
    ///
    /// An exact match is preferred; otherwise the newest covering unit.
    pub fn acquire_covering(&self, blocks: &BlockRange) -> Option<UnitLease> {
        let mut state = self.state.lock();

        let found = match state.index.get(blocks) {
            Some(unit) if !unit.is_empty() => Some(Arc::clone(unit)),
            _ => state
                .order
                .iter()
                .rev()
                .find(|unit| !unit.is_empty() && unit.blocks().covers(blocks))
                .cloned(),
        };

        let lease = UnitLease::new(found?);
        state.hits += 1;
        state.trim(&self.config);
        Some(lease)
    }

    /// Forget the unit for exactly `blocks`
    ///
    /// Existing leases keep their buffer alive; the unit just can no longer
    /// be acquired. Returns whether a unit was removed.
    pub fn invalidate(&self, blocks: &BlockRange) -> bool {
        let mut state = self.state.lock();
        let Some(unit) = state.index.get(blocks).cloned() else {
            return false;
        };
        let position = state.order.iter().position(|u| Arc::ptr_eq(u, &unit));
        position.is_some_and(|position| state.remove_at(position).is_some())
    }

    /// Drop every unreferenced unit
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let mut position = 0;
        while position < state.order.len() {
            if state.order[position].reference_count() == 0 {
                state.remove_at(position);
            } else {
                position += 1;
            }
        }
    }

    pub fn contains(&self, blocks: &BlockRange) -> bool {
        self.state.lock().index.contains_key(blocks)
    }

    pub fn len(&self) -> usize {
        self.state.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().order.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            units: state.order.len(),
            referenced: state
                .order
                .iter()
                .filter(|unit| unit.reference_count() > 0)
                .count(),
            bytes: state.bytes,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        }
    }
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
