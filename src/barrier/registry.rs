//! Concurrent barrier registry
//!
//! Maps each live correlation key to exactly one [`BarrierHandle`]. The
//! registry lock guards only the map itself and is never held while a
//! barrier's contents are touched.

use crate::barrier::collection::MessageCollection;
use crate::barrier::correlation::CorrelationKey;
use crate::barrier::error::{BarrierError, BarrierResult};
use crate::barrier::store::BarrierHandle;
use crate::core::sync::{handle_rwlock_read, handle_rwlock_write};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Shared mapping from correlation key to live barrier
#[derive(Debug)]
pub struct BarrierRegistry<C> {
    barriers: RwLock<HashMap<CorrelationKey, Arc<BarrierHandle<C>>>>,
    next_instance_id: AtomicU64,
}

impl<C: MessageCollection> Default for BarrierRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: MessageCollection> BarrierRegistry<C> {
    pub fn new() -> Self {
        Self {
            barriers: RwLock::new(HashMap::new()),
            next_instance_id: AtomicU64::new(1),
        }
    }

    /// Return the live barrier for `key`, creating it if there is none
    ///
    /// The boolean is `true` when this call created the barrier. Concurrent
    /// callers racing on a new key all receive the same instance.
    pub fn get_or_create(
        &self,
        key: &CorrelationKey,
        now: Instant,
    ) -> BarrierResult<(Arc<BarrierHandle<C>>, bool)> {
        {
            let barriers = handle_rwlock_read(self.barriers.read(), BarrierError::sync)?;
            if let Some(existing) = barriers.get(key) {
                return Ok((Arc::clone(existing), false));
            }
        }

        let mut barriers = handle_rwlock_write(self.barriers.write(), BarrierError::sync)?;
        // Another caller may have inserted between the two lock acquisitions
        if let Some(existing) = barriers.get(key) {
            return Ok((Arc::clone(existing), false));
        }
        let instance_id = self.next_instance_id.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(BarrierHandle::new(instance_id, key.clone(), now));
        barriers.insert(key.clone(), Arc::clone(&handle));
        Ok((handle, true))
    }

    pub fn get(&self, key: &CorrelationKey) -> BarrierResult<Option<Arc<BarrierHandle<C>>>> {
        let barriers = handle_rwlock_read(self.barriers.read(), BarrierError::sync)?;
        Ok(barriers.get(key).cloned())
    }

    /// Remove whatever barrier is registered for `key`
    pub fn remove(&self, key: &CorrelationKey) -> BarrierResult<Option<Arc<BarrierHandle<C>>>> {
        let mut barriers = handle_rwlock_write(self.barriers.write(), BarrierError::sync)?;
        Ok(barriers.remove(key))
    }

    /// Remove `handle` only if it is still the registered instance for its key
    ///
    /// Returns `true` when this call performed the removal, which makes the
    /// caller the sole owner responsible for releasing or discarding it.
    pub fn remove_instance(&self, handle: &Arc<BarrierHandle<C>>) -> BarrierResult<bool> {
        let mut barriers = handle_rwlock_write(self.barriers.write(), BarrierError::sync)?;
        match barriers.get(handle.key()) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                barriers.remove(handle.key());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn contains(&self, key: &CorrelationKey) -> BarrierResult<bool> {
        let barriers = handle_rwlock_read(self.barriers.read(), BarrierError::sync)?;
        Ok(barriers.contains_key(key))
    }

    /// Point-in-time copy of every live barrier, for sweeping
    pub fn snapshot(&self) -> BarrierResult<Vec<Arc<BarrierHandle<C>>>> {
        let barriers = handle_rwlock_read(self.barriers.read(), BarrierError::sync)?;
        Ok(barriers.values().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.barriers
            .read()
            .map(|barriers| barriers.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
