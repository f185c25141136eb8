//! Bounded memory of recently finalized correlation keys
//!
//! Once a group completes or times out its key is recorded here, so that
//! stragglers for the same key are discarded instead of opening a new group.
//! The cache is FIFO with a fixed capacity; a capacity of zero disables it.

use crate::barrier::correlation::CorrelationKey;
use crate::barrier::error::{BarrierError, BarrierResult};
use crate::core::sync::handle_mutex_poison;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

#[derive(Debug)]
struct TrackedKeys {
    order: VecDeque<CorrelationKey>,
    members: HashSet<CorrelationKey>,
}

/// Fixed-capacity FIFO set of finalized keys
#[derive(Debug)]
pub struct CompletedKeyCache {
    capacity: usize,
    tracked: Option<Mutex<TrackedKeys>>,
}

impl CompletedKeyCache {
    pub fn new(capacity: usize) -> Self {
        let tracked = (capacity > 0).then(|| {
            Mutex::new(TrackedKeys {
                order: VecDeque::with_capacity(capacity),
                members: HashSet::with_capacity(capacity),
            })
        });
        Self { capacity, tracked }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.tracked.is_some()
    }

    /// Record a finalized key, evicting the oldest entry when full
    ///
    /// Eviction and insertion happen in one critical section. Returns the
    /// evicted key, if any. Recording a key that is already tracked moves it
    /// to the newest position.
    pub fn record(&self, key: CorrelationKey) -> BarrierResult<Option<CorrelationKey>> {
        let Some(tracked) = &self.tracked else {
            return Ok(None);
        };
        let mut tracked = handle_mutex_poison(tracked.lock(), BarrierError::sync)?;

        if tracked.members.contains(&key) {
            tracked.order.retain(|existing| existing != &key);
            tracked.order.push_back(key);
            return Ok(None);
        }

        let evicted = if tracked.order.len() >= self.capacity {
            let oldest = tracked.order.pop_front();
            if let Some(oldest) = &oldest {
                tracked.members.remove(oldest);
            }
            oldest
        } else {
            None
        };

        tracked.members.insert(key.clone());
        tracked.order.push_back(key);
        Ok(evicted)
    }

    pub fn contains(&self, key: &CorrelationKey) -> BarrierResult<bool> {
        match &self.tracked {
            Some(tracked) => {
                let tracked = handle_mutex_poison(tracked.lock(), BarrierError::sync)?;
                Ok(tracked.members.contains(key))
            }
            None => Ok(false),
        }
    }

    pub fn len(&self) -> usize {
        self.tracked
            .as_ref()
            .and_then(|tracked| tracked.lock().ok().map(|t| t.order.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
