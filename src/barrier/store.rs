//! Per-group barrier state
//!
//! A [`Barrier`] is the mutable state of one correlation group. It lives
//! inside a [`BarrierHandle`], whose mutex serialises every admission,
//! completion-hook call and reaper eviction for that group. Groups with
//! different keys never contend on the same lock.

use crate::barrier::collection::MessageCollection;
use crate::barrier::correlation::CorrelationKey;
use crate::barrier::error::{BarrierError, BarrierResult};
use crate::core::sync::handle_mutex_poison;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Mutable state of one correlation group
#[derive(Debug)]
pub struct Barrier<C> {
    key: CorrelationKey,
    created_at: Instant,
    completed: bool,
    messages: C,
}

impl<C: MessageCollection> Barrier<C> {
    pub(crate) fn new(key: CorrelationKey, created_at: Instant) -> Self {
        Self {
            key,
            created_at,
            completed: false,
            messages: C::default(),
        }
    }

    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    /// When the first message for this group arrived
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Mark the group complete
    ///
    /// Completion is terminal. Returns `true` only for the call that made the
    /// transition.
    pub fn set_complete(&mut self) -> bool {
        !std::mem::replace(&mut self.completed, true)
    }

    pub fn messages(&self) -> &C {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut C {
        &mut self.messages
    }
}

/// Registry entry owning one barrier behind its own lock
#[derive(Debug)]
pub struct BarrierHandle<C> {
    instance_id: u64,
    key: CorrelationKey,
    created_at: Instant,
    state: Mutex<Barrier<C>>,
}

impl<C: MessageCollection> BarrierHandle<C> {
    pub(crate) fn new(instance_id: u64, key: CorrelationKey, created_at: Instant) -> Self {
        Self {
            instance_id,
            state: Mutex::new(Barrier::new(key.clone(), created_at)),
            key,
            created_at,
        }
    }

    /// Identifier unique to this barrier instance within its registry
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    /// Creation time, readable without taking the lock
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Acquire the barrier's exclusive lock
    pub fn lock(&self) -> BarrierResult<MutexGuard<'_, Barrier<C>>> {
        handle_mutex_poison(self.state.lock(), BarrierError::sync)
    }

    /// True when a completion hook panicked while holding the lock
    pub fn is_poisoned(&self) -> bool {
        self.state.is_poisoned()
    }

    /// Acquire the lock even after a panic, reporting whether it was poisoned
    ///
    /// The poison flag is cleared, so later callers see an ordinary lock. The
    /// caller owns cleaning up whatever the panicking hook left behind.
    pub(crate) fn lock_recovering(&self) -> (MutexGuard<'_, Barrier<C>>, bool) {
        match self.state.lock() {
            Ok(guard) => (guard, false),
            Err(poisoned) => {
                let guard = poisoned.into_inner();
                self.state.clear_poison();
                (guard, true)
            }
        }
    }
}
