//! Timeout reaper
//!
//! One sweep walks a snapshot of the registry and evicts every barrier older
//! than the configured timeout. Eviction takes the barrier's own lock, so it
//! serializes with admissions on the same key: either the admission lands
//! first and the reaper sees its message, or the reaper finalizes first and
//! the admission turns into a straggler. A message is never both released
//! and discarded.
//!
//! With partial results enabled the completion hook gets one last call on
//! the (already completed) barrier and whatever it returns is dispatched.
//! Otherwise everything collected goes to the discard channel.
//!
//! A barrier whose completion hook panicked is closed on the next sweep
//! whatever its age: the key is recorded, its messages are discarded and the
//! sweep counts it as an error rather than an expiry.

use crate::barrier::collection::MessageCollection;
use crate::barrier::correlation::CorrelationKey;
use crate::barrier::error::BarrierResult;
use crate::barrier::handler::HandlerState;
use crate::barrier::message::Message;
use crate::barrier::store::BarrierHandle;
use crate::barrier::types::ReapReport;
use std::sync::Arc;

/// Messages taken out of an evicted barrier
struct Eviction {
    key: CorrelationKey,
    release: Vec<Message>,
    leftovers: Vec<Message>,
    /// Salvaged after a hook panic rather than expired
    poisoned: bool,
}

impl<C: MessageCollection> HandlerState<C> {
    /// Evict every barrier that has exceeded the timeout
    pub(crate) async fn sweep(&self) -> ReapReport {
        let mut report = ReapReport::default();
        let now = self.clock.now();

        let handles = match self.registry.snapshot() {
            Ok(handles) => handles,
            Err(e) => {
                log::error!("Reaper could not read the barrier registry: {}", e);
                report.errors += 1;
                return report;
            }
        };

        for handle in handles {
            report.examined += 1;
            let expired =
                now.saturating_duration_since(handle.created_at()) >= self.settings.timeout;
            if !expired && !handle.is_poisoned() {
                continue;
            }

            let eviction = match self.evict(&handle, expired) {
                Ok(Some(eviction)) => eviction,
                Ok(None) => continue,
                Err(e) => {
                    log::error!("Reaper failed on barrier {}: {}", handle.key(), e);
                    report.errors += 1;
                    continue;
                }
            };

            if eviction.poisoned {
                report.errors += 1;
            } else {
                report.expired += 1;
                self.counters.add_timed_out(1);
            }

            if !eviction.release.is_empty() {
                let count = eviction.release.len();
                report.released += count;
                self.counters.add_released(count as u64);
                log::debug!(
                    "Barrier {} timed out, sending {} partial result(s)",
                    eviction.key,
                    count
                );
                if let Err(e) = self
                    .router
                    .send_replies(eviction.release, self.default_reply.as_ref())
                    .await
                {
                    log::error!("Partial release for {} failed: {}", eviction.key, e);
                    report.errors += 1;
                }
            }

            if !eviction.leftovers.is_empty() {
                let reason = if eviction.poisoned { "unreleased" } else { "expired" };
                log::debug!(
                    "Barrier {} evicted, discarding {} message(s)",
                    eviction.key,
                    eviction.leftovers.len()
                );
                report.discarded += self.discard_all(eviction.leftovers, reason).await;
            }
        }

        if report.expired > 0 {
            log::debug!(
                "Reaper sweep: {} examined, {} expired",
                report.examined,
                report.expired
            );
        }
        report
    }

    /// Finalize one expired or poisoned barrier under its lock
    ///
    /// Returns `None` when someone else already finalized it.
    fn evict(
        &self,
        handle: &Arc<BarrierHandle<C>>,
        expired: bool,
    ) -> BarrierResult<Option<Eviction>> {
        let (mut barrier, poisoned) = handle.lock_recovering();
        if poisoned {
            let leftovers = self.salvage(handle, &mut barrier)?;
            return Ok(Some(Eviction {
                key: barrier.key().clone(),
                release: Vec::new(),
                leftovers,
                poisoned: true,
            }));
        }
        if barrier.is_complete() || !expired {
            return Ok(None);
        }

        let key = barrier.key().clone();
        barrier.set_complete();

        // Still registered while the hook runs, so a panic here leaves a
        // poisoned barrier the next sweep can salvage
        let release = if self.settings.send_partial_results_on_timeout {
            self.hook.on_mutated(&mut barrier).into_messages()
        } else {
            Vec::new()
        };
        self.retire(handle, &key)?;
        let leftovers = barrier.messages_mut().drain();

        Ok(Some(Eviction {
            key,
            release,
            leftovers,
            poisoned: false,
        }))
    }
}
