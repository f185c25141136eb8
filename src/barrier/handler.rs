//! The message barrier handler
//!
//! Ties the pieces together: the correlation strategy finds a message's
//! group, the registry hands out the group's barrier, the admission policy
//! and completion hook run under that barrier's lock, and whatever the hook
//! releases is dispatched through the reply router once the lock is gone.
//!
//! ```text
//!  handle(msg)
//!      │
//!      ├─ key? ──── no ──▶ Err(MissingCorrelationKey)
//!      │
//!      ├─ key finished recently? ── yes ──▶ discard channel
//!      │
//!      ▼
//!  registry.get_or_create(key)
//!      │
//!      ▼   ┌──────────── barrier lock ────────────┐
//!      │   │ complete? → straggler                │
//!      │   │ can_admit → add → hook.on_mutated    │
//!      │   │ terminal? record key, drop barrier   │
//!      │   └──────────────────────────────────────┘
//!      ▼
//!  router.send_replies(released)   discard(leftovers)
//! ```
//!
//! Lock order is always barrier lock first, then either the registry lock
//! or the completed-key cache lock. The registry and the cache are never
//! held at the same time.

use crate::barrier::channel::ChannelRef;
use crate::barrier::collection::MessageCollection;
use crate::barrier::config::{BarrierConfig, BarrierSettings};
use crate::barrier::correlation::{CorrelationKey, CorrelationStrategy, HeaderCorrelationStrategy};
use crate::barrier::error::{BarrierError, BarrierResult};
use crate::barrier::hook::{AdmissionPolicy, CompletionHook, RejectCompleted};
use crate::barrier::message::Message;
use crate::barrier::registry::BarrierRegistry;
use crate::barrier::router::ReplyRouter;
use crate::barrier::scheduler::{PeriodicCallback, ScheduledTask, TaskScheduler, TokioScheduler};
use crate::barrier::store::{Barrier, BarrierHandle};
use crate::barrier::tracking::CompletedKeyCache;
use crate::barrier::types::{BarrierStats, HandleOutcome, ReapReport, StatCounters};
use crate::core::sync::handle_mutex_poison;
use crate::core::time::{SystemTimeProvider, TimeProvider};
use std::sync::{Arc, Mutex};

/// State shared between callers of `handle` and the reaper task
pub(crate) struct HandlerState<C: MessageCollection> {
    pub(crate) settings: BarrierSettings,
    pub(crate) registry: BarrierRegistry<C>,
    pub(crate) completed_keys: CompletedKeyCache,
    pub(crate) hook: Arc<dyn CompletionHook<C>>,
    pub(crate) admission: Arc<dyn AdmissionPolicy<C>>,
    pub(crate) correlation: Arc<dyn CorrelationStrategy>,
    pub(crate) router: ReplyRouter,
    pub(crate) discard_channel: Option<ChannelRef>,
    pub(crate) default_reply: Option<ChannelRef>,
    pub(crate) clock: Arc<dyn TimeProvider>,
    pub(crate) counters: StatCounters,
}

/// Result of the locked part of admission
enum Admission {
    /// Key already finished; the message is late
    Straggler(Message),
    /// Admission policy or collection refused the message
    Rejected(Message),
    /// A completion hook panicked on this barrier earlier; its contents were
    /// salvaged and the key closed
    Poisoned {
        salvaged: Vec<Message>,
        message: Message,
    },
    /// Message admitted and the hook consulted
    Admitted {
        release: Vec<Message>,
        leftovers: Vec<Message>,
        finalized: bool,
    },
}

impl<C: MessageCollection> HandlerState<C> {
    /// Send a message to the discard channel, or drop it with a warning
    pub(crate) async fn discard(&self, message: Message, reason: &str) {
        self.counters.add_discarded(1);
        let message_id = message.id();

        match &self.discard_channel {
            Some(channel) => {
                if !channel.send(message, self.settings.send_timeout).await {
                    log::warn!(
                        "Failed to send {} message {} to discard channel '{}'",
                        reason,
                        message_id,
                        channel.name()
                    );
                }
            }
            None => log::warn!(
                "Dropping {} message {}: no discard channel configured",
                reason,
                message_id
            ),
        }
    }

    pub(crate) async fn discard_all(&self, messages: Vec<Message>, reason: &str) -> usize {
        let count = messages.len();
        for message in messages {
            self.discard(message, reason).await;
        }
        count
    }

    /// Mark a barrier finished: remember its key, then unregister it
    ///
    /// Caller holds the barrier's lock. Recording first means a message that
    /// finds the barrier gone will also find the key in the cache.
    pub(crate) fn retire(
        &self,
        handle: &Arc<BarrierHandle<C>>,
        key: &CorrelationKey,
    ) -> BarrierResult<()> {
        if let Some(evicted) = self.completed_keys.record(key.clone())? {
            log::trace!("Completed-key cache evicted {}", evicted);
        }
        self.registry.remove_instance(handle)?;
        Ok(())
    }

    /// Close a barrier whose completion hook panicked
    ///
    /// Caller holds the recovered lock. The key is recorded like any other
    /// finalized group and whatever the hook left behind is returned for the
    /// discard channel.
    pub(crate) fn salvage(
        &self,
        handle: &Arc<BarrierHandle<C>>,
        barrier: &mut Barrier<C>,
    ) -> BarrierResult<Vec<Message>> {
        let key = barrier.key().clone();
        barrier.set_complete();
        self.retire(handle, &key)?;
        let salvaged = barrier.messages_mut().drain();
        log::error!(
            "Completion hook panicked on barrier {}, discarding {} message(s)",
            key,
            salvaged.len()
        );
        Ok(salvaged)
    }

    fn admit(&self, key: &CorrelationKey, message: Message) -> BarrierResult<Admission> {
        let (handle, created) = self.registry.get_or_create(key, self.clock.now())?;
        if created {
            log::debug!("Created barrier for key {}", key);
        }

        let (mut barrier, poisoned) = handle.lock_recovering();
        if poisoned {
            let salvaged = self.salvage(&handle, &mut barrier)?;
            return Ok(Admission::Poisoned { salvaged, message });
        }

        // Finalized while this caller waited for the lock
        if barrier.is_complete() {
            return Ok(Admission::Straggler(message));
        }

        if barrier.messages().is_empty() && self.completed_keys.contains(key)?
        {
            // Created after the key was finalized by someone else
            barrier.set_complete();
            self.registry.remove_instance(&handle)?;
            return Ok(Admission::Straggler(message));
        }

        if !self.admission.can_admit(&message, &barrier) {
            return Ok(Admission::Rejected(message));
        }

        if let Err(message) = barrier.messages_mut().add(message) {
            return Ok(Admission::Rejected(message));
        }
        self.counters.add_admitted(1);

        let decision = self.hook.on_mutated(&mut barrier);
        let finalized = decision.is_terminal() || barrier.is_complete();
        let release = decision.into_messages();

        let leftovers = if finalized {
            barrier.set_complete();
            let leftovers = barrier.messages_mut().drain();
            self.retire(&handle, key)?;
            log::debug!(
                "Barrier for key {} complete, releasing {} message(s)",
                key,
                release.len()
            );
            leftovers
        } else {
            Vec::new()
        };

        Ok(Admission::Admitted {
            release,
            leftovers,
            finalized,
        })
    }

    async fn handle(&self, message: Message) -> BarrierResult<HandleOutcome> {
        let key = self.correlation.correlation_key(&message).ok_or_else(|| {
            BarrierError::MissingCorrelationKey {
                message_id: message.id(),
            }
        })?;

        if self.completed_keys.contains(&key)? {
            log::debug!("Discarding late message {} for completed key {}", message.id(), key);
            self.discard(message, "late").await;
            return Ok(HandleOutcome::Discarded);
        }

        match self.admit(&key, message)? {
            Admission::Straggler(message) => {
                log::debug!("Discarding late message {} for completed key {}", message.id(), key);
                self.discard(message, "late").await;
                Ok(HandleOutcome::Discarded)
            }
            Admission::Rejected(message) => {
                log::debug!("Message {} not admitted to barrier {}", message.id(), key);
                self.discard(message, "rejected").await;
                Ok(HandleOutcome::Discarded)
            }
            Admission::Poisoned { salvaged, message } => {
                let message_id = message.id();
                self.discard_all(salvaged, "unreleased").await;
                self.discard(message, "late").await;
                Err(BarrierError::Synchronisation {
                    message: format!(
                        "completion hook for key {} panicked before message {} arrived",
                        key, message_id
                    ),
                })
            }
            Admission::Admitted {
                release,
                leftovers,
                finalized,
            } => {
                self.discard_all(leftovers, "unreleased").await;

                if release.is_empty() {
                    return Ok(if finalized {
                        HandleOutcome::Discarded
                    } else {
                        HandleOutcome::Held
                    });
                }

                let count = release.len();
                self.counters.add_released(count as u64);
                self.router
                    .send_replies(release, self.default_reply.as_ref())
                    .await?;
                Ok(HandleOutcome::Released { count })
            }
        }
    }
}

#[derive(Default)]
struct Lifecycle {
    task: Option<ScheduledTask>,
    /// Set once `start` ran, so auto-startup never undoes an explicit `stop`
    initialized: bool,
}

/// Correlates inbound messages into groups and releases them on completion
///
/// Cloning is cheap; clones share all state and the reaper task.
///
/// ```rust
/// use msgbarrier::barrier::api::*;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> BarrierResult<()> {
/// let (output, mut released) = QueueChannel::bounded("output", 16);
/// let handler = MessageBarrierHandler::<Vec<Message>>::builder(SequenceSizeCompletion)
///     .output_channel(ChannelRef::new(output))
///     .build()?;
///
/// for part in ["a", "b"] {
///     let message = Message::new(part)
///         .with_header(CORRELATION_ID, "order-1")
///         .with_header(SEQUENCE_SIZE, 2i64);
///     handler.handle(message).await?;
/// }
///
/// assert_eq!(released.recv().await.map(|m| m.payload), Some("a".to_string()));
/// assert_eq!(released.recv().await.map(|m| m.payload), Some("b".to_string()));
/// handler.stop()?;
/// # Ok(())
/// # }
/// ```
pub struct MessageBarrierHandler<C: MessageCollection> {
    state: Arc<HandlerState<C>>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    scheduler: Arc<dyn TaskScheduler>,
}

impl<C: MessageCollection> Clone for MessageBarrierHandler<C> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            lifecycle: self.lifecycle.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<C: MessageCollection> MessageBarrierHandler<C> {
    /// Start building a handler around a completion hook
    pub fn builder(hook: impl CompletionHook<C> + 'static) -> MessageBarrierHandlerBuilder<C> {
        MessageBarrierHandlerBuilder::new(Arc::new(hook))
    }

    /// Correlate and admit one message
    ///
    /// Fails when no correlation key resolves, or when a release triggered
    /// by this message could not be fully delivered.
    pub async fn handle(&self, message: Message) -> BarrierResult<HandleOutcome> {
        if self.state.settings.auto_startup {
            self.ensure_started()?;
        }
        self.state.handle(message).await
    }

    /// Begin periodic reaping; calling it again has no effect
    pub fn start(&self) -> BarrierResult<()> {
        let mut lifecycle = handle_mutex_poison(self.lifecycle.lock(), BarrierError::sync)?;
        self.schedule_reaper(&mut lifecycle)
    }

    /// Cancel periodic reaping; calling it again has no effect
    pub fn stop(&self) -> BarrierResult<()> {
        let mut lifecycle = handle_mutex_poison(self.lifecycle.lock(), BarrierError::sync)?;
        if let Some(task) = lifecycle.task.take() {
            task.cancel();
            log::info!("Barrier reaper stopped");
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        match self.lifecycle.lock() {
            Ok(lifecycle) => lifecycle
                .task
                .as_ref()
                .is_some_and(|task| !task.is_cancelled()),
            Err(_) => false,
        }
    }

    /// Run one reaper sweep now
    pub async fn reap_expired(&self) -> ReapReport {
        self.state.sweep().await
    }

    pub fn stats(&self) -> BarrierStats {
        self.state
            .counters
            .snapshot(self.state.registry.len(), self.state.completed_keys.len())
    }

    pub fn settings(&self) -> &BarrierSettings {
        &self.state.settings
    }

    fn ensure_started(&self) -> BarrierResult<()> {
        let mut lifecycle = handle_mutex_poison(self.lifecycle.lock(), BarrierError::sync)?;
        if lifecycle.initialized {
            return Ok(());
        }
        self.schedule_reaper(&mut lifecycle)
    }

    fn schedule_reaper(&self, lifecycle: &mut Lifecycle) -> BarrierResult<()> {
        lifecycle.initialized = true;
        if lifecycle.task.is_some() {
            return Ok(());
        }

        // The task must not keep the handler alive
        let state = Arc::downgrade(&self.state);
        let callback: PeriodicCallback = Arc::new(move || {
            let state = state.clone();
            Box::pin(async move {
                if let Some(state) = state.upgrade() {
                    state.sweep().await;
                }
            })
        });

        let settings = &self.state.settings;
        let task = self
            .scheduler
            .schedule_periodic(callback, settings.reaper_interval)?;
        lifecycle.task = Some(task);

        log::info!(
            "Barrier reaper started (interval {:?}, timeout {:?})",
            settings.reaper_interval,
            settings.timeout
        );
        Ok(())
    }
}

/// Builder for [`MessageBarrierHandler`]
pub struct MessageBarrierHandlerBuilder<C: MessageCollection> {
    config: BarrierConfig,
    hook: Arc<dyn CompletionHook<C>>,
    correlation: Option<Arc<dyn CorrelationStrategy>>,
    admission: Option<Arc<dyn AdmissionPolicy<C>>>,
    discard_channel: Option<ChannelRef>,
    output_channel: Option<ChannelRef>,
    default_reply: Option<ChannelRef>,
    scheduler: Option<Arc<dyn TaskScheduler>>,
    clock: Option<Arc<dyn TimeProvider>>,
}

impl<C: MessageCollection> MessageBarrierHandlerBuilder<C> {
    fn new(hook: Arc<dyn CompletionHook<C>>) -> Self {
        Self {
            config: BarrierConfig::default(),
            hook,
            correlation: None,
            admission: None,
            discard_channel: None,
            output_channel: None,
            default_reply: None,
            scheduler: None,
            clock: None,
        }
    }

    pub fn config(mut self, config: BarrierConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults to reading the `correlation_id` header
    pub fn correlation_strategy(mut self, strategy: impl CorrelationStrategy + 'static) -> Self {
        self.correlation = Some(Arc::new(strategy));
        self
    }

    /// Defaults to [`RejectCompleted`]
    pub fn admission_policy(mut self, policy: impl AdmissionPolicy<C> + 'static) -> Self {
        self.admission = Some(Arc::new(policy));
        self
    }

    pub fn discard_channel(mut self, channel: ChannelRef) -> Self {
        self.discard_channel = Some(channel);
        self
    }

    /// Send every release here, ignoring per-message reply channels
    pub fn output_channel(mut self, channel: ChannelRef) -> Self {
        self.output_channel = Some(channel);
        self
    }

    /// Fallback destination when a message names no reply channel
    pub fn default_reply_channel(mut self, channel: ChannelRef) -> Self {
        self.default_reply = Some(channel);
        self
    }

    pub fn scheduler(mut self, scheduler: impl TaskScheduler + 'static) -> Self {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    pub fn time_provider(mut self, clock: impl TimeProvider + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Validate the configuration and assemble the handler
    pub fn build(self) -> BarrierResult<MessageBarrierHandler<C>> {
        let settings = self.config.validate()?;

        let state = HandlerState {
            settings,
            registry: BarrierRegistry::new(),
            completed_keys: CompletedKeyCache::new(settings.tracked_key_capacity),
            hook: self.hook,
            admission: self
                .admission
                .unwrap_or_else(|| Arc::new(RejectCompleted)),
            correlation: self
                .correlation
                .unwrap_or_else(|| Arc::new(HeaderCorrelationStrategy::default())),
            router: ReplyRouter::new(self.output_channel, settings.send_timeout),
            discard_channel: self.discard_channel,
            default_reply: self.default_reply,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemTimeProvider)),
            counters: StatCounters::default(),
        };

        Ok(MessageBarrierHandler {
            state: Arc::new(state),
            lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
            scheduler: self
                .scheduler
                .unwrap_or_else(|| Arc::new(TokioScheduler::new())),
        })
    }
}
