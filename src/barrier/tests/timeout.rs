//! Tests for timeout eviction by the reaper

#[cfg(test)]
mod tests {
    use crate::barrier::api::*;
    use crate::barrier::tests::support::{drain_payloads, part, queue, ManualScheduler};
    use crate::core::time::MockTimeProvider;
    use std::time::Duration;

    fn config(timeout_ms: i64, partial: bool) -> BarrierConfig {
        BarrierConfig {
            timeout_ms,
            reaper_interval_ms: 10,
            send_partial_results_on_timeout: partial,
            auto_startup: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_expired_group_is_discarded_once() {
        let clock = MockTimeProvider::new();
        let (output, mut released) = queue("output");
        let (discards, mut discarded) = queue("discards");
        let handler = MessageBarrierHandler::<Vec<Message>>::builder(SequenceSizeCompletion)
            .config(config(100, false))
            .output_channel(output)
            .discard_channel(discards)
            .time_provider(clock.clone())
            .build()
            .unwrap();

        handler.handle(part("A", 1, 3)).await.unwrap();
        handler.handle(part("A", 2, 3)).await.unwrap();

        clock.advance_time(Duration::from_millis(50));
        let report = handler.reap_expired().await;
        assert_eq!(report.examined, 1);
        assert_eq!(report.expired, 0);

        clock.advance_time(Duration::from_millis(60));
        let report = handler.reap_expired().await;
        assert_eq!(report.expired, 1);
        assert_eq!(report.discarded, 2);
        assert_eq!(drain_payloads(&mut discarded), vec!["A-1", "A-2"]);
        assert!(drain_payloads(&mut released).is_empty());

        // Nothing left to evict on the next sweep
        clock.advance_time(Duration::from_millis(200));
        assert_eq!(handler.reap_expired().await, ReapReport::default());

        let stats = handler.stats();
        assert_eq!(stats.live_barriers, 0);
        assert_eq!(stats.tracked_keys, 1);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.discarded, 2);
    }

    #[tokio::test]
    async fn test_late_part_after_timeout_is_a_straggler() {
        let clock = MockTimeProvider::new();
        let (output, mut released) = queue("output");
        let (discards, mut discarded) = queue("discards");
        let handler = MessageBarrierHandler::<Vec<Message>>::builder(SequenceSizeCompletion)
            .config(config(100, false))
            .output_channel(output)
            .discard_channel(discards)
            .time_provider(clock.clone())
            .build()
            .unwrap();

        handler.handle(part("A", 1, 2)).await.unwrap();
        clock.advance_time(Duration::from_millis(100));
        handler.reap_expired().await;
        drain_payloads(&mut discarded);

        assert_eq!(
            handler.handle(part("A", 2, 2)).await.unwrap(),
            HandleOutcome::Discarded
        );
        assert_eq!(drain_payloads(&mut discarded), vec!["A-2"]);
        assert!(drain_payloads(&mut released).is_empty());
        assert_eq!(handler.stats().live_barriers, 0);
    }

    #[tokio::test]
    async fn test_age_equal_to_timeout_expires() {
        let clock = MockTimeProvider::new();
        let handler = MessageBarrierHandler::<Vec<Message>>::builder(SequenceSizeCompletion)
            .config(config(100, false))
            .time_provider(clock.clone())
            .build()
            .unwrap();

        handler.handle(part("A", 1, 2)).await.unwrap();
        clock.advance_time(Duration::from_millis(99));
        assert_eq!(handler.reap_expired().await.expired, 0);
        clock.advance_time(Duration::from_millis(1));
        assert_eq!(handler.reap_expired().await.expired, 1);
    }

    #[tokio::test]
    async fn test_zero_timeout_expires_on_first_sweep() {
        let clock = MockTimeProvider::new();
        let (discards, mut discarded) = queue("discards");
        let handler = MessageBarrierHandler::<Vec<Message>>::builder(SequenceSizeCompletion)
            .config(config(0, false))
            .discard_channel(discards)
            .time_provider(clock)
            .build()
            .unwrap();

        handler.handle(part("A", 1, 2)).await.unwrap();
        assert_eq!(handler.reap_expired().await.expired, 1);
        assert_eq!(drain_payloads(&mut discarded), vec!["A-1"]);
    }

    #[tokio::test]
    async fn test_partial_results_released_on_timeout() {
        let clock = MockTimeProvider::new();
        let (output, mut released) = queue("output");
        let (discards, mut discarded) = queue("discards");
        let handler = MessageBarrierHandler::<Vec<Message>>::builder(SequenceSizeCompletion)
            .config(config(100, true))
            .output_channel(output)
            .discard_channel(discards)
            .time_provider(clock.clone())
            .build()
            .unwrap();

        handler.handle(part("A", 1, 3)).await.unwrap();
        handler.handle(part("A", 2, 3)).await.unwrap();
        clock.advance_time(Duration::from_millis(150));

        let report = handler.reap_expired().await;
        assert_eq!(report.expired, 1);
        assert_eq!(report.released, 2);
        assert_eq!(report.discarded, 0);
        assert_eq!(drain_payloads(&mut released), vec!["A-1", "A-2"]);
        assert!(drain_payloads(&mut discarded).is_empty());
        assert_eq!(handler.stats().released, 2);
    }

    #[tokio::test]
    async fn test_partial_resequenced_group_released_in_order() {
        let clock = MockTimeProvider::new();
        let (output, mut released) = queue("output");
        let handler = MessageBarrierHandler::<SequencedMessages>::builder(ResequencingRelease)
            .config(config(100, true))
            .output_channel(output)
            .time_provider(clock.clone())
            .build()
            .unwrap();

        handler.handle(part("S", 4, 5)).await.unwrap();
        handler.handle(part("S", 2, 5)).await.unwrap();
        clock.advance_time(Duration::from_millis(100));

        handler.reap_expired().await;
        assert_eq!(drain_payloads(&mut released), vec!["S-2", "S-4"]);
    }

    #[tokio::test]
    async fn test_only_old_groups_are_evicted() {
        let clock = MockTimeProvider::new();
        let handler = MessageBarrierHandler::<Vec<Message>>::builder(SequenceSizeCompletion)
            .config(config(100, false))
            .time_provider(clock.clone())
            .build()
            .unwrap();

        handler.handle(part("old", 1, 2)).await.unwrap();
        clock.advance_time(Duration::from_millis(80));
        handler.handle(part("new", 1, 2)).await.unwrap();
        clock.advance_time(Duration::from_millis(30));

        let report = handler.reap_expired().await;
        assert_eq!(report.examined, 2);
        assert_eq!(report.expired, 1);
        assert_eq!(handler.stats().live_barriers, 1);

        // The surviving group can still complete normally
        assert_eq!(
            handler.handle(part("new", 2, 2)).await.unwrap(),
            HandleOutcome::Released { count: 2 }
        );
    }

    #[tokio::test]
    async fn test_scheduled_sweep_uses_same_eviction() {
        let clock = MockTimeProvider::new();
        let scheduler = ManualScheduler::default();
        let (discards, mut discarded) = queue("discards");
        let handler = MessageBarrierHandler::<Vec<Message>>::builder(SequenceSizeCompletion)
            .config(config(100, false))
            .discard_channel(discards)
            .scheduler(scheduler.clone())
            .time_provider(clock.clone())
            .build()
            .unwrap();
        handler.start().unwrap();

        handler.handle(part("A", 1, 2)).await.unwrap();
        scheduler.tick().await;
        assert_eq!(handler.stats().live_barriers, 1);

        clock.advance_time(Duration::from_millis(100));
        scheduler.tick().await;
        assert_eq!(handler.stats().live_barriers, 0);
        assert_eq!(drain_payloads(&mut discarded), vec!["A-1"]);
    }

    #[tokio::test]
    async fn test_poisoned_barrier_does_not_stop_the_sweep() {
        let clock = MockTimeProvider::new();
        let (discards, mut discarded) = queue("discards");
        let panicking = |barrier: &mut Barrier<Vec<Message>>| {
            let poisoned = barrier
                .messages()
                .iter()
                .any(|message| message.payload == "poison");
            if poisoned {
                panic!("hook failure");
            }
            ReleaseDecision::Hold
        };
        let handler = MessageBarrierHandler::<Vec<Message>>::builder(panicking)
            .config(config(100, false))
            .discard_channel(discards)
            .time_provider(clock.clone())
            .build()
            .unwrap();

        handler.handle(part("good", 1, 2)).await.unwrap();
        let task_handler = handler.clone();
        let poisoned = tokio::spawn(async move {
            let message = Message::new("poison").with_header(CORRELATION_ID, "bad");
            task_handler.handle(message).await
        })
        .await;
        assert!(poisoned.is_err());
        assert_eq!(handler.stats().live_barriers, 2);

        clock.advance_time(Duration::from_millis(100));
        let report = handler.reap_expired().await;
        assert_eq!(report.expired, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(report.discarded, 2);

        let mut payloads = drain_payloads(&mut discarded);
        payloads.sort();
        assert_eq!(payloads, vec!["good-1", "poison"]);
        assert_eq!(handler.stats().live_barriers, 0);
        assert_eq!(handler.stats().tracked_keys, 2);
    }

    /// Hook that panics once its group holds `limit` messages
    fn panics_at(limit: usize) -> impl Fn(&mut Barrier<Vec<Message>>) -> ReleaseDecision {
        move |barrier: &mut Barrier<Vec<Message>>| {
            if barrier.messages().len() >= limit {
                panic!("hook failure");
            }
            ReleaseDecision::Hold
        }
    }

    #[tokio::test]
    async fn test_sweep_salvages_messages_of_panicked_hook() {
        let clock = MockTimeProvider::new();
        let (discards, mut discarded) = queue("discards");
        let handler = MessageBarrierHandler::<Vec<Message>>::builder(panics_at(2))
            .config(config(100, false))
            .discard_channel(discards)
            .time_provider(clock.clone())
            .build()
            .unwrap();

        assert_eq!(handler.handle(part("A", 1, 3)).await.unwrap(), HandleOutcome::Held);
        let task_handler = handler.clone();
        let panicked = tokio::spawn(async move { task_handler.handle(part("A", 2, 3)).await }).await;
        assert!(panicked.is_err());

        clock.advance_time(Duration::from_millis(200));
        let report = handler.reap_expired().await;
        assert_eq!(
            report,
            ReapReport {
                examined: 1,
                expired: 0,
                released: 0,
                discarded: 2,
                errors: 1,
            }
        );
        assert_eq!(drain_payloads(&mut discarded), vec!["A-1", "A-2"]);

        let stats = handler.stats();
        assert_eq!(stats.live_barriers, 0);
        assert_eq!(stats.tracked_keys, 1);
        assert_eq!(stats.admitted, 2);
        assert_eq!(stats.discarded, 2);
        assert_eq!(stats.timed_out, 0);

        // The key is closed, so a later part is a straggler
        assert_eq!(
            handler.handle(part("A", 3, 3)).await.unwrap(),
            HandleOutcome::Discarded
        );
        assert_eq!(drain_payloads(&mut discarded), vec!["A-3"]);
        assert_eq!(handler.stats().live_barriers, 0);
    }

    #[tokio::test]
    async fn test_poisoned_barrier_salvaged_before_timeout() {
        let clock = MockTimeProvider::new();
        let (discards, mut discarded) = queue("discards");
        let handler = MessageBarrierHandler::<Vec<Message>>::builder(panics_at(2))
            .config(config(60_000, false))
            .discard_channel(discards)
            .time_provider(clock.clone())
            .build()
            .unwrap();

        handler.handle(part("A", 1, 3)).await.unwrap();
        let task_handler = handler.clone();
        let _ = tokio::spawn(async move { task_handler.handle(part("A", 2, 3)).await }).await;

        let report = handler.reap_expired().await;
        assert_eq!(report.expired, 0);
        assert_eq!(report.errors, 1);
        assert_eq!(drain_payloads(&mut discarded), vec!["A-1", "A-2"]);
        assert_eq!(handler.stats().live_barriers, 0);
    }

    #[tokio::test]
    async fn test_panic_in_partial_release_is_salvaged_next_sweep() {
        let clock = MockTimeProvider::new();
        let (output, mut released) = queue("output");
        let (discards, mut discarded) = queue("discards");
        let hook = |barrier: &mut Barrier<Vec<Message>>| {
            if barrier.is_complete() {
                panic!("partial release failure");
            }
            ReleaseDecision::Hold
        };
        let handler = MessageBarrierHandler::<Vec<Message>>::builder(hook)
            .config(config(100, true))
            .output_channel(output)
            .discard_channel(discards)
            .time_provider(clock.clone())
            .build()
            .unwrap();

        handler.handle(part("A", 1, 2)).await.unwrap();
        clock.advance_time(Duration::from_millis(100));

        let task_handler = handler.clone();
        let first = tokio::spawn(async move { task_handler.reap_expired().await }).await;
        assert!(first.is_err());
        assert_eq!(handler.stats().live_barriers, 1);

        let report = handler.reap_expired().await;
        assert_eq!(report.errors, 1);
        assert_eq!(report.discarded, 1);
        assert!(drain_payloads(&mut released).is_empty());
        assert_eq!(drain_payloads(&mut discarded), vec!["A-1"]);
        assert_eq!(handler.stats().live_barriers, 0);
        assert_eq!(handler.stats().tracked_keys, 1);
    }

    #[tokio::test]
    async fn test_background_reaper_discards_expired_group() {
        let (discards, mut discarded) = queue("discards");
        let handler = MessageBarrierHandler::<Vec<Message>>::builder(SequenceSizeCompletion)
            .config(BarrierConfig {
                timeout_ms: 100,
                reaper_interval_ms: 10,
                ..Default::default()
            })
            .discard_channel(discards)
            .build()
            .unwrap();

        handler.handle(part("A", 1, 2)).await.unwrap();
        assert!(handler.is_running());

        let message = tokio::time::timeout(Duration::from_secs(2), discarded.recv())
            .await
            .expect("reaper should discard the expired group")
            .unwrap();
        assert_eq!(message.payload, "A-1");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(discarded.try_recv().is_err());
        assert_eq!(handler.stats().timed_out, 1);
        assert_eq!(handler.stats().tracked_keys, 1);

        handler.stop().unwrap();
    }
}
