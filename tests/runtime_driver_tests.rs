//! Async driver tests
//!
//! These tests run the tokio driver with the clock paused, so the runtime
//! auto-advances straight to each pending deadline. Multi-second timelines
//! finish instantly and every timing assertion is exact.

use navicue_engine::catalog::{self, KnockStage, StandardStage};
use navicue_engine::config::StagesConfig;
use navicue_engine::entry::{EntryOrchestrator, EntryPattern, EntryPhase};
use navicue_engine::interaction::{Interaction, InteractionPhase};
use navicue_engine::lifecycle::Timed;
use navicue_engine::runtime::spawn_interaction;
use tokio::time::{sleep, Duration};

mod fixtures;
use fixtures::{ms, CompletionCounter};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timed_progression_runs_to_completion() {
        let counter = CompletionCounter::new();
        let interaction = Interaction::new("standard", catalog::standard(&StagesConfig::default()), ())
            .with_on_complete(counter.callback());
        let handle = spawn_interaction(interaction);
        assert_eq!(
            handle.snapshot().phase,
            InteractionPhase::Stage(StandardStage::Arrival)
        );

        let report = handle.finished().await.expect("driver task");
        assert!(report.completed);
        assert_eq!(report.elapsed, ms(13_000));
        assert_eq!(counter.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshots_follow_the_clock() {
        let interaction =
            Interaction::new("standard", catalog::standard(&StagesConfig::default()), ());
        let handle = spawn_interaction(interaction);

        sleep(ms(2000)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, InteractionPhase::Stage(StandardStage::Presentation));
        assert!(!snapshot.complete);
        assert_eq!(snapshot.pending_timers, 1);

        handle.teardown().await.expect("driver task");
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_prevents_later_completion() {
        let counter = CompletionCounter::new();
        let interaction = Interaction::new("standard", catalog::standard(&StagesConfig::default()), ())
            .with_on_complete(counter.callback());
        let handle = spawn_interaction(interaction);

        sleep(ms(2000)).await;
        let report = handle.teardown().await.expect("driver task");
        assert!(!report.completed);
        assert_eq!(report.cancelled_timers, 1);

        // Sleep well past every deadline the interaction ever had.
        sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_actions_through_the_handle() {
        let interaction = Interaction::new(
            "knock-to-open",
            catalog::knock_to_open().expect("valid catalogue"),
            (),
        );
        let handle = spawn_interaction(interaction);

        // Knocks during arrival are ignored.
        assert!(handle.action());
        sleep(ms(1000)).await;
        assert_eq!(handle.snapshot().phase, InteractionPhase::Stage(KnockStage::Knocking));
        assert_eq!(handle.snapshot().action_count, Some(0));

        assert!(handle.action());
        sleep(ms(10)).await;
        assert_eq!(handle.snapshot().action_count, Some(1));

        assert!(handle.action());
        assert!(handle.action());
        let report = handle.finished().await.expect("driver task");
        assert!(report.completed);
        assert_eq!(report.elapsed, ms(1010));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_hands_over_to_stages() {
        let entry = EntryOrchestrator::new(EntryPattern::FadeText);
        let interaction =
            Interaction::new("standard", catalog::standard(&StagesConfig::default()), ())
                .with_entry(entry);
        let handle = spawn_interaction(interaction);
        assert_eq!(
            handle.snapshot().phase,
            InteractionPhase::Entry(EntryPhase::Atmosphere)
        );

        sleep(ms(2000)).await;
        assert_eq!(handle.snapshot().phase, InteractionPhase::Entry(EntryPhase::Reveal));
        sleep(ms(2000)).await;
        assert_eq!(
            handle.snapshot().phase,
            InteractionPhase::Stage(StandardStage::Arrival)
        );

        let report = handle.finished().await.expect("driver task");
        assert!(report.completed);
        assert_eq!(report.elapsed, ms(3500 + 13_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_breath_gate_through_the_handle() {
        let entry = EntryOrchestrator::new(EntryPattern::BreathGate);
        let interaction = Interaction::new(
            "knock-to-open",
            catalog::knock_to_open().expect("valid catalogue"),
            (),
        )
        .with_entry(entry);
        let handle = spawn_interaction(interaction);

        for amplitude in [0.1, 0.5, 0.4, 0.1] {
            assert!(handle.breath(amplitude));
            sleep(ms(100)).await;
        }
        assert_eq!(
            handle.snapshot().phase,
            InteractionPhase::Entry(EntryPhase::Atmosphere)
        );

        for amplitude in [0.8, 0.2] {
            assert!(handle.breath(amplitude));
            sleep(ms(100)).await;
        }
        assert_eq!(handle.snapshot().phase, InteractionPhase::Entry(EntryPhase::Reveal));

        let report = handle.teardown().await.expect("driver task");
        assert!(!report.completed);
        assert_eq!(report.cancelled_timers, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_reports_closed_driver() {
        let interaction = Interaction::new(
            "knock-to-open",
            catalog::knock_to_open().expect("valid catalogue"),
            (),
        );
        let mut handle = spawn_interaction(interaction);
        sleep(ms(1000)).await;
        for _ in 0..3 {
            handle.action();
        }

        while handle.changed().await {}
        assert!(handle.snapshot().complete);
        assert!(!handle.action());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_deadline_parks_until_teardown() {
        let mut machine = catalog::standard(&StagesConfig::default());
        machine.set_policy(StandardStage::Arrival, Timed::new(Duration::MAX));
        let handle = spawn_interaction(Interaction::new("standard", machine, ()));

        sleep(ms(60_000)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, InteractionPhase::Stage(StandardStage::Arrival));
        assert_eq!(snapshot.next_deadline, Some(Duration::MAX));

        let report = handle.teardown().await.expect("driver task");
        assert!(!report.completed);
        assert_eq!(report.cancelled_timers, 1);
    }
}
