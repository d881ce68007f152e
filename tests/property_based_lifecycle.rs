// Property-Based Testing for the Stage Lifecycle
// Tests lifecycle invariants under arbitrary host behaviour: any interleaving of
// clock jumps, actions, signals, manual advances and teardown.

use navicue_engine::catalog::{self, BrickStage};
use navicue_engine::config::StagesConfig;
use navicue_engine::entry::{EntryOrchestrator, EntryPattern};
use navicue_engine::lifecycle::{Stage, StageMachine};
use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::time::Duration;

mod fixtures;
use fixtures::CompletionCounter;

#[derive(Debug, Clone, Arbitrary)]
enum HostOp {
    Tick(#[proptest(strategy = "0u64..=4000")] u64),
    Action,
    Signal(#[proptest(strategy = "0.0f32..=1.0")] f32),
    Advance(#[proptest(strategy = "0usize..4")] usize),
    Dispose,
}

fn apply(machine: &mut StageMachine<BrickStage>, now: &mut Duration, op: &HostOp) {
    match op {
        HostOp::Tick(delta) => {
            *now += Duration::from_millis(*delta);
            machine.tick(*now);
        }
        HostOp::Action => machine.record_action(),
        HostOp::Signal(value) => machine.observe_signal(*value),
        HostOp::Advance(index) => {
            machine.advance(BrickStage::ORDER[*index]);
        }
        HostOp::Dispose => {
            machine.dispose();
        }
    }
}

fn breath_strategy() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(prop_oneof![0.0f32..=1.0, Just(f32::NAN)], 0..60)
}

proptest! {
    #[test]
    fn stage_history_only_moves_forward(ops in prop::collection::vec(any::<HostOp>(), 0..80)) {
        let mut machine = catalog::brick_wall(&StagesConfig::default()).unwrap();
        let mut now = Duration::ZERO;
        machine.start(now);

        for op in &ops {
            let before = machine.stage();
            apply(&mut machine, &mut now, op);
            prop_assert!(machine.stage().index() >= before.index());
        }

        let history = machine.history();
        prop_assert_eq!(history[0], BrickStage::Arrival);
        for pair in history.windows(2) {
            prop_assert_eq!(pair[0].successor(), Some(pair[1]));
        }
    }

    #[test]
    fn completion_fires_at_most_once(ops in prop::collection::vec(any::<HostOp>(), 0..80)) {
        let counter = CompletionCounter::new();
        let mut machine = catalog::brick_wall(&StagesConfig::default())
            .unwrap()
            .with_on_complete(counter.callback());
        let mut now = Duration::ZERO;
        machine.start(now);

        for op in &ops {
            apply(&mut machine, &mut now, op);
            prop_assert!(counter.count() <= 1);
        }
        prop_assert_eq!(counter.count() == 1, machine.is_complete());
    }

    #[test]
    fn nothing_moves_after_dispose(
        before in prop::collection::vec(any::<HostOp>(), 0..40),
        after in prop::collection::vec(any::<HostOp>(), 0..40),
    ) {
        let counter = CompletionCounter::new();
        let mut machine = catalog::brick_wall(&StagesConfig::default())
            .unwrap()
            .with_on_complete(counter.callback());
        let mut now = Duration::ZERO;
        machine.start(now);
        for op in &before {
            apply(&mut machine, &mut now, op);
        }

        let fired = counter.count();
        machine.dispose();
        let stage = machine.stage();
        prop_assert_eq!(machine.pending_timers(), 0);

        for op in &after {
            apply(&mut machine, &mut now, op);
        }
        prop_assert_eq!(machine.stage(), stage);
        prop_assert_eq!(counter.count(), fired);
        prop_assert_eq!(machine.next_deadline(), None);
    }

    #[test]
    fn breath_gate_completes_at_most_once(samples in breath_strategy()) {
        let counter = CompletionCounter::new();
        let mut entry = EntryOrchestrator::new(EntryPattern::BreathGate)
            .with_on_entry_complete(counter.callback());
        entry.run(Duration::ZERO);

        let mut now = Duration::ZERO;
        for sample in &samples {
            now += Duration::from_millis(250);
            entry.tick(now);
            entry.observe_breath(*sample);
        }
        entry.tick(now + Duration::from_secs(10));

        prop_assert!(counter.count() <= 1);
        prop_assert_eq!(entry.is_complete(), entry.breath_cycles() >= 1);
    }
}
