use std::time::Duration;

use statig::prelude::*;
use tracing::{debug, info};

use super::choreography::{EntryChoreography, EntryCommand, EntryEvent, EntryPhase};
use super::patterns::{EntryPattern, EntryPatternConfig, DEFAULT_REVEAL_FLOOR};
use crate::breath::{BreathCycleState, BreathThresholds};
use crate::completion::{CompletionCallback, CompletionLatch};
use crate::error::EngineResult;
use crate::telemetry::generate_instance_id;
use crate::timers::TimerSet;

/// Tunables shared by every pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntrySettings {
    pub reveal_floor: Duration,
    pub breath: BreathThresholds,
}

impl Default for EntrySettings {
    fn default() -> Self {
        Self {
            reveal_floor: DEFAULT_REVEAL_FLOOR,
            breath: BreathThresholds::default(),
        }
    }
}

/// Runs one entry choreography ("threshold crossing") for one instance and
/// reports completion exactly once.
pub struct EntryOrchestrator {
    instance_id: String,
    machine: StateMachine<EntryChoreography>,
    timers: TimerSet<EntryEvent>,
    breath: BreathCycleState,
    thresholds: BreathThresholds,
    completion: CompletionLatch,
    now: Duration,
    completed_at: Option<Duration>,
    mounted: bool,
    disposed: bool,
}

impl std::fmt::Debug for EntryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryOrchestrator")
            .field("instance_id", &self.instance_id)
            .field("pattern", &self.pattern())
            .field("phase", &self.phase())
            .field("pending_timers", &self.timers.len())
            .field("breath_cycles", &self.breath.cycle_count)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl EntryOrchestrator {
    /// Orchestrator for a registry pattern with default settings.
    pub fn new(pattern: EntryPattern) -> Self {
        Self::build(pattern, pattern.config(), EntrySettings::default())
    }

    pub fn with_settings(pattern: EntryPattern, settings: EntrySettings) -> EngineResult<Self> {
        settings.breath.validate()?;
        Ok(Self::build(pattern, pattern.config(), settings))
    }

    /// Orchestrator for a pattern whose timing is overridden by `config`.
    pub fn with_config(
        pattern: EntryPattern,
        config: EntryPatternConfig,
        settings: EntrySettings,
    ) -> EngineResult<Self> {
        config.validate(pattern)?;
        settings.breath.validate()?;
        Ok(Self::build(pattern, config, settings))
    }

    fn build(pattern: EntryPattern, config: EntryPatternConfig, settings: EntrySettings) -> Self {
        Self {
            instance_id: generate_instance_id(),
            machine: EntryChoreography::new(pattern, config, settings.reveal_floor).state_machine(),
            timers: TimerSet::new(),
            breath: BreathCycleState::new(),
            thresholds: settings.breath,
            completion: CompletionLatch::new(),
            now: Duration::ZERO,
            completed_at: None,
            mounted: false,
            disposed: false,
        }
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    pub fn with_on_entry_complete(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_entry_complete(Box::new(callback));
        self
    }

    /// Returns false once entry already completed; the callback is dropped.
    pub fn on_entry_complete(&mut self, callback: CompletionCallback) -> bool {
        self.completion.set_callback(callback)
    }

    /// Mount the choreography at time `now`. A cold open completes before this
    /// returns.
    pub fn run(&mut self, now: Duration) {
        if self.mounted || self.disposed {
            return;
        }
        self.mounted = true;
        self.now = now;
        info!(
            instance_id = %self.instance_id,
            pattern = %self.pattern(),
            "Entry choreography started"
        );
        self.dispatch(EntryEvent::Mount);
    }

    /// Feed one breath amplitude sample (one per host re-render).
    pub fn observe_breath(&mut self, amplitude: f32) {
        if !self.mounted || self.disposed || self.is_complete() {
            return;
        }
        let (next, completed) = self.breath.observe(amplitude, self.thresholds);
        self.breath = next;
        if completed {
            debug!(
                instance_id = %self.instance_id,
                cycles = self.breath.cycle_count,
                "Breath cycle observed"
            );
            self.dispatch(EntryEvent::BreathCycle);
        }
    }

    /// Move the clock to `now` and deliver expired timers in due order.
    pub fn tick(&mut self, now: Duration) {
        if self.disposed {
            return;
        }
        let target = self.now.max(now);
        while let Some((_, due, event)) = self.timers.pop_due(target) {
            self.now = self.now.max(due);
            self.dispatch(event);
        }
        self.now = target;
    }

    /// Cancel every pending timer. Returns how many were cancelled.
    pub fn dispose(&mut self) -> usize {
        if self.disposed {
            return 0;
        }
        self.disposed = true;
        self.completion.disarm();
        let cancelled = self.timers.cancel_all();
        info!(
            instance_id = %self.instance_id,
            phase = ?self.phase(),
            cancelled_timers = cancelled,
            "Entry choreography disposed"
        );
        cancelled
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn pattern(&self) -> EntryPattern {
        self.machine.inner().pattern()
    }

    pub fn config(&self) -> EntryPatternConfig {
        *self.machine.inner().config()
    }

    pub fn phase(&self) -> EntryPhase {
        self.machine.inner().phase()
    }

    pub fn is_complete(&self) -> bool {
        self.completion.has_fired()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Clock value at which completion fired.
    pub fn completed_at(&self) -> Option<Duration> {
        self.completed_at
    }

    pub fn breath_cycles(&self) -> u32 {
        self.breath.cycle_count
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        if self.disposed {
            return None;
        }
        self.timers.next_due()
    }

    fn dispatch(&mut self, event: EntryEvent) {
        self.machine.handle(&event);
        let commands = self.machine.inner().take_commands();
        for command in commands {
            match command {
                EntryCommand::Schedule { event, after } => {
                    self.timers.schedule(self.now, after, event);
                }
                EntryCommand::SignalComplete => self.complete(),
            }
        }
    }

    fn complete(&mut self) {
        self.timers.cancel_all();
        if self.completion.fire() {
            self.completed_at = Some(self.now);
            info!(
                instance_id = %self.instance_id,
                pattern = %self.pattern(),
                at_ms = self.now.as_millis() as u64,
                "Entry complete"
            );
        }
    }
}
