use std::cell::Cell;
use std::time::Duration;

use statig::prelude::*;

use super::patterns::{EntryPattern, EntryPatternConfig, GateKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPhase {
    Atmosphere,
    Reveal,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryEvent {
    Mount,
    TextDelayElapsed,
    RevealElapsed,
    BreathCycle,
}

/// Side effects requested by the choreography; executed by the orchestrator
/// against the instance's own timer set and completion latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryCommand {
    Schedule { event: EntryEvent, after: Duration },
    SignalComplete,
}

pub struct EntryChoreography {
    pattern: EntryPattern,
    config: EntryPatternConfig,
    reveal_floor: Duration,
    phase: EntryPhase,
    commands: Cell<Vec<EntryCommand>>,
}

impl EntryChoreography {
    pub fn new(pattern: EntryPattern, config: EntryPatternConfig, reveal_floor: Duration) -> Self {
        Self {
            pattern,
            config,
            reveal_floor,
            phase: EntryPhase::Atmosphere,
            commands: Cell::new(Vec::new()),
        }
    }

    pub fn pattern(&self) -> EntryPattern {
        self.pattern
    }

    pub fn config(&self) -> &EntryPatternConfig {
        &self.config
    }

    pub fn phase(&self) -> EntryPhase {
        self.phase
    }

    /// Commands emitted since the last call.
    pub fn take_commands(&self) -> Vec<EntryCommand> {
        self.commands.take()
    }

    fn emit(&mut self, command: EntryCommand) {
        self.commands.get_mut().push(command);
    }
}

#[state_machine(initial = "State::atmosphere()")]
impl EntryChoreography {
    #[state]
    fn atmosphere(&mut self, event: &EntryEvent) -> Outcome<State> {
        match (event, self.pattern.gate()) {
            (EntryEvent::Mount, GateKind::Immediate) => self.finish(),
            (EntryEvent::Mount, GateKind::Timed) if self.config.atmosphere_first => {
                self.emit(EntryCommand::Schedule {
                    event: EntryEvent::TextDelayElapsed,
                    after: self.config.text_delay(),
                });
                tracing::debug!(
                    pattern = %self.pattern,
                    text_delay_ms = self.config.text_delay_ms,
                    "Atmosphere holding for text delay"
                );
                Handled
            }
            (EntryEvent::Mount, GateKind::Timed) => self.begin_reveal(),
            (EntryEvent::Mount, GateKind::Breath) => {
                tracing::debug!(pattern = %self.pattern, "Atmosphere holding for a breath cycle");
                Handled
            }
            (EntryEvent::TextDelayElapsed, GateKind::Timed) => self.begin_reveal(),
            (EntryEvent::BreathCycle, GateKind::Breath) => self.begin_reveal(),
            _ => Handled,
        }
    }

    #[state]
    fn reveal(&mut self, event: &EntryEvent) -> Outcome<State> {
        match event {
            EntryEvent::RevealElapsed => self.finish(),
            _ => Handled,
        }
    }

    #[state]
    fn complete(&mut self, event: &EntryEvent) -> Outcome<State> {
        tracing::trace!(pattern = %self.pattern, event = ?event, "Entry already complete");
        Handled
    }
}

impl EntryChoreography {
    fn begin_reveal(&mut self) -> Outcome<State> {
        let after = self.config.reveal_duration(self.reveal_floor);
        self.phase = EntryPhase::Reveal;
        self.emit(EntryCommand::Schedule {
            event: EntryEvent::RevealElapsed,
            after,
        });
        tracing::info!(
            pattern = %self.pattern,
            reveal_ms = after.as_millis() as u64,
            "Entry reveal started"
        );
        Transition(State::reveal())
    }

    fn finish(&mut self) -> Outcome<State> {
        self.phase = EntryPhase::Complete;
        self.emit(EntryCommand::SignalComplete);
        Transition(State::complete())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::patterns::DEFAULT_REVEAL_FLOOR;

    fn choreography(pattern: EntryPattern) -> StateMachine<EntryChoreography> {
        EntryChoreography::new(pattern, pattern.config(), DEFAULT_REVEAL_FLOOR).state_machine()
    }

    #[test]
    fn test_cold_open_completes_on_mount() {
        let mut sm = choreography(EntryPattern::ColdOpen);
        sm.handle(&EntryEvent::Mount);

        assert_eq!(sm.inner().phase(), EntryPhase::Complete);
        assert_eq!(sm.inner().take_commands(), vec![EntryCommand::SignalComplete]);
    }

    #[test]
    fn test_timed_pattern_schedules_text_delay() {
        let mut sm = choreography(EntryPattern::SilenceFirst);
        sm.handle(&EntryEvent::Mount);
        assert_eq!(sm.inner().phase(), EntryPhase::Atmosphere);
        assert_eq!(
            sm.inner().take_commands(),
            vec![EntryCommand::Schedule {
                event: EntryEvent::TextDelayElapsed,
                after: Duration::from_millis(4000),
            }]
        );

        // A breath cycle means nothing to a timed pattern
        sm.handle(&EntryEvent::BreathCycle);
        assert_eq!(sm.inner().phase(), EntryPhase::Atmosphere);

        sm.handle(&EntryEvent::TextDelayElapsed);
        assert_eq!(sm.inner().phase(), EntryPhase::Reveal);
        assert_eq!(
            sm.inner().take_commands(),
            vec![EntryCommand::Schedule {
                event: EntryEvent::RevealElapsed,
                after: Duration::from_millis(2000),
            }]
        );

        sm.handle(&EntryEvent::RevealElapsed);
        assert_eq!(sm.inner().phase(), EntryPhase::Complete);
        assert_eq!(sm.inner().take_commands(), vec![EntryCommand::SignalComplete]);
    }

    #[test]
    fn test_reveal_first_pattern_skips_atmosphere() {
        let mut sm = choreography(EntryPattern::DissolveIn);
        sm.handle(&EntryEvent::Mount);
        assert_eq!(sm.inner().phase(), EntryPhase::Reveal);
        assert_eq!(
            sm.inner().take_commands(),
            vec![EntryCommand::Schedule {
                event: EntryEvent::RevealElapsed,
                after: Duration::from_millis(3000),
            }]
        );
    }

    #[test]
    fn test_breath_gate_waits_for_cycle() {
        let mut sm = choreography(EntryPattern::BreathGate);
        sm.handle(&EntryEvent::Mount);
        sm.handle(&EntryEvent::TextDelayElapsed);
        assert_eq!(sm.inner().phase(), EntryPhase::Atmosphere);
        assert!(sm.inner().take_commands().is_empty());

        sm.handle(&EntryEvent::BreathCycle);
        assert_eq!(sm.inner().phase(), EntryPhase::Reveal);
    }

    #[test]
    fn test_completion_signalled_once() {
        let mut sm = choreography(EntryPattern::ColdOpen);
        sm.handle(&EntryEvent::Mount);
        sm.handle(&EntryEvent::Mount);
        sm.handle(&EntryEvent::RevealElapsed);
        assert_eq!(sm.inner().take_commands(), vec![EntryCommand::SignalComplete]);
    }
}
