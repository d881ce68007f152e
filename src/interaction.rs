//! Interaction host
//!
//! Composes the optional entry choreography with the stage lifecycle for one
//! mounted interaction. The palette is carried for the host and never read
//! here.

use std::time::Duration;

use crate::completion::CompletionCallback;
use crate::entry::{EntryOrchestrator, EntryPhase};
use crate::lifecycle::{AdvanceOutcome, Stage, StageMachine};
use crate::telemetry::{create_instance_span, generate_instance_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionPhase<S> {
    NotMounted,
    Entry(EntryPhase),
    Stage(S),
    Disposed,
}

pub struct Interaction<S: Stage, P = ()> {
    instance_id: String,
    kind: String,
    palette: P,
    entry: Option<EntryOrchestrator>,
    stages: StageMachine<S>,
    mounted: bool,
}

impl<S: Stage, P> std::fmt::Debug for Interaction<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interaction")
            .field("instance_id", &self.instance_id)
            .field("kind", &self.kind)
            .field("entry", &self.entry)
            .field("stages", &self.stages)
            .finish()
    }
}

impl<S: Stage, P> Interaction<S, P> {
    pub fn new(kind: impl Into<String>, stages: StageMachine<S>, palette: P) -> Self {
        let instance_id = generate_instance_id();
        Self {
            stages: stages.with_instance_id(instance_id.clone()),
            instance_id,
            kind: kind.into(),
            palette,
            entry: None,
            mounted: false,
        }
    }

    /// Wrap the first stage in an entry choreography.
    pub fn with_entry(mut self, entry: EntryOrchestrator) -> Self {
        self.entry = Some(entry.with_instance_id(self.instance_id.clone()));
        self
    }

    /// Callback the host uses to chain to whatever comes next. Fires at most
    /// once, when the terminal stage is reached.
    pub fn with_on_complete(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.stages.on_complete(Box::new(callback));
        self
    }

    pub fn on_complete(&mut self, callback: CompletionCallback) -> bool {
        self.stages.on_complete(callback)
    }

    pub fn mount(&mut self, now: Duration) {
        if self.mounted || self.stages.is_disposed() {
            return;
        }
        self.mounted = true;
        let span = create_instance_span(&self.kind, &self.instance_id);
        let _guard = span.enter();
        if let Some(entry) = self.entry.as_mut() {
            entry.run(now);
        }
        self.hand_over(now);
    }

    pub fn tick(&mut self, now: Duration) {
        if !self.mounted || self.stages.is_disposed() {
            return;
        }
        if let Some(entry) = self.entry.as_mut() {
            if !entry.is_complete() {
                entry.tick(now);
            }
        }
        self.hand_over(now);
        if self.stages.is_started() {
            self.stages.tick(now);
        }
    }

    pub fn record_action(&mut self) {
        self.stages.record_action();
    }

    pub fn observe_signal(&mut self, value: f32) {
        self.stages.observe_signal(value);
    }

    /// Breath samples gate the entry while it runs and feed the stage signal
    /// afterwards.
    pub fn observe_breath(&mut self, amplitude: f32) {
        match self.entry.as_mut() {
            Some(entry) if !entry.is_complete() => {
                entry.observe_breath(amplitude);
                let now = entry.now();
                self.hand_over(now);
            }
            _ => self.stages.observe_signal(amplitude),
        }
    }

    pub fn advance(&mut self, to: S) -> AdvanceOutcome<S> {
        self.stages.advance(to)
    }

    /// Tear down entry and stages. Returns the total number of cancelled timers.
    pub fn dispose(&mut self) -> usize {
        let entry_cancelled = self.entry.as_mut().map_or(0, |entry| entry.dispose());
        entry_cancelled + self.stages.dispose()
    }

    pub fn phase(&self) -> InteractionPhase<S> {
        if self.stages.is_disposed() {
            return InteractionPhase::Disposed;
        }
        if !self.mounted {
            return InteractionPhase::NotMounted;
        }
        match &self.entry {
            Some(entry) if !entry.is_complete() => InteractionPhase::Entry(entry.phase()),
            _ => InteractionPhase::Stage(self.stages.stage()),
        }
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        let entry = self
            .entry
            .as_ref()
            .filter(|entry| !entry.is_complete())
            .and_then(|entry| entry.next_deadline());
        match (entry, self.stages.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stages.is_complete()
    }

    pub fn is_disposed(&self) -> bool {
        self.stages.is_disposed()
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn palette(&self) -> &P {
        &self.palette
    }

    pub fn entry(&self) -> Option<&EntryOrchestrator> {
        self.entry.as_ref()
    }

    pub fn stages(&self) -> &StageMachine<S> {
        &self.stages
    }

    fn hand_over(&mut self, now: Duration) {
        if self.stages.is_started() {
            return;
        }
        let start_at = match &self.entry {
            None => now,
            Some(entry) => match entry.completed_at() {
                Some(at) => at,
                None => return,
            },
        };
        self.stages.start(start_at);
    }
}
