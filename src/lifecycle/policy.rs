//! Transition policies
//!
//! A policy decides when the stage it is attached to hands over to its
//! successor. Policies never touch the machine directly; they return
//! `Directive`s and the machine applies them, which keeps every policy a small
//! self-contained value that can be tested on its own.

use std::time::Duration;

use super::stage::Stage;
use crate::error::{EngineError, EngineResult};

/// What a policy asks the machine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<S> {
    /// Request the transition immediately
    AdvanceNow(S),
    /// Register a delayed transition on the instance's timer set
    AdvanceAfter { to: S, delay: Duration },
    /// Poll the instance's signal sampler on this cadence while the stage is current
    SampleEvery(Duration),
}

/// Pluggable per-stage transition strategy.
pub trait TransitionPolicy<S: Stage>: Send {
    fn name(&self) -> &'static str;

    /// Called when `stage` becomes current.
    fn on_enter(&mut self, _stage: S) -> Vec<Directive<S>> {
        Vec::new()
    }

    /// Called for each discrete user action while `stage` is current.
    fn on_action(&mut self, _stage: S) -> Vec<Directive<S>> {
        Vec::new()
    }

    /// Called for each continuous-signal sample while `stage` is current.
    fn on_signal(&mut self, _stage: S, _value: f32) -> Vec<Directive<S>> {
        Vec::new()
    }

    /// Actions counted so far, for policies that count.
    fn action_count(&self) -> Option<u32> {
        None
    }
}

/// No automatic transition; the host calls `advance` itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Manual;

impl<S: Stage> TransitionPolicy<S> for Manual {
    fn name(&self) -> &'static str {
        "manual"
    }
}

enum Delay {
    Fixed(Duration),
    Computed(Box<dyn FnMut() -> Duration + Send>),
}

/// Leave the stage after a fixed or computed delay.
pub struct Timed {
    delay: Delay,
}

impl Timed {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: Delay::Fixed(delay),
        }
    }

    pub fn millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// The delay is recomputed each time the stage is entered.
    pub fn computed(compute: impl FnMut() -> Duration + Send + 'static) -> Self {
        Self {
            delay: Delay::Computed(Box::new(compute)),
        }
    }
}

impl<S: Stage> TransitionPolicy<S> for Timed {
    fn name(&self) -> &'static str {
        "timed"
    }

    fn on_enter(&mut self, stage: S) -> Vec<Directive<S>> {
        let Some(to) = stage.successor() else {
            return Vec::new();
        };
        let delay = match &mut self.delay {
            Delay::Fixed(delay) => *delay,
            Delay::Computed(compute) => compute(),
        };
        vec![Directive::AdvanceAfter { to, delay }]
    }
}

/// Leave the stage once the user has performed `target` discrete actions
/// ("tap 3 times", "place 5 bricks").
#[derive(Debug, Clone)]
pub struct CountedAction {
    target: u32,
    count: u32,
    active: bool,
}

impl CountedAction {
    pub fn new(target: u32) -> EngineResult<Self> {
        if target == 0 {
            return Err(EngineError::InvalidTarget);
        }
        Ok(Self {
            target,
            count: 0,
            active: false,
        })
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn is_reached(&self) -> bool {
        self.count >= self.target
    }
}

impl<S: Stage> TransitionPolicy<S> for CountedAction {
    fn name(&self) -> &'static str {
        "counted_action"
    }

    fn on_enter(&mut self, _stage: S) -> Vec<Directive<S>> {
        self.active = true;
        self.count = 0;
        Vec::new()
    }

    fn on_action(&mut self, stage: S) -> Vec<Directive<S>> {
        if !self.active || self.is_reached() {
            return Vec::new();
        }
        self.count += 1;
        if !self.is_reached() {
            return Vec::new();
        }
        stage
            .successor()
            .map(|to| vec![Directive::AdvanceNow(to)])
            .unwrap_or_default()
    }

    fn action_count(&self) -> Option<u32> {
        Some(self.count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// Fires when the value drops to or below the threshold
    Falling,
    /// Fires when the value rises to or above the threshold
    Rising,
}

/// Leave the stage when a derived value ("remaining gain", "temperature",
/// "distance") reaches a threshold.
#[derive(Debug, Clone)]
pub struct SignalThreshold {
    threshold: f32,
    crossing: Crossing,
    cadence: Option<Duration>,
    fired: bool,
}

impl SignalThreshold {
    pub fn new(threshold: f32, crossing: Crossing) -> EngineResult<Self> {
        if !threshold.is_finite() {
            return Err(EngineError::InvalidThreshold { value: threshold });
        }
        Ok(Self {
            threshold,
            crossing,
            cadence: None,
            fired: false,
        })
    }

    pub fn falling(threshold: f32) -> EngineResult<Self> {
        Self::new(threshold, Crossing::Falling)
    }

    pub fn rising(threshold: f32) -> EngineResult<Self> {
        Self::new(threshold, Crossing::Rising)
    }

    /// Poll the machine's sampler every `period` (interval or frame cadence)
    /// instead of waiting for host-pushed samples only.
    pub fn sampled_every(mut self, period: Duration) -> Self {
        self.cadence = Some(period);
        self
    }

    fn crossed(&self, value: f32) -> bool {
        match self.crossing {
            Crossing::Falling => value <= self.threshold,
            Crossing::Rising => value >= self.threshold,
        }
    }
}

impl<S: Stage> TransitionPolicy<S> for SignalThreshold {
    fn name(&self) -> &'static str {
        "signal_threshold"
    }

    fn on_enter(&mut self, _stage: S) -> Vec<Directive<S>> {
        self.fired = false;
        self.cadence
            .map(|period| vec![Directive::SampleEvery(period)])
            .unwrap_or_default()
    }

    fn on_signal(&mut self, stage: S, value: f32) -> Vec<Directive<S>> {
        if self.fired || !value.is_finite() || !self.crossed(value) {
            return Vec::new();
        }
        self.fired = true;
        stage
            .successor()
            .map(|to| vec![Directive::AdvanceNow(to)])
            .unwrap_or_default()
    }
}

/// A trigger policy whose firing schedules a chain of timed transitions,
/// e.g. "fifth brick placed, +1.5s resonant, +5s afterglow".
///
/// Each step's delay is measured from the previous step, so the whole chain is
/// registered on the timer set at the moment the trigger fires.
pub struct Compound<S: Stage> {
    trigger: Box<dyn TransitionPolicy<S>>,
    chain: Vec<(S, Duration)>,
    triggered: bool,
}

impl<S: Stage> Compound<S> {
    pub fn on(trigger: impl TransitionPolicy<S> + 'static) -> Self {
        Self {
            trigger: Box::new(trigger),
            chain: Vec::new(),
            triggered: false,
        }
    }

    pub fn then(mut self, to: S, delay: Duration) -> Self {
        self.chain.push((to, delay));
        self
    }

    fn rewrite(&mut self, directives: Vec<Directive<S>>) -> Vec<Directive<S>> {
        let mut rewritten = Vec::with_capacity(directives.len() + self.chain.len());
        for directive in directives {
            match directive {
                Directive::AdvanceNow(_) if self.triggered => {}
                Directive::AdvanceNow(to) if self.chain.is_empty() => {
                    self.triggered = true;
                    rewritten.push(Directive::AdvanceNow(to));
                }
                Directive::AdvanceNow(_) => {
                    self.triggered = true;
                    let mut elapsed = Duration::ZERO;
                    for (to, delay) in &self.chain {
                        elapsed = elapsed.saturating_add(*delay);
                        rewritten.push(Directive::AdvanceAfter {
                            to: *to,
                            delay: elapsed,
                        });
                    }
                }
                other => rewritten.push(other),
            }
        }
        rewritten
    }
}

impl<S: Stage> TransitionPolicy<S> for Compound<S> {
    fn name(&self) -> &'static str {
        "compound"
    }

    fn on_enter(&mut self, stage: S) -> Vec<Directive<S>> {
        self.triggered = false;
        let directives = self.trigger.on_enter(stage);
        self.rewrite(directives)
    }

    fn on_action(&mut self, stage: S) -> Vec<Directive<S>> {
        let directives = self.trigger.on_action(stage);
        self.rewrite(directives)
    }

    fn on_signal(&mut self, stage: S, value: f32) -> Vec<Directive<S>> {
        let directives = self.trigger.on_signal(stage, value);
        self.rewrite(directives)
    }

    fn action_count(&self) -> Option<u32> {
        self.trigger.action_count()
    }
}
