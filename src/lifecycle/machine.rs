use std::time::Duration;

use tracing::{debug, info};

use super::policy::{Directive, TransitionPolicy};
use super::stage::Stage;
use crate::completion::{CompletionCallback, CompletionLatch};
use crate::telemetry::generate_instance_id;
use crate::timers::{TimerHandle, TimerSet};

/// Why a transition request was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The machine has not been mounted with `start`
    NotStarted,
    /// The machine was torn down
    Disposed,
    /// The terminal stage was already reached
    AlreadyTerminal,
    /// The requested stage is not the successor of the current one
    NotSuccessor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome<S> {
    Advanced { from: S, to: S },
    /// The transition reached the terminal stage and fired completion
    Completed { from: S, to: S },
    Ignored(IgnoreReason),
}

impl<S> AdvanceOutcome<S> {
    pub fn is_ignored(&self) -> bool {
        matches!(self, AdvanceOutcome::Ignored(_))
    }
}

#[derive(Debug, Clone, Copy)]
enum MachineTimer<S> {
    Advance(S),
    Sample(S),
}

pub type SignalSampler = Box<dyn FnMut(Duration) -> f32 + Send>;

/// Stage lifecycle for one interaction instance.
///
/// Every event source (expired timers, user actions, signal samples) is fed
/// through `&mut self`, one at a time, so the machine needs no locking. Time is
/// measured from mount and only moves forward.
pub struct StageMachine<S: Stage> {
    instance_id: String,
    stage: S,
    history: Vec<S>,
    policies: Vec<Option<Box<dyn TransitionPolicy<S>>>>,
    timers: TimerSet<MachineTimer<S>>,
    sampling: Option<TimerHandle>,
    sampler: Option<SignalSampler>,
    completion: CompletionLatch,
    now: Duration,
    started: bool,
    disposed: bool,
}

impl<S: Stage> std::fmt::Debug for StageMachine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageMachine")
            .field("instance_id", &self.instance_id)
            .field("stage", &self.stage)
            .field("pending_timers", &self.timers.len())
            .field("started", &self.started)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl<S: Stage> StageMachine<S> {
    pub fn new(initial: S) -> Self {
        let mut policies = Vec::with_capacity(S::ORDER.len());
        policies.resize_with(S::ORDER.len(), || None);
        Self {
            instance_id: generate_instance_id(),
            stage: initial,
            history: vec![initial],
            policies,
            timers: TimerSet::new(),
            sampling: None,
            sampler: None,
            completion: CompletionLatch::new(),
            now: Duration::ZERO,
            started: false,
            disposed: false,
        }
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    pub fn with_policy(mut self, stage: S, policy: impl TransitionPolicy<S> + 'static) -> Self {
        self.set_policy(stage, policy);
        self
    }

    pub fn with_sampler(mut self, sampler: impl FnMut(Duration) -> f32 + Send + 'static) -> Self {
        self.sampler = Some(Box::new(sampler));
        self
    }

    pub fn with_on_complete(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete(Box::new(callback));
        self
    }

    /// Attach the transition rule for `stage`. Stages without a rule only move
    /// when the host calls `advance`.
    pub fn set_policy(&mut self, stage: S, policy: impl TransitionPolicy<S> + 'static) {
        if let Some(slot) = self.policies.get_mut(stage.index()) {
            *slot = Some(Box::new(policy));
        }
    }

    /// Register the completion callback. Returns false once completion already
    /// fired; the callback is then dropped without running.
    pub fn on_complete(&mut self, callback: CompletionCallback) -> bool {
        self.completion.set_callback(callback)
    }

    /// Mount: enter the initial stage's policy at time `now`.
    pub fn start(&mut self, now: Duration) {
        if self.started || self.disposed {
            return;
        }
        self.started = true;
        self.now = now;
        info!(
            instance_id = %self.instance_id,
            stage = self.stage.name(),
            "Stage machine started"
        );
        if self.stage.is_terminal() {
            self.complete();
            return;
        }
        self.enter_current();
    }

    /// Request the transition to `to`. Anything other than the lawful successor
    /// of the current stage is dropped, which is how late timers and duplicate
    /// triggers are absorbed.
    pub fn advance(&mut self, to: S) -> AdvanceOutcome<S> {
        let rejection = if self.disposed {
            Some(IgnoreReason::Disposed)
        } else if !self.started {
            Some(IgnoreReason::NotStarted)
        } else if self.stage.is_terminal() {
            Some(IgnoreReason::AlreadyTerminal)
        } else if self.stage.successor() != Some(to) {
            Some(IgnoreReason::NotSuccessor)
        } else {
            None
        };
        if let Some(reason) = rejection {
            debug!(
                instance_id = %self.instance_id,
                current = self.stage.name(),
                requested = to.name(),
                reason = ?reason,
                "Transition ignored"
            );
            return AdvanceOutcome::Ignored(reason);
        }

        let from = self.stage;
        self.stop_sampling();
        self.stage = to;
        self.history.push(to);
        self.drop_stale_advances();
        info!(
            instance_id = %self.instance_id,
            from = from.name(),
            to = to.name(),
            at_ms = self.now.as_millis() as u64,
            "Stage advanced"
        );

        if to.is_terminal() {
            self.complete();
            return AdvanceOutcome::Completed { from, to };
        }
        self.enter_current();
        AdvanceOutcome::Advanced { from, to }
    }

    /// Register a delayed transition. Returns `None` once the machine is torn
    /// down or finished, since nothing could lawfully fire any more.
    pub fn schedule_advance(&mut self, to: S, delay: Duration) -> Option<TimerHandle> {
        if self.disposed || self.completion.has_fired() {
            return None;
        }
        let handle = self
            .timers
            .schedule(self.now, delay, MachineTimer::Advance(to));
        debug!(
            instance_id = %self.instance_id,
            to = to.name(),
            delay_ms = delay.as_millis() as u64,
            "Transition scheduled"
        );
        Some(handle)
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        if self.sampling == Some(handle) {
            self.sampling = None;
        }
        self.timers.cancel(handle)
    }

    /// Move the clock to `now` and run every timer that expired, in due order.
    pub fn tick(&mut self, now: Duration) {
        if self.disposed {
            return;
        }
        let target = self.now.max(now);
        while let Some((handle, due, timer)) = self.timers.pop_due(target) {
            self.now = self.now.max(due);
            match timer {
                MachineTimer::Advance(to) => {
                    self.advance(to);
                }
                MachineTimer::Sample(stage) if stage == self.stage => self.sample(),
                MachineTimer::Sample(_) => {
                    self.timers.cancel(handle);
                }
            }
        }
        self.now = target;
    }

    /// One discrete user action (tap, drag, placement).
    pub fn record_action(&mut self) {
        if !self.is_live() {
            debug!(instance_id = %self.instance_id, "Action ignored");
            return;
        }
        let stage = self.stage;
        let directives = match self.policy_mut(stage) {
            Some(policy) => policy.on_action(stage),
            None => Vec::new(),
        };
        self.apply(directives);
    }

    /// One continuous-signal sample pushed by the host.
    pub fn observe_signal(&mut self, value: f32) {
        if !self.is_live() {
            return;
        }
        let stage = self.stage;
        let directives = match self.policy_mut(stage) {
            Some(policy) => policy.on_signal(stage, value),
            None => Vec::new(),
        };
        self.apply(directives);
    }

    /// Tear down: cancel every pending timer and sampling cadence. Returns the
    /// number of timers cancelled. Nothing fires afterwards.
    pub fn dispose(&mut self) -> usize {
        if self.disposed {
            return 0;
        }
        self.disposed = true;
        self.sampling = None;
        self.sampler = None;
        self.completion.disarm();
        let cancelled = self.timers.cancel_all();
        info!(
            instance_id = %self.instance_id,
            stage = self.stage.name(),
            cancelled_timers = cancelled,
            "Stage machine disposed"
        );
        cancelled
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn stage(&self) -> S {
        self.stage
    }

    /// Every stage visited, in order, starting with the initial one.
    pub fn history(&self) -> &[S] {
        &self.history
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_complete(&self) -> bool {
        self.completion.has_fired()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
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

    /// Actions counted by the current stage's policy, if it counts.
    pub fn action_count(&self) -> Option<u32> {
        self.policies
            .get(self.stage.index())
            .and_then(|slot| slot.as_ref())
            .and_then(|policy| policy.action_count())
    }

    fn is_live(&self) -> bool {
        self.started && !self.disposed && !self.stage.is_terminal()
    }

    fn policy_mut(&mut self, stage: S) -> Option<&mut Box<dyn TransitionPolicy<S>>> {
        self.policies
            .get_mut(stage.index())
            .and_then(|slot| slot.as_mut())
    }

    fn enter_current(&mut self) {
        let stage = self.stage;
        let directives = match self.policy_mut(stage) {
            Some(policy) => policy.on_enter(stage),
            None => Vec::new(),
        };
        self.apply(directives);
    }

    fn apply(&mut self, directives: Vec<Directive<S>>) {
        for directive in directives {
            match directive {
                Directive::AdvanceNow(to) => {
                    self.advance(to);
                }
                Directive::AdvanceAfter { to, delay } => {
                    self.schedule_advance(to, delay);
                }
                Directive::SampleEvery(period) => self.start_sampling(period),
            }
        }
    }

    fn start_sampling(&mut self, period: Duration) {
        if !self.is_live() {
            return;
        }
        if self.sampler.is_none() {
            debug!(
                instance_id = %self.instance_id,
                stage = self.stage.name(),
                "No sampler attached, waiting for host-pushed signals"
            );
            return;
        }
        self.stop_sampling();
        let handle = self
            .timers
            .schedule_repeating(self.now, period, MachineTimer::Sample(self.stage));
        self.sampling = Some(handle);
    }

    /// Advance timers aimed at the current stage or an earlier one can never
    /// be lawful again.
    fn drop_stale_advances(&mut self) {
        let current = self.stage.index();
        let dropped = self.timers.cancel_where(|timer| {
            matches!(timer, MachineTimer::Advance(target) if target.index() <= current)
        });
        if dropped > 0 {
            debug!(
                instance_id = %self.instance_id,
                stage = self.stage.name(),
                dropped,
                "Stale transitions cancelled"
            );
        }
    }

    fn stop_sampling(&mut self) {
        if let Some(handle) = self.sampling.take() {
            self.timers.cancel(handle);
        }
    }

    fn sample(&mut self) {
        let now = self.now;
        let Some(sampler) = self.sampler.as_mut() else {
            return;
        };
        let value = sampler(now);
        self.observe_signal(value);
    }

    fn complete(&mut self) {
        self.stop_sampling();
        let dropped = self.timers.cancel_all();
        if self.completion.fire() {
            info!(
                instance_id = %self.instance_id,
                stage = self.stage.name(),
                dropped_timers = dropped,
                "Interaction complete"
            );
        }
    }
}
