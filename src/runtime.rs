//! Async driver
//!
//! Runs one interaction inside a tokio task. Timers become `sleep_until` on the
//! earliest pending deadline, host events arrive over an unbounded channel and
//! every processed event publishes a fresh snapshot on a watch channel. The task
//! owns the interaction outright, so events for one instance are always handled
//! one at a time.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, Instrument};

use crate::interaction::{Interaction, InteractionPhase};
use crate::lifecycle::Stage;
use crate::telemetry::create_instance_span;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent<S> {
    Action,
    Signal(f32),
    Breath(f32),
    Advance(S),
    Teardown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<S> {
    pub phase: InteractionPhase<S>,
    pub elapsed: Duration,
    pub complete: bool,
    pub action_count: Option<u32>,
    pub pending_timers: usize,
    /// Earliest pending deadline across entry and stages. `None` means the
    /// interaction only moves on host input.
    pub next_deadline: Option<Duration>,
}

impl<S: Stage> Snapshot<S> {
    fn of<P>(interaction: &Interaction<S, P>, elapsed: Duration) -> Self {
        Self {
            phase: interaction.phase(),
            elapsed,
            complete: interaction.is_complete(),
            action_count: interaction.stages().action_count(),
            pending_timers: interaction.stages().pending_timers(),
            next_deadline: interaction.next_deadline(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    /// Timers still pending when the instance was torn down
    pub cancelled_timers: usize,
    /// Whether the interaction reached its terminal stage first
    pub completed: bool,
    pub elapsed: Duration,
}

/// Host-side handle to a spawned interaction.
#[derive(Debug)]
pub struct InteractionHandle<S: Stage> {
    instance_id: String,
    events: mpsc::UnboundedSender<HostEvent<S>>,
    snapshots: watch::Receiver<Snapshot<S>>,
    task: JoinHandle<TeardownReport>,
}

impl<S: Stage> InteractionHandle<S> {
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Returns false when the interaction has already finished.
    pub fn action(&self) -> bool {
        self.send(HostEvent::Action)
    }

    pub fn signal(&self, value: f32) -> bool {
        self.send(HostEvent::Signal(value))
    }

    pub fn breath(&self, amplitude: f32) -> bool {
        self.send(HostEvent::Breath(amplitude))
    }

    pub fn advance(&self, to: S) -> bool {
        self.send(HostEvent::Advance(to))
    }

    fn send(&self, event: HostEvent<S>) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn snapshot(&self) -> Snapshot<S> {
        self.snapshots.borrow().clone()
    }

    /// Wait for a snapshot newer than the last one seen by `changed`. Returns
    /// false once the driver task has exited.
    pub async fn changed(&mut self) -> bool {
        self.snapshots.changed().await.is_ok()
    }

    /// Tear the interaction down and wait for the driver to exit.
    pub async fn teardown(self) -> Result<TeardownReport, JoinError> {
        let _ = self.events.send(HostEvent::Teardown);
        self.task.await
    }

    /// Wait for the interaction to finish on its own.
    pub async fn finished(self) -> Result<TeardownReport, JoinError> {
        let InteractionHandle { events, task, .. } = self;
        let report = task.await;
        drop(events);
        report
    }
}

/// Mount `interaction` now and drive it on the current tokio runtime.
pub fn spawn_interaction<S, P>(mut interaction: Interaction<S, P>) -> InteractionHandle<S>
where
    S: Stage,
    P: Send + 'static,
{
    let origin = Instant::now();
    interaction.mount(Duration::ZERO);

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::of(&interaction, Duration::ZERO));
    let instance_id = interaction.instance_id().to_string();
    let span = create_instance_span(interaction.kind(), interaction.instance_id());

    let task = tokio::spawn(drive(interaction, origin, events_rx, snapshot_tx).instrument(span));

    InteractionHandle {
        instance_id,
        events: events_tx,
        snapshots: snapshot_rx,
        task,
    }
}

async fn drive<S, P>(
    mut interaction: Interaction<S, P>,
    origin: Instant,
    mut events: mpsc::UnboundedReceiver<HostEvent<S>>,
    snapshots: watch::Sender<Snapshot<S>>,
) -> TeardownReport
where
    S: Stage,
    P: Send + 'static,
{
    loop {
        if interaction.is_complete() {
            let elapsed = origin.elapsed();
            info!(elapsed_ms = elapsed.as_millis() as u64, "Interaction finished");
            return TeardownReport {
                cancelled_timers: interaction.dispose(),
                completed: true,
                elapsed,
            };
        }

        let deadline = interaction.next_deadline();
        tokio::select! {
            _ = sleep_until_deadline(origin, deadline) => {
                interaction.tick(origin.elapsed());
            }
            event = events.recv() => {
                let event = match event {
                    Some(HostEvent::Teardown) | None => {
                        let elapsed = origin.elapsed();
                        let cancelled_timers = interaction.dispose();
                        snapshots.send_replace(Snapshot::of(&interaction, elapsed));
                        return TeardownReport {
                            cancelled_timers,
                            completed: interaction.is_complete(),
                            elapsed,
                        };
                    }
                    Some(event) => event,
                };
                interaction.tick(origin.elapsed());
                debug!(event = ?event, "Host event");
                match event {
                    HostEvent::Action => interaction.record_action(),
                    HostEvent::Signal(value) => interaction.observe_signal(value),
                    HostEvent::Breath(amplitude) => interaction.observe_breath(amplitude),
                    HostEvent::Advance(to) => {
                        interaction.advance(to);
                    }
                    HostEvent::Teardown => {}
                }
            }
        }

        snapshots.send_replace(Snapshot::of(&interaction, origin.elapsed()));
    }
}

async fn sleep_until_deadline(origin: Instant, deadline: Option<Duration>) {
    match deadline.and_then(|deadline| origin.checked_add(deadline)) {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
