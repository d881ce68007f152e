// NaviCue Engine Library - staged choreography for guided micro-interactions
// This exposes the lifecycle engine, entry choreography and async driver

pub mod breath;
pub mod catalog;
pub mod completion;
pub mod config;
pub mod entry;
pub mod error;
pub mod interaction;
pub mod lifecycle;
pub mod runtime;
pub mod telemetry;
pub mod timers;

// Re-export key types for easy access
pub use breath::{BreathCycleState, BreathThresholds};
pub use completion::{CompletionCallback, CompletionLatch};
pub use crate::config::EngineConfig;
pub use entry::{EntryOrchestrator, EntryPattern, EntryPatternConfig, EntryPhase, EntrySettings};
pub use error::{EngineError, EngineResult};
pub use interaction::{Interaction, InteractionPhase};
pub use lifecycle::{
    AdvanceOutcome, Compound, CountedAction, Crossing, IgnoreReason, Manual, SignalThreshold,
    Stage, StageMachine, Timed, TransitionPolicy,
};
pub use runtime::{spawn_interaction, InteractionHandle, Snapshot, TeardownReport};
pub use telemetry::{create_instance_span, generate_instance_id, init_telemetry};
pub use timers::{TimerHandle, TimerSet};
