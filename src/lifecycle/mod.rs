// Stage Lifecycle - per-instance stage sequencing
//
// Each interaction instance owns one StageMachine. Transition rules are attached
// per stage as pluggable policies; the machine enforces ordering, timers and
// the one-shot completion signal.

pub mod machine;
pub mod policy;
pub mod stage;

pub use machine::{AdvanceOutcome, IgnoreReason, SignalSampler, StageMachine};
pub use policy::{
    Compound, CountedAction, Crossing, Directive, Manual, SignalThreshold, Timed,
    TransitionPolicy,
};
pub use stage::{order_is_consistent, Stage};
