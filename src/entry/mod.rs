// Entry choreography - the first few seconds of an interaction
//
// A registry of named patterns decides when the atmosphere phase gives way to
// the reveal and when entry hands over to the stage lifecycle.

pub mod choreography;
pub mod orchestrator;
pub mod patterns;

pub use choreography::{EntryChoreography, EntryCommand, EntryEvent, EntryPhase};
pub use orchestrator::{EntryOrchestrator, EntrySettings};
pub use patterns::{EntryPattern, EntryPatternConfig, GateKind, DEFAULT_REVEAL_FLOOR};
