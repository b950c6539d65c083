//! Review cycle orchestration
//!
//! The controller drives bounded rounds of assemble → review → validate
//! until convergence or the round limit. All cross-round state lives in
//! on-disk artifacts guarded by a per-scope advisory lock, so a cycle can
//! be resumed across separate process runs and survives a crash mid-round.

mod controller;
mod lock;
mod state;
mod store;

pub use controller::{CycleController, CycleOptions, RoundOutcome};
pub use lock::ScopeLock;
pub use state::{CyclePhase, CycleState, TerminalReason};
pub use store::ArtifactStore;
