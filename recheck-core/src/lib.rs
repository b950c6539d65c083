//! Recheck Core - Core library for the recheck review cycle engine
//!
//! This crate provides the machinery for running bounded review cycles over
//! a change: resolving document references, assembling the source-of-truth
//! bundle, validating reviewer reports against the published schema, and
//! driving the cycle to convergence with persisted per-scope state.

pub mod config;
pub mod cycle;
pub mod docs;
pub mod error;
pub mod report;
pub mod reviewer;
pub mod sot;

pub use config::{Config, CycleConfig, ReviewerConfig, DEFAULT_MAX_ROUNDS};
pub use cycle::{
    ArtifactStore, CycleController, CycleOptions, CyclePhase, CycleState, RoundOutcome, ScopeLock,
    TerminalReason,
};
pub use docs::{DocKind, DocumentLoader, FsLoader, ResolvedDoc, ResolvedRefs};
pub use error::{Error, Result, ValidationError, Violation};
pub use report::{Finding, FindingStatus, ReviewReport, SchemaValidator, Severity, SCHEMA_VERSION};
pub use reviewer::{CommandReviewer, Reviewer};
pub use sot::{Assembler, IssueDoc, SotBundle};
