//! Error types for the review cycle engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single schema rule broken by a raw review report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Field path, e.g. `findings[0].severity`
    pub path: String,
    /// The specific rule broken
    pub rule: String,
}

impl Violation {
    /// Create a new violation
    pub fn new(path: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            rule: rule.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.rule)
    }
}

/// Schema validation failure carrying every violated field path and rule
///
/// All violations are collected before the error is returned so a producer
/// can fix them in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    /// All collected violations, in document order
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Create a validation error from collected violations
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "report validation failed:")?;
        for v in &self.violations {
            writeln!(f, "- {}", v)?;
        }
        Ok(())
    }
}

/// Error type for engine operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A reference label appears more than once in a document
    #[error("ambiguous reference: '{label}' appears more than once")]
    AmbiguousReference {
        /// The duplicated label
        label: String,
    },

    /// A reference is present but cannot be resolved or loaded
    #[error("unresolvable {label} reference: {reason}")]
    UnresolvableReference {
        /// The label whose target failed to resolve
        label: String,
        /// Why resolution failed
        reason: String,
    },

    /// SoT assembly failed; wraps the underlying resolution error
    #[error("failed to assemble SoT bundle for scope '{scope}': {source}")]
    Assembly {
        /// The scope being assembled
        scope: String,
        /// The underlying cause
        #[source]
        source: Box<Error>,
    },

    /// A raw report violated the schema contract
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A non-terminal cycle already exists for the scope
    #[error("a review cycle is already active for scope '{scope}' (use force to discard it)")]
    CycleAlreadyActive {
        /// The contested scope
        scope: String,
    },

    /// No cycle has been started for the scope
    #[error("no review cycle started for scope '{scope}'")]
    CycleNotStarted {
        /// The unknown scope
        scope: String,
    },

    /// Another invocation holds the scope lock
    #[error("scope '{scope}' is locked by another invocation")]
    CycleLocked {
        /// The locked scope
        scope: String,
    },

    /// The external reviewer did not respond within the configured timeout
    #[error("reviewer timed out after {}s", timeout.as_secs())]
    ReviewerTimeout {
        /// The expired timeout
        timeout: std::time::Duration,
    },

    /// The external reviewer failed to produce output
    #[error("reviewer error: {0}")]
    Reviewer(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Cycle state machine violation (indicates a controller bug)
    #[error("cycle state error: {0}")]
    State(String),
}
