//! Review report data model
//!
//! The `ReviewReport` is the one artifact exchanged with the external
//! reviewer and persisted between rounds. Its shape is a published contract
//! (see `docs/report-schema.md`); the validator in [`schema`] enforces it
//! before any report is trusted.

mod schema;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use schema::{SchemaValidator, SCHEMA_VERSION};

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Must be fixed before the change can land
    Blocker,
    /// Should be fixed; significant defect
    Major,
    /// Worth fixing; limited impact
    Minor,
    /// Style/polish observation
    Nit,
}

impl Severity {
    /// The wire value for this severity
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Blocker => "blocker",
            Severity::Major => "major",
            Severity::Minor => "minor",
            Severity::Nit => "nit",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolution status of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    /// Not yet addressed
    Open,
    /// Fixed in the implementation
    Fixed,
    /// Acknowledged and deliberately not fixed
    Wontfix,
}

impl FindingStatus {
    /// Whether this status counts as resolved for convergence
    pub fn is_resolved(&self) -> bool {
        matches!(self, FindingStatus::Fixed | FindingStatus::Wontfix)
    }

    /// The wire value for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingStatus::Open => "open",
            FindingStatus::Fixed => "fixed",
            FindingStatus::Wontfix => "wontfix",
        }
    }
}

impl std::fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One reported defect or observation
///
/// The `id` is stable across rounds of a scope: the same defect keeps the
/// same id until resolved, and an id is never reused with a different
/// meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Finding {
    /// Stable identifier, unique within a report
    pub id: String,
    /// Severity of the finding
    pub severity: Severity,
    /// Free-form category (e.g. "correctness", "tests")
    pub category: String,
    /// What is wrong
    pub description: String,
    /// Where it is wrong; optional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Resolution status
    pub status: FindingStatus,
}

impl Finding {
    /// The identity pair an id is pinned to across rounds
    pub fn identity(&self) -> (&str, Option<&str>) {
        (self.category.as_str(), self.location.as_deref())
    }
}

/// A validated findings report for one review round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewReport {
    /// Schema version the producer targeted; absent means current
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// The scope this report belongs to
    pub scope_id: String,
    /// Round number, starting at 1
    pub round: u32,
    /// Findings in reviewer order, carried-forward findings appended
    pub findings: Vec<Finding>,
    /// Reviewer's overall summary
    #[serde(default)]
    pub summary: String,
    /// When the report was produced
    #[serde(default = "Utc::now")]
    pub generated_at: DateTime<Utc>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl ReviewReport {
    /// Iterate over findings still open
    pub fn open_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.status == FindingStatus::Open)
    }

    /// Number of findings still open
    pub fn open_count(&self) -> usize {
        self.open_findings().count()
    }

    /// Look up a finding by id
    pub fn find(&self, id: &str) -> Option<&Finding> {
        self.findings.iter().find(|f| f.id == id)
    }
}
