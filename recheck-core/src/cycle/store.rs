//! On-disk artifact store
//!
//! Layout, per scope, under the artifacts directory:
//!
//! ```text
//! <artifacts_dir>/<scope>/state.json          cycle state summary
//! <artifacts_dir>/<scope>/rounds/round-N.json validated report of round N
//! <artifacts_dir>/<scope>/cycle.lock          advisory lock file
//! ```
//!
//! Writes go through a temp file and rename so a crash never leaves a
//! half-written artifact behind.

use std::path::{Path, PathBuf};

use crate::cycle::CycleState;
use crate::report::ReviewReport;
use crate::{Error, Result};

const STATE_FILE: &str = "state.json";
const ROUNDS_DIR: &str = "rounds";
const LOCK_FILE: &str = "cycle.lock";

/// Scope-keyed store for cycle state and round reports
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at the artifacts directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding one scope's artifacts
    pub fn scope_dir(&self, scope_id: &str) -> PathBuf {
        self.root.join(sanitize_scope(scope_id))
    }

    /// Path of the scope's advisory lock file
    pub fn lock_path(&self, scope_id: &str) -> PathBuf {
        self.scope_dir(scope_id).join(LOCK_FILE)
    }

    /// Load the persisted cycle state, `None` when no cycle was started
    pub fn load_state(&self, scope_id: &str) -> Result<Option<CycleState>> {
        let path = self.scope_dir(scope_id).join(STATE_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        let state: CycleState = serde_json::from_str(&raw)?;
        Ok(Some(state))
    }

    /// Persist the cycle state summary
    pub fn save_state(&self, state: &CycleState) -> Result<()> {
        let dir = self.scope_dir(&state.scope_id);
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&dir.join(STATE_FILE), &json)
    }

    /// Persist one round's validated report
    pub fn save_report(&self, report: &ReviewReport) -> Result<()> {
        let dir = self.scope_dir(&report.scope_id).join(ROUNDS_DIR);
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_vec_pretty(report)?;
        write_atomic(&dir.join(round_file(report.round)), &json)
    }

    /// Load one round's report, `None` when the round never completed
    pub fn load_report(&self, scope_id: &str, round: u32) -> Result<Option<ReviewReport>> {
        if round == 0 {
            return Ok(None);
        }
        let path = self
            .scope_dir(scope_id)
            .join(ROUNDS_DIR)
            .join(round_file(round));
        if !path.is_file() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        let report: ReviewReport = serde_json::from_str(&raw)?;
        Ok(Some(report))
    }

    /// Load every completed round's report, oldest first
    pub fn load_history(&self, scope_id: &str, through_round: u32) -> Result<Vec<ReviewReport>> {
        let mut history = Vec::new();
        for round in 1..=through_round {
            if let Some(report) = self.load_report(scope_id, round)? {
                history.push(report);
            }
        }
        Ok(history)
    }

    /// Discard a scope's state and reports
    ///
    /// The lock file is left alone; the caller holds it.
    pub fn reset_scope(&self, scope_id: &str) -> Result<()> {
        let dir = self.scope_dir(scope_id);

        let state = dir.join(STATE_FILE);
        if state.is_file() {
            std::fs::remove_file(&state)?;
        }

        let rounds = dir.join(ROUNDS_DIR);
        if rounds.is_dir() {
            std::fs::remove_dir_all(&rounds)?;
        }

        Ok(())
    }
}

fn round_file(round: u32) -> String {
    format!("round-{}.json", round)
}

/// Keep scope ids usable as directory names
fn sanitize_scope(scope_id: &str) -> String {
    let cleaned: String = scope_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "scope".to_string()
    } else {
        cleaned
    }
}

/// Write through a sibling temp file and rename into place
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    std::fs::write(&tmp, bytes).map_err(Error::Io)?;
    std::fs::rename(&tmp, path).map_err(Error::Io)?;
    Ok(())
}
