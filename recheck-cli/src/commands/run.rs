//! Run command - execute one review round for a scope

use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use recheck_core::{Config, IssueDoc, RoundOutcome};

use super::exit_codes;

/// Run one review round for a scope
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scope identifier of an already-started cycle
    pub scope_id: String,

    /// File holding the diff under review; stdin when omitted
    #[arg(long)]
    pub diff_file: Option<PathBuf>,

    /// Primary document for the scope: an issue JSON export or a raw
    /// markdown body with PRD/Epic reference lines
    #[arg(long, env = "RECHECK_ISSUE_FILE")]
    pub issue_file: Option<PathBuf>,
}

impl RunArgs {
    /// Execute one round; the returned code is the process exit code
    pub async fn execute(&self, config: &Config) -> anyhow::Result<i32> {
        let diff = self.read_diff()?;
        let primary = self.read_issue()?;

        let controller = super::build_controller(config)?;
        let outcome = controller
            .run_round(&self.scope_id, primary, &diff)
            .await?;

        let code = match outcome {
            RoundOutcome::Converged => {
                println!("Cycle converged: no open findings remain.");
                exit_codes::CONVERGED
            }
            RoundOutcome::FindingsOpen { round, open } => {
                println!(
                    "Round {} complete: {} finding(s) still open.",
                    round, open
                );
                println!("Apply fixes and run another round.");
                exit_codes::FINDINGS_OPEN
            }
            RoundOutcome::RoundLimitReached { open } => {
                println!(
                    "Round limit reached with {} finding(s) still open; escalate for manual review.",
                    open
                );
                exit_codes::ROUND_LIMIT_REACHED
            }
        };

        Ok(code)
    }

    fn read_diff(&self) -> anyhow::Result<String> {
        match &self.diff_file {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("failed to read diff file {}: {}", path.display(), e)),
            None => {
                let mut diff = String::new();
                std::io::stdin().read_to_string(&mut diff)?;
                Ok(diff)
            }
        }
    }

    fn read_issue(&self) -> anyhow::Result<Option<IssueDoc>> {
        let Some(path) = &self.issue_file else {
            return Ok(None);
        };

        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read issue file {}: {}", path.display(), e))?;

        // A JSON export carries number/title/url alongside the body; content
        // that looks like JSON must parse as one, never degrade to a raw body
        let issue = if raw.trim_start().starts_with('{') {
            IssueDoc::from_json_export(&raw).map_err(|e| {
                anyhow::anyhow!("invalid issue JSON export {}: {}", path.display(), e)
            })?
        } else {
            IssueDoc::from_body(raw)
        };

        Ok(Some(issue))
    }
}
