//! Status command - show a scope's cycle state and round history

use clap::Args;
use recheck_core::{Config, CycleState};

/// Show the current state of a scope's review cycle
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Scope identifier
    pub scope_id: String,

    /// Emit machine-readable JSON instead of text
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let controller = super::build_controller(config)?;
        let state = controller.current_state(&self.scope_id)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&state)?);
            return Ok(());
        }

        print_state(&state);
        Ok(())
    }
}

fn print_state(state: &CycleState) {
    println!("Scope: {}", state.scope_id);
    println!("Round: {}", state.round);
    println!("Phase: {}", state.phase);
    println!("Open findings: {}", state.open_findings);
    println!("Updated: {}", state.updated_at.to_rfc3339());

    if state.history.is_empty() {
        println!();
        println!("No completed rounds yet.");
        return;
    }

    println!();
    println!("Rounds:");
    for report in &state.history {
        let open = report.open_count();
        let total = report.findings.len();
        println!(
            "  round {} - {} finding(s), {} open",
            report.round, total, open
        );

        for finding in &report.findings {
            let location = finding.location.as_deref().unwrap_or("-");
            println!(
                "      [{}] {} ({}, {}) {}",
                finding.status, finding.id, finding.severity, finding.category, location
            );
        }
    }
}
