//! Start command - begin a fresh review cycle for a scope

use clap::Args;
use recheck_core::{ArtifactStore, Config};

/// Start a review cycle for a scope
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Scope identifier (e.g. a ticket id or branch name)
    pub scope_id: String,

    /// Discard an active cycle for this scope and start over
    #[arg(long)]
    pub force: bool,
}

impl StartArgs {
    /// Execute the start command
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let controller = super::build_controller(config)?;
        let state = controller.start_cycle(&self.scope_id, self.force)?;

        println!(
            "Started cycle for scope '{}' (round {}, max {} rounds)",
            state.scope_id, state.round, config.cycle.max_rounds
        );
        let store = ArtifactStore::new(&config.cycle.artifacts_dir);
        println!("Artifacts: {}", store.scope_dir(&state.scope_id).display());

        Ok(())
    }
}
