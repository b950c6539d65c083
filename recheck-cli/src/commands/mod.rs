//! CLI command implementations

pub mod run;
pub mod start;
pub mod status;

use std::sync::Arc;

use recheck_core::{
    ArtifactStore, Assembler, CommandReviewer, Config, CycleController, CycleOptions, FsLoader,
};

pub use run::RunArgs;
pub use start::StartArgs;
pub use status::StatusArgs;

/// Process exit codes, one per cycle disposition
pub mod exit_codes {
    /// Cycle converged with no open findings
    pub const CONVERGED: i32 = 0;
    /// Engine failure (I/O, configuration, reviewer defects)
    pub const INTERNAL_FAILURE: i32 = 1;
    /// Round completed with findings still open
    pub const FINDINGS_OPEN: i32 = 10;
    /// Round limit hit with findings still open
    pub const ROUND_LIMIT_REACHED: i32 = 20;
}

/// Build a controller wired from configuration, rooted at the working tree
pub fn build_controller(config: &Config) -> anyhow::Result<CycleController> {
    let repo_root = std::env::current_dir()?;
    let store = ArtifactStore::new(&config.cycle.artifacts_dir);
    let loader = Arc::new(FsLoader::new(&repo_root));
    let assembler = Assembler::new(loader, config.cycle.docs_dir.to_string_lossy())
        .with_repo_root(&repo_root);

    let reviewer = CommandReviewer::from_config(&config.reviewer)
        .with_max_bundle_chars(config.cycle.max_bundle_chars);

    Ok(CycleController::new(
        store,
        assembler,
        Arc::new(reviewer),
        CycleOptions {
            max_rounds: config.cycle.max_rounds,
        },
    ))
}
