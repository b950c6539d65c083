//! Configuration management for the review cycle engine
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (RECHECK_*)
//! 3. Config file (~/.config/recheck/config.toml)
//! 4. Default values

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default maximum number of review rounds before escalation
pub const DEFAULT_MAX_ROUNDS: u32 = 5;

/// Reviewer-related configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReviewerConfig {
    /// Command to invoke as the external reviewer
    pub command: String,

    /// Additional arguments passed to the reviewer command
    pub args: Vec<String>,

    /// Bound on a single reviewer call; no timeout when absent
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for ReviewerConfig {
    fn default() -> Self {
        Self {
            command: "recheck-reviewer".to_string(),
            args: Vec::new(),
            timeout: None,
        }
    }
}

/// Cycle-related configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Maximum review rounds before the cycle terminates unresolved
    pub max_rounds: u32,

    /// Directory holding per-scope state and report artifacts
    pub artifacts_dir: PathBuf,

    /// Conventional directory scanned for local PRD/Epic documents
    pub docs_dir: PathBuf,

    /// Cap on the rendered SoT bundle size in characters (0 = no limit)
    pub max_bundle_chars: usize,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            artifacts_dir: PathBuf::from(".recheck"),
            docs_dir: PathBuf::from("docs"),
            max_bundle_chars: 0,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Reviewer configuration
    pub reviewer: ReviewerConfig,

    /// Cycle configuration
    pub cycle: CycleConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/recheck/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("recheck").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - RECHECK_REVIEWER_CMD: Reviewer command
    /// - RECHECK_MAX_ROUNDS: Maximum review rounds
    /// - RECHECK_ARTIFACTS_DIR: Artifacts directory
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(command) = std::env::var("RECHECK_REVIEWER_CMD") {
            self.reviewer.command = command;
        }

        if let Ok(raw) = std::env::var("RECHECK_MAX_ROUNDS") {
            let rounds: u32 = raw
                .parse()
                .map_err(|_| Error::Config(format!("RECHECK_MAX_ROUNDS is not a number: {}", raw)))?;
            if rounds == 0 {
                return Err(Error::Config(
                    "RECHECK_MAX_ROUNDS must be at least 1".to_string(),
                ));
            }
            self.cycle.max_rounds = rounds;
        }

        if let Ok(dir) = std::env::var("RECHECK_ARTIFACTS_DIR") {
            self.cycle.artifacts_dir = PathBuf::from(dir);
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        mut self,
        reviewer_cmd: Option<String>,
        max_rounds: Option<u32>,
    ) -> Result<Self> {
        if let Some(command) = reviewer_cmd {
            self.reviewer.command = command;
        }

        if let Some(rounds) = max_rounds {
            if rounds == 0 {
                return Err(Error::Config("max_rounds must be at least 1".to_string()));
            }
            self.cycle.max_rounds = rounds;
        }

        Ok(self)
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        reviewer_cmd: Option<String>,
        max_rounds: Option<u32>,
    ) -> Result<Self> {
        Self::load()?
            .with_env_overrides()?
            .with_cli_overrides(reviewer_cmd, max_rounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cycle.max_rounds, 5);
        assert_eq!(config.cycle.artifacts_dir, PathBuf::from(".recheck"));
        assert!(config.reviewer.timeout.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::default()
            .with_cli_overrides(Some("/usr/bin/reviewer".to_string()), Some(3))
            .unwrap();

        assert_eq!(config.reviewer.command, "/usr/bin/reviewer");
        assert_eq!(config.cycle.max_rounds, 3);
    }

    #[test]
    fn test_cli_zero_max_rounds_rejected() {
        let err = Config::default().with_cli_overrides(None, Some(0)).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("max_rounds")));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[reviewer]
command = "claude-review"
args = ["--json"]
timeout = "5m"

[cycle]
max_rounds = 7
artifacts_dir = ".review-state"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.reviewer.command, "claude-review");
        assert_eq!(config.reviewer.args, vec!["--json"]);
        assert_eq!(config.reviewer.timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.cycle.max_rounds, 7);
        assert_eq!(config.cycle.artifacts_dir, PathBuf::from(".review-state"));
    }

    #[test]
    fn test_partial_toml() {
        let toml = r#"
[cycle]
max_rounds = 2
"#;
        let config: Config = toml::from_str(toml).unwrap();
        // Reviewer section should use defaults
        assert_eq!(config.reviewer.command, "recheck-reviewer");
        assert_eq!(config.cycle.max_rounds, 2);
        // docs_dir untouched
        assert_eq!(config.cycle.docs_dir, PathBuf::from("docs"));
    }
}
