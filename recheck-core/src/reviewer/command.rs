//! Process-backed reviewer
//!
//! Spawns a configured external command per review call, hands it a JSON
//! payload on stdin, and reads the raw report JSON from stdout. The command
//! is the integration point for whatever reviewing intelligence is plugged
//! in.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::Reviewer;
use crate::config::ReviewerConfig;
use crate::sot::SotBundle;
use crate::{Error, Result};

/// Reviewer implementation that shells out to an external command
///
/// Payload on stdin:
///
/// ```json
/// {"scope_id": "...", "sot": "<rendered bundle>", "diff": "..."}
/// ```
///
/// Expected on stdout: raw report JSON targeting the published schema.
#[derive(Debug, Clone)]
pub struct CommandReviewer {
    command: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    max_bundle_chars: usize,
}

impl CommandReviewer {
    /// Create a reviewer invoking the given command
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            timeout: None,
            max_bundle_chars: 0,
        }
    }

    /// Create a reviewer from configuration
    pub fn from_config(config: &ReviewerConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: config.timeout,
            max_bundle_chars: 0,
        }
    }

    /// Add arguments passed to every invocation
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Bound each review call; on expiry the call fails with
    /// `ReviewerTimeout` and the round is retried, not advanced
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cap the rendered bundle handed to the command (0 = no cap)
    pub fn with_max_bundle_chars(mut self, max_chars: usize) -> Self {
        self.max_bundle_chars = max_chars;
        self
    }

    async fn invoke(&self, payload: String) -> Result<serde_json::Value> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::Reviewer(format!("reviewer command not found: '{}'", self.command))
                } else {
                    Error::Io(e)
                }
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Reviewer("failed to open reviewer stdin".to_string()))?;
        stdin.write_all(payload.as_bytes()).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Reviewer(format!(
                "reviewer exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let raw: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::Reviewer(format!("reviewer produced invalid JSON: {}", e)))?;
        Ok(raw)
    }
}

#[async_trait]
impl Reviewer for CommandReviewer {
    async fn review(&self, bundle: &SotBundle, diff: &str) -> Result<serde_json::Value> {
        let payload = json!({
            "scope_id": bundle.scope_id,
            "sot": bundle.render(self.max_bundle_chars),
            "diff": diff,
        })
        .to_string();

        tracing::debug!(
            scope_id = %bundle.scope_id,
            command = %self.command,
            payload_bytes = payload.len(),
            "Invoking external reviewer"
        );

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.invoke(payload))
                .await
                .map_err(|_| Error::ReviewerTimeout { timeout: limit })?,
            None => self.invoke(payload).await,
        }
    }
}
