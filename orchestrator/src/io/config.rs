//! Orchestrator configuration loaded from a TOML file.
//!
//! Every field has a default; a missing config file yields the defaults so
//! the binary works out of the box in a fresh checkout.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Directory searched for `<name>.json` checklist documents.
    pub checklist_dir: PathBuf,
    /// Directory where validation scripts drop their declared artifacts.
    pub artifacts_dir: PathBuf,
    /// Total tries per task, first attempt included.
    pub max_attempts: u32,
    /// Timeout applied to every spawned command.
    pub command_timeout_secs: u64,
    /// Captured stdout/stderr bound per stream.
    pub output_limit_bytes: usize,
    /// Backoff unit: sleep before retry `k` is `2^(k-1)` of these.
    pub retry_backoff_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            checklist_dir: PathBuf::from(".checklists"),
            artifacts_dir: PathBuf::from("transition_artifacts"),
            max_attempts: 3,
            command_timeout_secs: 300,
            output_limit_bytes: 100_000,
            retry_backoff_secs: 1,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.command_timeout_secs == 0 {
            bail!("command_timeout_secs must be at least 1");
        }
        if self.output_limit_bytes == 0 {
            bail!("output_limit_bytes must be at least 1");
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    /// Path of the named checklist document under the checklist directory.
    pub fn checklist_path(&self, name: &str) -> PathBuf {
        self.checklist_dir.join(format!("{name}.json"))
    }
}

/// Load configuration from `path`. A missing file is not an error; the
/// defaults apply. A present but unparsable or invalid file is.
pub fn load_config(path: &Path) -> Result<OrchestratorConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file missing, using defaults");
        return Ok(OrchestratorConfig::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let config: OrchestratorConfig = toml::from_str(&raw)
        .with_context(|| format!("parse config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}
