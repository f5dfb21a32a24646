//! Operator configuration discovery
//!
//! A single optional YAML file supplies defaults for every invocation:
//!
//! ```yaml
//! cert_file: keys/team.pem   # relative to this file
//! sandbox: false
//! signed_only: true
//! ```
//!
//! Flags given on the command line always win over the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

use crate::gate::GatePolicy;

/// File name looked up inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "config.yml";

/// Defaults applied to every exec and sign
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Key used when the command line names none
    pub cert_file: Option<PathBuf>,
    /// Run every script sandboxed
    pub sandbox: bool,
    /// Refuse scripts without a signature
    pub signed_only: bool,
}

impl GateConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: GateConfig = if content.trim().is_empty() {
            GateConfig::default()
        } else {
            serde_yaml_ng::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        };

        if let Some(cert_file) = config.cert_file.take() {
            let resolved = if cert_file.is_relative() {
                path.parent()
                    .map(|dir| dir.join(&cert_file))
                    .unwrap_or(cert_file)
            } else {
                cert_file
            };
            config.cert_file = Some(resolved);
        }

        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Find the config file to use.
    ///
    /// Resolution order:
    /// 1. CLI override (must be an absolute path to an existing file)
    /// 2. `config.yml` in the platform config directory for `scriptgate`
    /// 3. Defaults, when neither exists
    pub fn discover_with_override(cli_override: Option<PathBuf>) -> Result<Self> {
        trace!("Discovering gate configuration");

        if let Some(override_path) = cli_override {
            if !override_path.is_absolute() {
                return Err(anyhow::anyhow!(
                    "Config path must be absolute (got: {})",
                    override_path.display()
                ));
            }
            if !override_path.is_file() {
                return Err(anyhow::anyhow!(
                    "Config file does not exist: {}",
                    override_path.display()
                ));
            }

            debug!("Using CLI --config override: {}", override_path.display());
            return Self::load(&override_path);
        }

        match Self::platform_config_file() {
            Some(path) if path.is_file() => {
                info!("Found configuration at {}", path.display());
                Self::load(&path)
            }
            other => {
                debug!("No configuration found at {:?}", other);
                Ok(Self::default())
            }
        }
    }

    /// Location of the per-user config file on this platform
    pub fn platform_config_file() -> Option<PathBuf> {
        use directories::ProjectDirs;

        // Linux: ~/.config/scriptgate/config.yml
        // macOS: ~/Library/Application Support/scriptgate/config.yml
        ProjectDirs::from("", "", "scriptgate").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// The gate policy these settings describe
    pub fn policy(&self) -> GatePolicy {
        GatePolicy {
            signed_only: self.signed_only,
            force_sandbox: self.sandbox,
        }
    }
}
