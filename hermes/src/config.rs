use std::path::{Path, PathBuf};

use anyhow::Context;
use hermes_dispatch::{DispatchConfig, SmtpTransportConfig};
use serde::{Deserialize, Serialize};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "HERMES_CONFIG";

/// Locations searched, in order, when [`CONFIG_ENV`] is not set.
pub const DEFAULT_PATHS: [&str; 2] = ["./hermes.config.ron", "/etc/hermes/hermes.config.ron"];

/// The contents of `hermes.config.ron`.
///
/// ```ron
/// (
///     dispatch: (
///         workers: 4,
///         per_minute: 10,
///         host: "smtp.example.com",
///         auth: "login",
///     ),
///     smtp: (
///         port: 587,
///         tls: Required,
///     ),
/// )
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dispatch: DispatchConfig,
    pub smtp: SmtpTransportConfig,
}

impl Config {
    /// Parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid RON.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        ron::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Loads the configuration file, if any.
    ///
    /// An explicit path (from `--config`) must exist. Otherwise the file is located
    /// through [`find_config_file`]; when there is none, defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if a named file does not exist or any file fails to parse.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) if path.exists() => Some(path.to_path_buf()),
            Some(path) => anyhow::bail!("Config file {} does not exist", path.display()),
            None => find_config_file(
                std::env::var_os(CONFIG_ENV).map(PathBuf::from),
                &DEFAULT_PATHS.map(PathBuf::from),
            )?,
        };

        match path {
            Some(path) => {
                tracing::debug!(config = %path.display(), "loading configuration");
                Self::from_file(&path)
            }
            None => {
                tracing::debug!("no configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Find the configuration file using the following precedence:
/// 1. the `HERMES_CONFIG` environment variable (`from_env`)
/// 2. the first of `defaults` that exists
///
/// # Errors
///
/// Returns an error if `from_env` names a file that does not exist.
pub fn find_config_file(
    from_env: Option<PathBuf>,
    defaults: &[PathBuf],
) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = from_env {
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!(
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
    }

    Ok(defaults.iter().find(|path| path.exists()).cloned())
}
