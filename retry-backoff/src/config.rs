use crate::backoff::{ExponentialBackoff, DEFAULT_BACKOFF};
use crate::error::PolicyError;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Backoff bounds as stored in `config.yaml`. Unset fields fall back to the
/// default policy.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ms: Option<u64>,
}

impl Config {
    /// Loads the default config file, or defaults when there is none.
    pub fn load() -> Result<Self> {
        Self::load_or_default(&Self::config_path()?)
    }

    /// Reads `path` when it exists; a missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        // an empty file parses as unit, not as a map
        if data.trim().is_empty() {
            return Ok(Config::default());
        }
        let cfg: Config = serde_yaml::from_str(&data).context("parse config yaml")?;
        debug!(path = %path.display(), ?cfg, "loaded config");
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("create config dir")?;
        }
        let data = serde_yaml::to_string(&self).context("serialize config")?;
        let mut f = fs::File::create(path).context("create config file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = f.metadata()?.permissions();
            perms.set_mode(0o600);
            f.set_permissions(perms)?;
        }
        f.write_all(data.as_bytes()).context("write config file")?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        // Vendorless
        let proj = ProjectDirs::from("", "", "retry-backoff").context("locate config dir")?;
        Ok(proj.config_dir().join("config.yaml"))
    }

    pub fn apply_cli(&mut self, cli: &crate::cli::Cli) {
        if let Some(min) = cli.min_ms {
            self.min_ms = Some(min);
        }
        if let Some(max) = cli.max_ms {
            self.max_ms = Some(max);
        }
    }

    /// Effective config with every field filled in.
    pub fn resolved(&self) -> Config {
        Config {
            min_ms: Some(self.min_ms.unwrap_or(millis(DEFAULT_BACKOFF.min()))),
            max_ms: Some(self.max_ms.unwrap_or(millis(DEFAULT_BACKOFF.max()))),
        }
    }

    pub fn policy(&self) -> Result<ExponentialBackoff, PolicyError> {
        let min = self.min_ms.map(Duration::from_millis).unwrap_or(DEFAULT_BACKOFF.min());
        let max = self.max_ms.map(Duration::from_millis).unwrap_or(DEFAULT_BACKOFF.max());
        ExponentialBackoff::try_new(min, max)
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
