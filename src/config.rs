use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::{mlog_debug, Error, Result};

/// Hard system-wide cap on how long a result collection may wait,
/// regardless of what the caller requested.
pub const COLLECT_HARD_CAP_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Poll interval for the result collector, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Coverage percentage below which completion validation complains.
    #[serde(default = "default_coverage_threshold")]
    pub coverage_threshold: f64,
    /// Directory where task worktrees are created. Defaults to ~/.marshal/worktrees.
    pub worktree_dir: Option<String>,
    /// Default validation strictness when the caller does not specify one.
    #[serde(default)]
    pub strictness: crate::orchestration::Strictness,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_coverage_threshold() -> f64 {
    80.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            coverage_threshold: default_coverage_threshold(),
            worktree_dir: None,
            strictness: crate::orchestration::Strictness::default(),
        }
    }
}

impl Config {
    pub fn marshal_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".marshal"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::marshal_dir()?.join("marshal.toml"))
    }

    pub fn state_dir() -> Result<PathBuf> {
        Ok(Self::marshal_dir()?.join("state"))
    }

    pub fn worktrees_dir(&self) -> Result<PathBuf> {
        match &self.worktree_dir {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Ok(Self::marshal_dir()?.join("worktrees")),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn collect_hard_cap(&self) -> Duration {
        Duration::from_secs(COLLECT_HARD_CAP_SECS)
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        mlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            mlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        mlog_debug!(
            "Config loaded: poll_interval_ms={}, coverage_threshold={}, worktree_dir={:?}",
            config.poll_interval_ms,
            config.coverage_threshold,
            config.worktree_dir
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let marshal_dir = Self::marshal_dir()?;
        if !marshal_dir.exists() {
            fs::create_dir_all(&marshal_dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        mlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        let marshal_dir = Self::marshal_dir()?;
        let state_dir = Self::state_dir()?;
        let worktrees_dir = self.worktrees_dir()?;
        for dir in [&marshal_dir, &state_dir, &worktrees_dir] {
            if !dir.exists() {
                mlog_debug!("Creating directory: {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::Strictness;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval_ms, 1_000);
        assert_eq!(config.coverage_threshold, 80.0);
        assert!(config.worktree_dir.is_none());
        assert_eq!(config.strictness, Strictness::Moderate);
        assert_eq!(config.collect_hard_cap(), Duration::from_secs(300));
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/foo/bar");
        assert!(expanded.ends_with("foo/bar"));
        assert!(!expanded.to_string_lossy().contains('~'));

        let absolute = expand_tilde("/absolute/path");
        assert_eq!(absolute, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config {
            poll_interval_ms: 250,
            coverage_threshold: 70.0,
            worktree_dir: Some("~/worktrees".to_string()),
            strictness: Strictness::Strict,
        };
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.poll_interval_ms, 250);
        assert_eq!(parsed.coverage_threshold, 70.0);
        assert_eq!(parsed.worktree_dir, Some("~/worktrees".to_string()));
        assert_eq!(parsed.strictness, Strictness::Strict);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("worktree_dir = \"/tmp/wt\"").unwrap();
        assert_eq!(parsed.poll_interval_ms, 1_000);
        assert_eq!(parsed.coverage_threshold, 80.0);
        assert_eq!(parsed.worktree_dir, Some("/tmp/wt".to_string()));
    }
}
