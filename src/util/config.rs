//! Configuration file support for slipway.
//!
//! Two locations are consulted:
//! - Global: `~/.slipway/config.toml` - user-wide defaults
//! - Project: `.slipway/config.toml` - project-specific overrides
//!
//! Project config takes precedence over global config. The manifest
//! (`Slipway.toml`) describes *what* to build; config files hold
//! machine-local knobs such as parallelism and interpreter locations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// slipway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Interpreter location overrides, keyed by runtime version or tag.
    ///
    /// ```toml
    /// [interpreters]
    /// "3.11.4" = "/opt/python/3.11.4/bin/python3"
    /// py39 = "/usr/local/bin/python3.9"
    /// ```
    pub interpreters: BTreeMap<String, PathBuf>,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Default number of parallel matrix entries (None = sequential)
    pub jobs: Option<usize>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        for (key, value) in other.interpreters {
            self.interpreters.insert(key, value);
        }
    }

    /// Look up an interpreter override for a runtime, by version first,
    /// then by tag.
    pub fn interpreter_for(&self, version: &str, tag: &str) -> Option<&Path> {
        self.interpreters
            .get(version)
            .or_else(|| self.interpreters.get(tag))
            .map(PathBuf::as_path)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.slipway/config.toml)
/// 2. Global config (~/.slipway/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        let global = Config::load_or_default(global_path);
        config.merge(global);
    }

    if project_path.exists() {
        let project = Config::load_or_default(project_path);
        config.merge(project);
    }

    config
}
