//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::harness::{CorpusConfig, HarnessConfig, SubjectConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the harness configuration file
pub const CONFIG_FILE_NAME: &str = "conform.toml";

const DEFAULT_CORPUS_DIR: &str = "impl/test";
const DEFAULT_SUFFIX: &str = ".pf";
const DEFAULT_BINARY: &str = "target/pcc";
const DEFAULT_VERBOSE_FLAG: &str = "-v";
const DEFAULT_OPTIMIZE_FLAG: &str = "-O";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Built-in defaults - lowest priority
/// 2. Harness config (./conform.toml) - overrides defaults
/// 3. Environment variables (CONFORM_*) - overrides the file
/// 4. CLI flags - highest priority (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Skip CONFORM_* environment overrides
    ignore_env: bool,
}

/// Merged configuration result
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Harness configuration after env overrides
    pub harness: HarnessConfig,

    /// Directory containing the conform.toml that was loaded, if any
    pub config_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { ignore_env: false }
    }

    /// Disable environment variable overrides
    pub fn without_env(mut self) -> Self {
        self.ignore_env = true;
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find conform.toml. Its absence is not an
    /// error; the defaults apply.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (config_root, harness) = self.find_harness_config(start_dir)?;
        let harness = self.apply_env_overrides(harness)?;

        Ok(Config {
            harness,
            config_root,
        })
    }

    /// Load configuration from a specific config file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let config_root = config_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();

        let harness = HarnessConfig::load_from_file(config_path)?.resolve_paths(&config_root);
        let harness = self.apply_env_overrides(harness)?;

        Ok(Config {
            harness,
            config_root: Some(config_root),
        })
    }

    /// Find harness configuration by walking up directory tree
    fn find_harness_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, HarnessConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let harness = HarnessConfig::load_from_file(&config_path)?.resolve_paths(&current);
                return Ok((Some(current), harness));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, HarnessConfig::default())),
            }
        }
    }

    /// Apply environment variable overrides to the harness config
    ///
    /// Recognised: CONFORM_CORPUS_DIR, CONFORM_SUFFIX, CONFORM_SUBJECT, CONFORM_TIMEOUT.
    /// Paths from the environment are taken as-is (relative to the working directory).
    fn apply_env_overrides(&self, mut config: HarnessConfig) -> ConfigResult<HarnessConfig> {
        if self.ignore_env {
            return Ok(config);
        }

        if let Ok(dir) = env::var("CONFORM_CORPUS_DIR") {
            config
                .corpus
                .get_or_insert_with(CorpusConfig::default)
                .dir = Some(PathBuf::from(dir));
        }

        if let Ok(suffix) = env::var("CONFORM_SUFFIX") {
            config
                .corpus
                .get_or_insert_with(CorpusConfig::default)
                .suffix = Some(suffix);
        }

        if let Ok(binary) = env::var("CONFORM_SUBJECT") {
            config
                .subject
                .get_or_insert_with(SubjectConfig::default)
                .binary = Some(PathBuf::from(binary));
        }

        if let Ok(timeout) = env::var("CONFORM_TIMEOUT") {
            let secs = timeout
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    field: "CONFORM_TIMEOUT".to_string(),
                    reason: format!("expected a whole number of seconds, got '{}'", timeout),
                })?;
            config
                .subject
                .get_or_insert_with(SubjectConfig::default)
                .timeout_secs = Some(secs);
        }

        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Built-in defaults with no config file
    pub fn defaults() -> Self {
        Self {
            harness: HarnessConfig::default(),
            config_root: None,
        }
    }

    /// Get the effective corpus directory
    pub fn corpus_dir(&self) -> PathBuf {
        self.harness
            .corpus_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CORPUS_DIR))
    }

    /// Get the effective file name suffix
    pub fn suffix(&self) -> &str {
        self.harness.suffix().unwrap_or(DEFAULT_SUFFIX)
    }

    /// Get the effective subject binary
    pub fn binary(&self) -> PathBuf {
        self.harness
            .binary()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BINARY))
    }

    pub fn verbose_flag(&self) -> &str {
        self.harness.verbose_flag().unwrap_or(DEFAULT_VERBOSE_FLAG)
    }

    pub fn optimize_flag(&self) -> &str {
        self.harness.optimize_flag().unwrap_or(DEFAULT_OPTIMIZE_FLAG)
    }

    /// Get the per-invocation deadline, `None` when disabled with 0
    pub fn timeout(&self) -> Option<Duration> {
        match self.harness.timeout_secs().unwrap_or(DEFAULT_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Get the directory the config file was found in
    pub fn config_root(&self) -> Option<&Path> {
        self.config_root.as_deref()
    }

    /// Check if a conform.toml was loaded
    pub fn has_config_file(&self) -> bool {
        self.config_root.is_some()
    }
}
