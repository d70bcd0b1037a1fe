//! Harness Configuration (conform.toml)
//!
//! Handles harness-level configuration stored in `conform.toml`. Every key is
//! optional; missing keys fall back to the built-in defaults.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Harness configuration from conform.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// Corpus location and file filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus: Option<CorpusConfig>,

    /// Subject binary and its command-line contract
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectConfig>,
}

/// Corpus configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CorpusConfig {
    /// Corpus directory (default: "impl/test")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// File name suffix selecting test inputs (default: ".pf")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

/// Subject binary configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SubjectConfig {
    /// Path to the subject binary (default: "target/pcc")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,

    /// Flag always passed after the input file (default: "-v")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose_flag: Option<String>,

    /// Flag appended in optimized mode (default: "-O")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimize_flag: Option<String>,

    /// Per-invocation deadline in seconds, 0 disables (default: 120)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl HarnessConfig {
    /// Load harness configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the harness configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(corpus) = &self.corpus {
            if let Some(suffix) = &corpus.suffix {
                if suffix.is_empty() {
                    return Err(invalid("corpus.suffix", "suffix cannot be empty"));
                }
            }
            if let Some(dir) = &corpus.dir {
                if dir.as_os_str().is_empty() {
                    return Err(invalid("corpus.dir", "directory cannot be empty"));
                }
            }
        }

        if let Some(subject) = &self.subject {
            if let Some(binary) = &subject.binary {
                if binary.as_os_str().is_empty() {
                    return Err(invalid("subject.binary", "binary path cannot be empty"));
                }
            }
            for (field, flag) in [
                ("subject.verbose_flag", &subject.verbose_flag),
                ("subject.optimize_flag", &subject.optimize_flag),
            ] {
                if let Some(flag) = flag {
                    if flag.trim().is_empty() {
                        return Err(invalid(field, "flag cannot be empty"));
                    }
                }
            }
        }

        Ok(())
    }

    /// Resolve relative paths against the directory the config file lives in
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        if let Some(dir) = self.corpus.as_mut().and_then(|c| c.dir.as_mut()) {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }

        // Bare program names ("pcc") are left alone so they resolve through PATH.
        if let Some(binary) = self.subject.as_mut().and_then(|s| s.binary.as_mut()) {
            if binary.is_relative() && binary.components().count() > 1 {
                *binary = base.join(&*binary);
            }
        }

        self
    }

    pub fn corpus_dir(&self) -> Option<&Path> {
        self.corpus.as_ref()?.dir.as_deref()
    }

    pub fn suffix(&self) -> Option<&str> {
        self.corpus.as_ref()?.suffix.as_deref()
    }

    pub fn binary(&self) -> Option<&Path> {
        self.subject.as_ref()?.binary.as_deref()
    }

    pub fn verbose_flag(&self) -> Option<&str> {
        self.subject.as_ref()?.verbose_flag.as_deref()
    }

    pub fn optimize_flag(&self) -> Option<&str> {
        self.subject.as_ref()?.optimize_flag.as_deref()
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.subject.as_ref()?.timeout_secs
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
