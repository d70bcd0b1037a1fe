//! Conform Configuration System
//!
//! Provides configuration management for the conformance harness:
//! - Harness configuration (conform.toml)
//! - Environment variable overrides
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults (`impl/test`, `.pf`, `target/pcc`)
//! 2. Harness config (./conform.toml, searched upwards)
//! 3. Environment variables (CONFORM_*)
//! 4. CLI flags (applied by the caller)
//!
//! # Example
//!
//! ```no_run
//! use conform_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("corpus: {}", config.corpus_dir().display());
//! ```

pub mod harness;
pub mod loader;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use harness::{CorpusConfig, HarnessConfig, SubjectConfig};
pub use loader::{Config, ConfigLoader, CONFIG_FILE_NAME};
