//! CLI configuration via environment variables
//!
//! Output preferences that are not part of conform.toml. Harness settings
//! (corpus, subject, timeout) live in the `conform-config` crate.

use std::env;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Default to JSON output (CONFORM_JSON=1)
    pub default_json: bool,
    /// Disable colored output (CONFORM_NO_COLOR=1 or NO_COLOR=1)
    pub no_color: bool,
}

impl CliConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            default_json: env::var("CONFORM_JSON")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            no_color: env::var("CONFORM_NO_COLOR").is_ok() || env::var("NO_COLOR").is_ok(),
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "json"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_defaults() {
        env::remove_var("CONFORM_JSON");
        env::remove_var("CONFORM_NO_COLOR");
        env::remove_var("NO_COLOR");

        let config = CliConfig::from_env();
        assert!(!config.default_json);
        assert!(!config.no_color);
    }

    #[test]
    #[serial]
    fn test_config_json() {
        env::set_var("CONFORM_JSON", "1");
        assert!(CliConfig::from_env().default_json);

        env::set_var("CONFORM_JSON", "off");
        assert!(!CliConfig::from_env().default_json);
        env::remove_var("CONFORM_JSON");
    }

    #[test]
    #[serial]
    fn test_config_no_color() {
        env::set_var("CONFORM_NO_COLOR", "1");
        assert!(CliConfig::from_env().no_color);
        env::remove_var("CONFORM_NO_COLOR");

        // Also test NO_COLOR (standard)
        env::set_var("NO_COLOR", "1");
        assert!(CliConfig::from_env().no_color);
        env::remove_var("NO_COLOR");
    }
}
