//! Configuration schema for prebuild
//!
//! Configuration is stored at `~/.config/prebuild/config.toml`

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// External build tool settings
    pub toolchain: ToolchainConfig,

    /// Build coordination settings
    pub build: BuildConfig,

    /// Defaults for newly scaffolded packages
    pub package: PackageConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// External build tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Toolchain kind (currently only "dotnet")
    pub kind: String,

    /// Executable to invoke
    pub program: String,

    /// Build configuration passed to the tool
    pub configuration: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            kind: "dotnet".to_string(),
            program: "dotnet".to_string(),
            configuration: "Debug".to_string(),
        }
    }
}

/// Build coordination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Window in which build requests are merged into one build
    pub debounce_ms: u64,

    /// Attempts made to acquire a directory lock
    pub lock_attempts: u32,

    /// Delay between lock attempts
    pub lock_retry_ms: u64,

    /// Polls made while waiting for a fresh manifest to settle
    pub manifest_wait_attempts: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            lock_attempts: 100,
            lock_retry_ms: 100,
            manifest_wait_attempts: 50,
        }
    }
}

/// Defaults for scaffolded packages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Template used when a package directory is empty
    pub template: String,

    /// Language passed to the scaffolding tool
    pub language: Option<String>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            template: "console".to_string(),
            language: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[toolchain]"));
        assert!(toml.contains("[build]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.toolchain.program, "dotnet");
        assert_eq!(config.build.debounce_ms, 500);
        assert_eq!(config.build.lock_attempts, 100);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [build]
            debounce_ms = 50
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.build.debounce_ms, 50);
        assert_eq!(config.build.lock_retry_ms, 100); // default preserved
        assert_eq!(config.package.template, "console");
    }
}
