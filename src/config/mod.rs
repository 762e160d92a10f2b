//! Configuration management for prebuild

pub mod schema;

pub use schema::Config;

use crate::cache::LockOptions;
use crate::error::{PrebuildError, PrebuildResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

/// Environment variable overriding the root of build-on-demand packages
pub const PACKAGES_PATH_ENV: &str = "PREBUILD_PACKAGES_PATH";

/// Environment variable overriding the root of prebuilt-only packages
pub const PREBUILDS_PATH_ENV: &str = "PREBUILD_PREBUILDS_PATH";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("prebuild")
            .join("config.toml")
    }

    fn profile_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".prebuild")
    }

    /// Root directory for packages that are built on demand
    pub fn packages_dir() -> PathBuf {
        std::env::var_os(PACKAGES_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::profile_root().join("packages"))
    }

    /// Root directory for packages that must already be built
    pub fn prebuilds_dir() -> PathBuf {
        std::env::var_os(PREBUILDS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::profile_root().join("prebuilds"))
    }

    /// Default root for a package, creating it if absent
    pub async fn ensure_default_root(enable_build: bool) -> PrebuildResult<PathBuf> {
        let root = if enable_build {
            Self::packages_dir()
        } else {
            Self::prebuilds_dir()
        };

        if !root.exists() {
            fs::create_dir_all(&root).await.map_err(|e| {
                PrebuildError::io(format!("creating directory {}", root.display()), e)
            })?;
            info!("Created package root {}", root.display());
        }

        Ok(root)
    }

    /// Load configuration, creating default if not exists
    pub async fn load(&self) -> PrebuildResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> PrebuildResult<Config> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            PrebuildError::io(format!("reading config from {}", path.display()), e)
        })?;

        toml::from_str(&content).map_err(|e| PrebuildError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> PrebuildResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            PrebuildError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> PrebuildResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PrebuildError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl schema::BuildConfig {
    /// Debounce window as a duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Lock retry policy
    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            attempts: self.lock_attempts,
            retry_interval: Duration::from_millis(self.lock_retry_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.toolchain.kind, "dotnet");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.build.debounce_ms = 25;

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.build.debounce_ms, 25);
    }

    #[tokio::test]
    async fn invalid_config_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[build]\ndebounce_ms = \"soon\"").unwrap();

        let err = ConfigManager::with_path(path.clone()).load().await.unwrap_err();
        assert!(matches!(err, PrebuildError::ConfigInvalid { path: p, .. } if p == path));
    }

    #[tokio::test]
    #[serial]
    async fn package_roots_follow_environment() {
        let temp = TempDir::new().unwrap();
        let packages = temp.path().join("on-demand");
        let prebuilds = temp.path().join("prebuilt");
        std::env::set_var(PACKAGES_PATH_ENV, &packages);
        std::env::set_var(PREBUILDS_PATH_ENV, &prebuilds);

        let on_demand = ConfigManager::ensure_default_root(true).await.unwrap();
        let prebuilt = ConfigManager::ensure_default_root(false).await.unwrap();

        std::env::remove_var(PACKAGES_PATH_ENV);
        std::env::remove_var(PREBUILDS_PATH_ENV);

        assert_eq!(on_demand, packages);
        assert_eq!(prebuilt, prebuilds);
        assert!(packages.is_dir());
        assert!(prebuilds.is_dir());
    }

    #[test]
    #[serial]
    fn package_roots_default_under_profile() {
        std::env::remove_var(PACKAGES_PATH_ENV);
        std::env::remove_var(PREBUILDS_PATH_ENV);

        assert!(ConfigManager::packages_dir().ends_with(".prebuild/packages"));
        assert!(ConfigManager::prebuilds_dir().ends_with(".prebuild/prebuilds"));
    }

    #[test]
    fn build_config_converts_durations() {
        let build = schema::BuildConfig::default();
        assert_eq!(build.debounce(), Duration::from_millis(500));

        let lock = build.lock_options();
        assert_eq!(lock.attempts, 100);
        assert_eq!(lock.retry_interval, Duration::from_millis(100));
    }
}
