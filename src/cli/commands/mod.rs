//! CLI command implementations

pub mod build;
pub mod config;
pub mod status;
pub mod workspace;

pub use build::execute as build;
pub use config::execute as config;
pub use status::execute as status;
pub use workspace::execute as workspace;

use crate::config::{Config, ConfigManager};
use crate::error::PrebuildResult;
use crate::package::PackageBuilder;
use crate::toolchain::create_toolchain;
use std::path::{Path, PathBuf};

/// Apply toolchain and build settings from the configuration
pub(crate) fn configure(builder: &mut PackageBuilder, config: &Config) -> PrebuildResult<()> {
    builder
        .toolchain(create_toolchain(&config.toolchain)?)
        .debounce(config.build.debounce())
        .lock_options(config.build.lock_options())
        .manifest_wait_attempts(config.build.manifest_wait_attempts);
    Ok(())
}

/// Find an existing package directory, preferring prebuilt packages over
/// the build-on-demand root
pub(crate) fn locate_package(name: &str, dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = dir {
        return dir.to_path_buf();
    }
    let prebuilt = ConfigManager::prebuilds_dir().join(name);
    if prebuilt.is_dir() {
        prebuilt
    } else {
        ConfigManager::packages_dir().join(name)
    }
}
