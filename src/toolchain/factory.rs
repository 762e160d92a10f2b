//! Toolchain factory
//!
//! Picks the toolchain implementation named in config.

use crate::config::schema::ToolchainConfig;
use crate::error::{PrebuildError, PrebuildResult};
use crate::toolchain::{DotnetToolchain, Toolchain};
use std::sync::Arc;

/// Create the toolchain described by `config`
///
/// # Returns
/// * `Ok(Arc<dyn Toolchain>)` - A shareable toolchain implementation
/// * `Err` - If `config.kind` names no known toolchain
pub fn create_toolchain(config: &ToolchainConfig) -> PrebuildResult<Arc<dyn Toolchain>> {
    match config.kind.as_str() {
        "dotnet" => Ok(Arc::new(DotnetToolchain::new(
            config.program.clone(),
            config.configuration.clone(),
        ))),
        other => Err(PrebuildError::UnsupportedToolchain(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_default_toolchain() {
        let toolchain = create_toolchain(&ToolchainConfig::default()).unwrap();
        assert_eq!(toolchain.name(), "dotnet");
        assert_eq!(toolchain.configuration(), "Debug");
    }

    #[test]
    fn configuration_is_passed_through() {
        let config = ToolchainConfig {
            configuration: "Release".to_string(),
            ..Default::default()
        };
        let toolchain = create_toolchain(&config).unwrap();
        assert_eq!(toolchain.configuration(), "Release");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let config = ToolchainConfig {
            kind: "cargo".to_string(),
            ..Default::default()
        };
        match create_toolchain(&config) {
            Err(PrebuildError::UnsupportedToolchain(kind)) => assert_eq!(kind, "cargo"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }
}
