//! Error types for prebuild
//!
//! All modules use `PrebuildResult<T>` as their return type.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for prebuild operations
pub type PrebuildResult<T> = Result<T, PrebuildError>;

/// All errors that can occur in prebuild
#[derive(Error, Debug)]
pub enum PrebuildError {
    // Configuration errors
    #[error("Prebuild not found at {} and build-on-demand is disabled: {package}", directory.display())]
    PrebuildNotFound { package: String, directory: PathBuf },

    #[error("Build is disabled for package {package} ({})", directory.display())]
    BuildDisabled { package: String, directory: PathBuf },

    #[error("Unsupported toolchain: {0}")]
    UnsupportedToolchain(String),

    #[error("Invalid configuration at {}: {reason}", path.display())]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {}: {source}", path.display())]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Lock errors
    #[error("Could not acquire lock {} after {attempts} attempts", path.display())]
    LockTimeout { path: PathBuf, attempts: u32 },

    // Package creation errors
    #[error("Failed to scaffold package in {}: {reason}", directory.display())]
    Scaffold { directory: PathBuf, reason: String },

    #[error("No *.{extension} project file found in {}", directory.display())]
    ProjectFileNotFound { directory: PathBuf, extension: String },

    // Build errors
    #[error("Build failed for package {package}, exit code: {code}\n{output}")]
    ExternalBuild {
        package: String,
        code: i32,
        output: String,
    },

    #[error("Build manifest *{suffix} not found in {}", directory.display())]
    ManifestMissing { directory: PathBuf, suffix: &'static str },

    #[error("Workspace cannot be used to generate a compilation: {0}")]
    WorkspaceUnusable(String),

    #[error("Unrecognized output kind in build manifest: {0:?}")]
    UnknownOutputKind(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// An error delivered to every waiter of a coalesced build
    #[error(transparent)]
    Shared(Arc<PrebuildError>),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PrebuildError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// The underlying error, looking through `Shared` wrappers
    pub fn root_cause(&self) -> &PrebuildError {
        match self {
            Self::Shared(inner) => inner.root_cause(),
            other => other,
        }
    }

    /// Whether the error comes from the build-on-demand capability being off
    pub fn is_configuration(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::PrebuildNotFound { .. } | Self::BuildDisabled { .. }
        )
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::LockTimeout { .. } | Self::ManifestMissing { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root_cause() {
            Self::PrebuildNotFound { .. } => Some("Run: prebuild build <name>"),
            Self::BuildDisabled { .. } => Some("Open the package with build-on-demand enabled"),
            Self::LockTimeout { .. } => {
                Some("Another process may be building this package; remove a stale .prebuild.lock if not")
            }
            Self::ExternalBuild { .. } => Some("See .prebuild-builderror in the package directory"),
            Self::UnsupportedToolchain(_) => Some("Supported toolchains: dotnet"),
            _ => None,
        }
    }
}
