//! Scaffolded packages
//!
//! A package is a named directory that is created from a template, built
//! by the external toolchain, and read back as a compilation workspace.

pub mod builder;
pub mod completion;
pub mod directory;
pub mod initializer;
pub mod project_file;

pub use builder::{PackageBuilder, CONSOLE_PACKAGE};
pub use directory::{
    BuildRecord, DirectoryWorkspace, PackageStatus, WorkspaceOptions, WorkspaceState,
    BUILD_ERROR_LOG_NAME,
};
pub use initializer::{
    AddPackageReference, AfterCreateAction, FnAction, SetLanguageVersion, TemplateInitializer,
};
