//! Prebuild - cached builds of scaffolded project packages
//!
//! A package is a named directory scaffolded from a template and built once
//! by an external toolchain. The build leaves a manifest behind; later runs
//! trust it until the project file changes and rebuild otherwise, merging
//! concurrent requests into a single build.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod package;
pub mod toolchain;
pub mod ui;
pub mod workspace;

pub use error::{PrebuildError, PrebuildResult};
