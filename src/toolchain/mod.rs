//! External scaffolding and build tool
//!
//! Package directories are created and compiled by an external program.
//! The [`Toolchain`] trait is the seam: the package layer only ever talks
//! to a `dyn Toolchain`, and the concrete adapter is picked from config.

mod dotnet;
mod factory;
#[cfg(test)]
pub(crate) mod fake;

pub use dotnet::DotnetToolchain;
pub use factory::create_toolchain;

use crate::error::PrebuildResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Max number of output lines kept in build error messages.
const BUILD_ERROR_TAIL_LINES: usize = 50;

/// Captured result of one external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status zero
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Tail of the combined output, for error messages
    pub fn error_tail(&self) -> String {
        build_error_output(&self.stdout, &self.stderr)
    }
}

/// Arguments for scaffolding a new package directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldRequest {
    pub template: String,
    pub project_name: String,
    pub language: Option<String>,
    pub output: PathBuf,
}

/// Abstract external tool interface
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Human-readable tool name
    fn name(&self) -> &'static str;

    /// File extension of the project file this tool tracks, without the dot
    fn project_extension(&self) -> &'static str;

    /// Build configuration name used in output paths
    fn configuration(&self) -> &str;

    /// Intermediate output directories removed before each build
    fn intermediate_dirs(&self) -> &'static [&'static str];

    /// Create a new project from a template
    async fn scaffold(&self, request: &ScaffoldRequest) -> PrebuildResult<CommandOutput>;

    /// Add a package dependency to the project in `directory`
    async fn add_package(
        &self,
        directory: &Path,
        name: &str,
        version: Option<&str>,
    ) -> PrebuildResult<CommandOutput>;

    /// Build `project_file`, leaving a build manifest next to it on success
    async fn build(&self, directory: &Path, project_file: &Path) -> PrebuildResult<CommandOutput>;
}

/// Extract the useful tail of build output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `BUILD_ERROR_TAIL_LINES`
/// lines.
pub(crate) fn build_error_output(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let skip = lines.len().saturating_sub(BUILD_ERROR_TAIL_LINES);
    lines[skip..].join("\n")
}

/// Drain stdout and stderr of a child, calling `on_output` for each line.
///
/// Returns the collected `(stdout, stderr)` text. A child spawned without
/// both pipes yields empty output.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(&str) + Send + Sync),
) -> (String, String) {
    let (Some(out), Some(err)) = (child.stdout.take(), child.stderr.take()) else {
        return (String::new(), String::new());
    };

    let mut stdout_reader = BufReader::new(out).lines();
    let mut stderr_reader = BufReader::new(err).lines();

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut stdout_done = false;
    let mut stderr_done = false;

    while !stdout_done || !stderr_done {
        tokio::select! {
            line = stdout_reader.next_line(), if !stdout_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(&line);
                        stdout.push(line);
                    }
                    _ => stdout_done = true,
                }
            }
            line = stderr_reader.next_line(), if !stderr_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(&line);
                        stderr.push(line);
                    }
                    _ => stderr_done = true,
                }
            }
        }
    }

    (stdout.join("\n"), stderr.join("\n"))
}
