//! dotnet CLI toolchain
//!
//! Drives `dotnet new`, `dotnet add package` and `dotnet build`. For builds
//! a `Directory.Build.targets` hook is dropped next to the project so the
//! build writes the `*.prebuild.manifest` this crate caches.

use crate::cache::MANIFEST_SUFFIX;
use crate::error::{PrebuildError, PrebuildResult};
use crate::toolchain::{stream_child_output, CommandOutput, ScaffoldRequest, Toolchain};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// File name MSBuild picks up automatically from the project directory
pub const BUILD_HOOK_FILE_NAME: &str = "Directory.Build.targets";

/// Toolchain backed by the `dotnet` CLI
#[derive(Debug, Clone)]
pub struct DotnetToolchain {
    program: String,
    configuration: String,
}

impl DotnetToolchain {
    /// Create a toolchain invoking `program` with the given build configuration
    pub fn new(program: impl Into<String>, configuration: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            configuration: configuration.into(),
        }
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }

    /// Execute a dotnet command and capture its output
    async fn exec(&self, args: &[&str], cwd: Option<&Path>) -> PrebuildResult<CommandOutput> {
        debug!("Executing: {}", self.describe(args));

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let output = command
            .output()
            .await
            .map_err(|e| PrebuildError::command_failed(self.describe(args), e))?;

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Execute a dotnet command, streaming each output line to the log
    async fn exec_streaming(&self, args: &[&str], cwd: &Path) -> PrebuildResult<CommandOutput> {
        debug!("Executing (streaming): {}", self.describe(args));

        let mut child = Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PrebuildError::command_failed(self.describe(args), e))?;

        let (stdout, stderr) =
            stream_child_output(&mut child, &|line| debug!(target: "prebuild::build", "{}", line))
                .await;

        let status = child
            .wait()
            .await
            .map_err(|e| PrebuildError::command_failed(self.describe(args), e))?;

        Ok(CommandOutput {
            code: status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }
}

impl Default for DotnetToolchain {
    fn default() -> Self {
        Self::new("dotnet", "Debug")
    }
}

#[async_trait]
impl Toolchain for DotnetToolchain {
    fn name(&self) -> &'static str {
        "dotnet"
    }

    fn project_extension(&self) -> &'static str {
        "csproj"
    }

    fn configuration(&self) -> &str {
        &self.configuration
    }

    fn intermediate_dirs(&self) -> &'static [&'static str] {
        &["obj"]
    }

    async fn scaffold(&self, request: &ScaffoldRequest) -> PrebuildResult<CommandOutput> {
        info!(
            "Creating {} from template {}",
            request.output.display(),
            request.template
        );

        let output = request.output.to_string_lossy();
        let mut args = vec![
            "new",
            request.template.as_str(),
            "--name",
            request.project_name.as_str(),
            "--output",
            output.as_ref(),
        ];
        if let Some(language) = &request.language {
            args.push("--language");
            args.push(language.as_str());
        }

        self.exec(&args, Some(request.output.as_path())).await
    }

    async fn add_package(
        &self,
        directory: &Path,
        name: &str,
        version: Option<&str>,
    ) -> PrebuildResult<CommandOutput> {
        info!("Adding package {} to {}", name, directory.display());

        let mut args = vec!["add", "package", name];
        if let Some(version) = version {
            args.push("--version");
            args.push(version);
        }

        self.exec(&args, Some(directory)).await
    }

    async fn build(&self, directory: &Path, project_file: &Path) -> PrebuildResult<CommandOutput> {
        let hook = directory.join(BUILD_HOOK_FILE_NAME);
        tokio::fs::write(&hook, build_hook()).await.map_err(|e| {
            PrebuildError::io(format!("writing build hook {}", hook.display()), e)
        })?;

        let project = project_file.to_string_lossy();
        let args = [
            "build",
            project.as_ref(),
            "-c",
            self.configuration.as_str(),
        ];
        let result = self.exec_streaming(&args, directory).await;

        if let Err(e) = tokio::fs::remove_file(&hook).await {
            warn!("Failed to remove build hook {}: {}", hook.display(), e);
        }

        result
    }
}

/// MSBuild targets that emit the build manifest after `Build`
fn build_hook() -> String {
    format!(
        r#"<Project>
  <Target Name="PrebuildWriteManifest" AfterTargets="Build">
    <ItemGroup>
      <PrebuildSymbol Include="$(DefineConstants.Split(';'))" />
      <PrebuildLine Include="ProjectGuid=$(ProjectGuid)" />
      <PrebuildLine Include="ProjectFilePath=$(MSBuildProjectFullPath)" />
      <PrebuildLine Include="LanguageName=C#" />
      <PrebuildLine Include="PropertyTargetPath=$(TargetPath)" />
      <PrebuildLine Include="PropertyLangVersion=$(LangVersion)" />
      <PrebuildLine Include="PropertyOutputType=$(OutputType)" />
      <PrebuildLine Include="@(ProjectReference->'ProjectReferences=%(FullPath)')" />
      <PrebuildLine Include="@(Compile->'SourceFiles=%(FullPath)')" Condition="!$([System.String]::new('%(Compile.Identity)').Contains('obj$([System.IO.Path]::DirectorySeparatorChar)'))" />
      <PrebuildLine Include="@(ReferencePath->'References=%(Identity)')" />
      <PrebuildLine Include="@(Analyzer->'AnalyzerReferences=%(Identity)')" />
      <PrebuildLine Include="@(PrebuildSymbol->'PreprocessorSymbols=%(Identity)')" />
    </ItemGroup>
    <WriteLinesToFile Lines="@(PrebuildLine)"
                      File="$(MSBuildProjectFullPath){suffix}"
                      Overwrite="True" />
  </Target>
</Project>
"#,
        suffix = MANIFEST_SUFFIX
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::manifest::keys;

    #[test]
    fn hook_emits_every_manifest_key() {
        let hook = build_hook();
        for key in [
            keys::PROJECT_GUID,
            keys::PROJECT_FILE_PATH,
            keys::LANGUAGE_NAME,
            keys::TARGET_PATH,
            keys::LANG_VERSION,
            keys::OUTPUT_TYPE,
            keys::PROJECT_REFERENCES,
            keys::SOURCE_FILES,
            keys::REFERENCES,
            keys::ANALYZER_REFERENCES,
            keys::PREPROCESSOR_SYMBOLS,
        ] {
            assert!(hook.contains(&format!("{}=", key)), "missing {}", key);
        }
        assert!(hook.contains("$(MSBuildProjectFullPath).prebuild.manifest"));
        // Every build has to move the manifest mtime past the project file.
        assert!(!hook.contains("WriteOnlyWhenDifferent"));
    }

    #[test]
    fn defaults() {
        let toolchain = DotnetToolchain::default();
        assert_eq!(toolchain.name(), "dotnet");
        assert_eq!(toolchain.project_extension(), "csproj");
        assert_eq!(toolchain.configuration(), "Debug");
        assert_eq!(toolchain.intermediate_dirs(), &["obj"]);
    }

    #[tokio::test]
    async fn missing_program_is_a_command_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let toolchain = DotnetToolchain::new("prebuild-no-such-dotnet", "Debug");

        let err = toolchain
            .add_package(dir.path(), "Newtonsoft.Json", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PrebuildError::CommandFailed { .. }));

        let err = toolchain
            .build(dir.path(), &dir.path().join("console.csproj"))
            .await
            .unwrap_err();
        assert!(matches!(err, PrebuildError::CommandFailed { .. }));
        assert!(!dir.path().join(BUILD_HOOK_FILE_NAME).exists());
    }
}
