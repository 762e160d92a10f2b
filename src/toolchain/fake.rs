//! In-memory toolchain for tests
//!
//! Scaffolds a minimal project file, and on build writes a manifest the way
//! the real hook would.

use crate::cache::MANIFEST_SUFFIX;
use crate::error::{PrebuildError, PrebuildResult};
use crate::toolchain::{CommandOutput, ScaffoldRequest, Toolchain};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Something the fake was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Scaffold(String),
    AddPackage {
        name: String,
        version: Option<String>,
        lang_version_present: bool,
    },
    Build,
}

#[derive(Debug, Default)]
pub struct FakeToolchain {
    pub builds: AtomicUsize,
    pub events: Mutex<Vec<FakeEvent>>,
    pub build_delay: Option<Duration>,
    pub fail_build: AtomicBool,
    pub fail_scaffold: bool,
    pub skip_manifest: bool,
    /// Leave a manifest that is already there untouched, mtime included
    pub keep_existing_manifest: bool,
    pub output_type: Option<String>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = Some(delay);
        self
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Most builds ever running at the same time
    pub fn max_concurrent_builds(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: FakeEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn project_file(directory: &Path) -> Option<PathBuf> {
        std::fs::read_dir(directory)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .find(|p| p.extension().is_some_and(|ext| ext == "csproj"))
    }
}

/// Write a minimal project to `directory` as a scaffold would
pub fn write_project(directory: &Path, name: &str) -> PathBuf {
    std::fs::create_dir_all(directory).unwrap();
    let project = directory.join(format!("{}.csproj", name));
    std::fs::write(
        &project,
        "<Project Sdk=\"Microsoft.NET.Sdk\">\n  <PropertyGroup>\n    <OutputType>Exe</OutputType>\n    <TargetFramework>net8.0</TargetFramework>\n  </PropertyGroup>\n</Project>\n",
    )
    .unwrap();
    std::fs::write(directory.join("Program.cs"), "System.Console.WriteLine(1);").unwrap();
    project
}

#[async_trait]
impl Toolchain for FakeToolchain {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn project_extension(&self) -> &'static str {
        "csproj"
    }

    fn configuration(&self) -> &str {
        "Debug"
    }

    fn intermediate_dirs(&self) -> &'static [&'static str] {
        &["obj"]
    }

    async fn scaffold(&self, request: &ScaffoldRequest) -> PrebuildResult<CommandOutput> {
        self.record(FakeEvent::Scaffold(request.template.clone()));
        if self.fail_scaffold {
            return Ok(CommandOutput {
                code: 1,
                stdout: String::new(),
                stderr: format!("No templates found matching: '{}'", request.template),
            });
        }

        write_project(&request.output, &request.project_name);
        Ok(CommandOutput::default())
    }

    async fn add_package(
        &self,
        directory: &Path,
        name: &str,
        version: Option<&str>,
    ) -> PrebuildResult<CommandOutput> {
        let lang_version_present = Self::project_file(directory)
            .and_then(|p| std::fs::read_to_string(p).ok())
            .is_some_and(|text| text.contains("<LangVersion>"));

        self.record(FakeEvent::AddPackage {
            name: name.to_string(),
            version: version.map(str::to_string),
            lang_version_present,
        });
        Ok(CommandOutput::default())
    }

    async fn build(&self, directory: &Path, project_file: &Path) -> PrebuildResult<CommandOutput> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.record(FakeEvent::Build);

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let result = self.run_build(directory, project_file).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl FakeToolchain {
    async fn run_build(
        &self,
        directory: &Path,
        project_file: &Path,
    ) -> PrebuildResult<CommandOutput> {
        if let Some(delay) = self.build_delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_build.load(Ordering::SeqCst) {
            return Ok(CommandOutput {
                code: 1,
                stdout: "Build FAILED.".to_string(),
                stderr: "Program.cs(1,1): error CS1002: ; expected".to_string(),
            });
        }

        if !project_file.exists() {
            return Err(PrebuildError::Internal(format!(
                "{} does not exist",
                project_file.display()
            )));
        }

        let mut path = project_file.as_os_str().to_owned();
        path.push(MANIFEST_SUFFIX);
        let path = PathBuf::from(path);

        if !self.skip_manifest && !(self.keep_existing_manifest && path.exists()) {
            let manifest = format!(
                "ProjectFilePath={}\nLanguageName=C#\nPropertyOutputType={}\nSourceFiles={}\nPreprocessorSymbols=DEBUG;NET\n",
                project_file.display(),
                self.output_type.as_deref().unwrap_or("Exe"),
                directory.join("Program.cs").display(),
            );
            std::fs::write(&path, manifest).unwrap();
        }

        Ok(CommandOutput {
            code: 0,
            stdout: "Build succeeded.".to_string(),
            stderr: String::new(),
        })
    }
}
