//! Package builder
//!
//! Collects package settings and after-create steps, then opens the
//! [`DirectoryWorkspace`] exactly once.

use crate::cache::{BuildCoordinator, LockOptions};
use crate::error::PrebuildResult;
use crate::package::directory::{DirectoryWorkspace, WorkspaceOptions};
use crate::package::initializer::{
    AddPackageReference, AfterCreateAction, SetLanguageVersion, TemplateInitializer,
};
use crate::toolchain::{DotnetToolchain, Toolchain};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Name of the stock console package
pub const CONSOLE_PACKAGE: &str = "console";

/// Deferred configuration for a package
pub struct PackageBuilder {
    name: String,
    template: String,
    language: Option<String>,
    directory: Option<PathBuf>,
    enable_build: bool,
    toolchain: Option<Arc<dyn Toolchain>>,
    coordinator: Arc<BuildCoordinator>,
    debounce: Option<Duration>,
    lock: Option<LockOptions>,
    manifest_wait_attempts: Option<u32>,
    package_references: Vec<AddPackageReference>,
    language_version: Option<String>,
    actions: Vec<Arc<dyn AfterCreateAction>>,
    package: OnceCell<Arc<DirectoryWorkspace>>,
}

impl PackageBuilder {
    /// Packages that should never build the same name at once must share
    /// `coordinator`
    pub fn new(name: impl Into<String>, coordinator: Arc<BuildCoordinator>) -> Self {
        Self {
            name: name.into(),
            template: "console".to_string(),
            language: None,
            directory: None,
            enable_build: false,
            toolchain: None,
            coordinator,
            debounce: None,
            lock: None,
            manifest_wait_attempts: None,
            package_references: Vec::new(),
            language_version: None,
            actions: Vec::new(),
            package: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn use_template(&mut self, template: impl Into<String>) -> &mut Self {
        self.template = template.into();
        self
    }

    pub fn use_language(&mut self, language: impl Into<String>) -> &mut Self {
        self.language = Some(language.into());
        self
    }

    pub fn directory(&mut self, directory: impl Into<PathBuf>) -> &mut Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn enable_build(&mut self, enable: bool) -> &mut Self {
        self.enable_build = enable;
        self
    }

    pub fn toolchain(&mut self, toolchain: Arc<dyn Toolchain>) -> &mut Self {
        self.toolchain = Some(toolchain);
        self
    }

    pub fn debounce(&mut self, window: Duration) -> &mut Self {
        self.debounce = Some(window);
        self
    }

    pub fn lock_options(&mut self, options: LockOptions) -> &mut Self {
        self.lock = Some(options);
        self
    }

    /// Polls made while a freshly written manifest settles
    pub fn manifest_wait_attempts(&mut self, attempts: u32) -> &mut Self {
        self.manifest_wait_attempts = Some(attempts);
        self
    }

    /// Add a package dependency after the directory is scaffolded
    pub fn add_package_reference(
        &mut self,
        name: impl Into<String>,
        version: Option<&str>,
    ) -> &mut Self {
        let reference = AddPackageReference {
            name: name.into(),
            version: version.map(str::to_string),
        };
        self.package_references.push(reference.clone());
        self.actions.push(Arc::new(reference));
        self
    }

    /// Pin the language version after the directory is scaffolded
    pub fn set_language_version(&mut self, version: impl Into<String>) -> &mut Self {
        let version = version.into();
        self.language_version = Some(version.clone());
        self.actions.push(Arc::new(SetLanguageVersion { version }));
        self
    }

    /// Register a custom after-create step
    pub fn after_create(&mut self, action: Arc<dyn AfterCreateAction>) -> &mut Self {
        self.actions.push(action);
        self
    }

    /// Package dependencies added so far, in order
    pub fn package_references(&self) -> &[AddPackageReference] {
        &self.package_references
    }

    /// The language version requested, if any
    pub fn language_version(&self) -> Option<&str> {
        self.language_version.as_deref()
    }

    fn initializer(&self) -> TemplateInitializer {
        let mut initializer = TemplateInitializer::new(self.template.clone(), self.name.clone());
        if let Some(language) = &self.language {
            initializer = initializer.with_language(language.clone());
        }
        self.actions
            .iter()
            .fold(initializer, |init, action| init.with_action(action.clone()))
    }

    fn options(&self) -> WorkspaceOptions {
        let toolchain = self
            .toolchain
            .clone()
            .unwrap_or_else(|| Arc::new(DotnetToolchain::default()));

        let mut options =
            WorkspaceOptions::new(self.name.clone(), toolchain, self.coordinator.clone());
        options.directory = self.directory.clone();
        options.initializer = Some(self.initializer());
        options.enable_build = self.enable_build;
        if let Some(debounce) = self.debounce {
            options.debounce = debounce;
        }
        if let Some(lock) = self.lock {
            options.lock = lock;
        }
        if let Some(attempts) = self.manifest_wait_attempts {
            options.manifest_wait_attempts = attempts;
        }
        options
    }

    /// Open the package; later calls return the same instance
    pub async fn get_package(&self) -> PrebuildResult<Arc<DirectoryWorkspace>> {
        self.package
            .get_or_try_init(|| DirectoryWorkspace::open(self.options()))
            .await
            .cloned()
    }

    /// The stock console package: console template, latest language
    /// version, and a JSON library dependency
    pub fn console_package(coordinator: Arc<BuildCoordinator>, enable_build: bool) -> Self {
        let mut builder = Self::new(CONSOLE_PACKAGE, coordinator);
        builder
            .use_template("console")
            .set_language_version("latest")
            .add_package_reference("Newtonsoft.Json", Some("13.0.1"))
            .enable_build(enable_build);
        builder
    }
}

impl std::fmt::Debug for PackageBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageBuilder")
            .field("name", &self.name)
            .field("template", &self.template)
            .field("enable_build", &self.enable_build)
            .field("package_references", &self.package_references)
            .field("language_version", &self.language_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::fake::{FakeEvent, FakeToolchain};
    use tempfile::TempDir;

    fn builder(root: &TempDir, toolchain: Arc<FakeToolchain>) -> PackageBuilder {
        let mut builder = PackageBuilder::new("library", Arc::new(BuildCoordinator::new()));
        builder
            .directory(root.path().join("library"))
            .toolchain(toolchain)
            .debounce(Duration::from_millis(20))
            .enable_build(true);
        builder
    }

    #[test]
    fn console_preset() {
        let builder = PackageBuilder::console_package(Arc::new(BuildCoordinator::new()), false);
        assert_eq!(builder.name(), "console");
        assert_eq!(builder.language_version(), Some("latest"));
        assert_eq!(
            builder.package_references(),
            &[AddPackageReference {
                name: "Newtonsoft.Json".to_string(),
                version: Some("13.0.1".to_string()),
            }]
        );
        assert_eq!(
            builder.initializer().action_descriptions(),
            vec!["set language version latest", "add package Newtonsoft.Json 13.0.1"]
        );
    }

    #[tokio::test]
    async fn get_package_opens_once() {
        let root = TempDir::new().unwrap();
        let builder = builder(&root, Arc::new(FakeToolchain::new()));

        let first = builder.get_package().await.unwrap();
        let second = builder.get_package().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.directory(), root.path().join("library"));
    }

    #[tokio::test]
    async fn after_create_steps_run_in_registration_order() {
        let root = TempDir::new().unwrap();
        let toolchain = Arc::new(FakeToolchain::new());
        let mut builder = builder(&root, toolchain.clone());
        builder
            .use_template("classlib")
            .add_package_reference("Humanizer", None)
            .set_language_version("12");

        let package = builder.get_package().await.unwrap();
        package.get_or_create_workspace().await.unwrap();

        assert_eq!(
            toolchain.events(),
            vec![
                FakeEvent::Scaffold("classlib".to_string()),
                FakeEvent::AddPackage {
                    name: "Humanizer".to_string(),
                    version: None,
                    lang_version_present: false,
                },
                FakeEvent::Build,
            ]
        );
        let project = std::fs::read_to_string(root.path().join("library/library.csproj")).unwrap();
        assert!(project.contains("<LangVersion>12</LangVersion>"));
    }

    #[tokio::test]
    async fn shared_coordinator_serializes_same_name() {
        let root = TempDir::new().unwrap();
        let coordinator = Arc::new(BuildCoordinator::new());
        let toolchain = Arc::new(FakeToolchain::new().with_build_delay(Duration::from_millis(50)));

        let mut a = PackageBuilder::new("library", coordinator.clone());
        a.directory(root.path().join("library"))
            .toolchain(toolchain.clone())
            .enable_build(true);
        let mut b = PackageBuilder::new("library", coordinator.clone());
        b.directory(root.path().join("other"))
            .toolchain(toolchain.clone())
            .enable_build(true);

        let a = a.get_package().await.unwrap();
        let b = b.get_package().await.unwrap();
        let (ra, rb) = tokio::join!(a.build(), b.build());
        ra.unwrap();
        rb.unwrap();

        assert_eq!(coordinator.len(), 1);
        assert!(!coordinator.is_busy("library"));
        assert_eq!(toolchain.builds(), 2);
        assert_eq!(toolchain.max_concurrent_builds(), 1);
    }

    #[tokio::test]
    async fn separate_coordinators_build_same_name_concurrently() {
        let root = TempDir::new().unwrap();
        let toolchain = Arc::new(FakeToolchain::new().with_build_delay(Duration::from_millis(100)));

        let mut a = PackageBuilder::new("library", Arc::new(BuildCoordinator::new()));
        a.directory(root.path().join("library"))
            .toolchain(toolchain.clone())
            .enable_build(true);
        let mut b = PackageBuilder::new("library", Arc::new(BuildCoordinator::new()));
        b.directory(root.path().join("other"))
            .toolchain(toolchain.clone())
            .enable_build(true);

        let a = a.get_package().await.unwrap();
        let b = b.get_package().await.unwrap();
        let (ra, rb) = tokio::join!(a.build(), b.build());
        ra.unwrap();
        rb.unwrap();

        assert_eq!(toolchain.builds(), 2);
        assert_eq!(toolchain.max_concurrent_builds(), 2);
    }
}
