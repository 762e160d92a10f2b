//! Directory-backed package workspace
//!
//! A [`DirectoryWorkspace`] owns one package directory. It creates the
//! directory from a template when empty, builds it with the external
//! toolchain, and exposes the resulting [`CompilationWorkspace`].
//!
//! # Concurrency
//!
//! - Requests through [`DirectoryWorkspace::get_or_create_workspace`] are
//!   debounced by a background task and answered through one shared
//!   completion per round.
//! - [`DirectoryWorkspace::build`] is single-flight: overlapping calls wait
//!   for the running build instead of starting another.
//! - Builds of the same package name are serialized by the
//!   [`BuildCoordinator`], and every disk step runs under the directory's
//!   [`FileLock`].

use crate::cache::manifest::{is_fresh, touch, wait_for_file_available};
use crate::cache::{
    find_manifest, is_lock_file, BuildCoordinator, FileLock, LockOptions, ProjectDescription,
    MANIFEST_SUFFIX,
};
use crate::config::ConfigManager;
use crate::error::{PrebuildError, PrebuildResult};
use crate::package::completion::{BuildOutcome, CompletionSource};
use crate::package::initializer::TemplateInitializer;
use crate::package::project_file;
use crate::toolchain::Toolchain;
use crate::workspace::CompilationWorkspace;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, OnceCell};
use tracing::{debug, info, warn};

/// Sentinel holding the output of the last failed build
pub const BUILD_ERROR_LOG_NAME: &str = ".prebuild-builderror";

/// Default window in which build requests are merged
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Default polls while waiting for a manifest to settle
pub const DEFAULT_MANIFEST_WAIT_ATTEMPTS: u32 = 50;

const MANIFEST_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle of a package directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceState {
    Uninitialized,
    Creating,
    NeedsBuild,
    Building,
    Cached,
    Failed,
}

impl fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Creating => "creating",
            Self::NeedsBuild => "needs build",
            Self::Building => "building",
            Self::Cached => "cached",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Where the current workspace came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildRecord {
    pub built_at: DateTime<Utc>,
    pub manifest: PathBuf,
    pub from_cache: bool,
}

#[derive(Debug)]
struct CachedBuild {
    description: ProjectDescription,
    workspace: Arc<CompilationWorkspace>,
    record: BuildRecord,
}

#[derive(Debug)]
struct ProjectInfo {
    target_framework: Option<String>,
    assembly_name: String,
}

/// Settings for [`DirectoryWorkspace::open`]
#[derive(Clone)]
pub struct WorkspaceOptions {
    pub name: String,
    /// Package directory; defaults to `<root>/<name>`
    pub directory: Option<PathBuf>,
    /// Scaffolding for an empty directory; defaults to the `console` template
    pub initializer: Option<TemplateInitializer>,
    pub enable_build: bool,
    pub toolchain: Arc<dyn Toolchain>,
    pub coordinator: Arc<BuildCoordinator>,
    pub debounce: Duration,
    pub lock: LockOptions,
    pub manifest_wait_attempts: u32,
}

impl WorkspaceOptions {
    /// Options for `name`; entities sharing `coordinator` never build the
    /// same name at the same time
    pub fn new(
        name: impl Into<String>,
        toolchain: Arc<dyn Toolchain>,
        coordinator: Arc<BuildCoordinator>,
    ) -> Self {
        Self {
            name: name.into(),
            directory: None,
            initializer: None,
            enable_build: false,
            toolchain,
            coordinator,
            debounce: DEFAULT_DEBOUNCE,
            lock: LockOptions::default(),
            manifest_wait_attempts: DEFAULT_MANIFEST_WAIT_ATTEMPTS,
        }
    }
}

impl fmt::Debug for WorkspaceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceOptions")
            .field("name", &self.name)
            .field("directory", &self.directory)
            .field("enable_build", &self.enable_build)
            .field("toolchain", &self.toolchain.name())
            .field("debounce", &self.debounce)
            .finish()
    }
}

/// Resets the in-flight build counter when the winning build ends
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

/// A package directory and its cached build
pub struct DirectoryWorkspace {
    name: String,
    directory: PathBuf,
    enable_build: bool,
    initializer: TemplateInitializer,
    toolchain: Arc<dyn Toolchain>,
    coordinator: Arc<BuildCoordinator>,
    lock_options: LockOptions,
    manifest_wait_attempts: u32,
    requests: mpsc::UnboundedSender<()>,
    created: OnceCell<()>,
    build_count: AtomicUsize,
    cached: RwLock<Option<CachedBuild>>,
    phase: Mutex<WorkspaceState>,
    last_error: Mutex<Option<Arc<PrebuildError>>>,
    completion: Mutex<CompletionSource>,
    project_info: OnceCell<ProjectInfo>,
}

impl DirectoryWorkspace {
    /// Open the package described by `options`
    ///
    /// Loads a fresh manifest if the directory has one. Without one, the
    /// package can only be opened with build enabled.
    pub async fn open(options: WorkspaceOptions) -> PrebuildResult<Arc<Self>> {
        let directory = match options.directory {
            Some(directory) => directory,
            None => ConfigManager::ensure_default_root(options.enable_build)
                .await?
                .join(&options.name),
        };
        let initializer = options
            .initializer
            .unwrap_or_else(|| TemplateInitializer::new("console", options.name.clone()));

        let (requests, receiver) = mpsc::unbounded_channel();
        let entity = Arc::new(Self {
            name: options.name,
            directory,
            enable_build: options.enable_build,
            initializer,
            toolchain: options.toolchain,
            coordinator: options.coordinator,
            lock_options: options.lock,
            manifest_wait_attempts: options.manifest_wait_attempts,
            requests,
            created: OnceCell::new(),
            build_count: AtomicUsize::new(0),
            cached: RwLock::new(None),
            phase: Mutex::new(WorkspaceState::Uninitialized),
            last_error: Mutex::new(None),
            completion: Mutex::new(CompletionSource::new()),
            project_info: OnceCell::new(),
        });

        if !entity.load_from_cache().await? {
            if !entity.enable_build {
                return Err(PrebuildError::PrebuildNotFound {
                    package: entity.name.clone(),
                    directory: entity.directory.clone(),
                });
            }
            if entity.has_content()? {
                entity.set_phase(WorkspaceState::NeedsBuild);
            }
        }

        tokio::spawn(Self::process_requests(
            Arc::downgrade(&entity),
            receiver,
            options.debounce,
        ));

        Ok(entity)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn enable_build(&self) -> bool {
        self.enable_build
    }

    pub fn state(&self) -> WorkspaceState {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, state: WorkspaceState) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Path of the failed-build log sentinel
    pub fn error_log_path(&self) -> PathBuf {
        self.directory.join(BUILD_ERROR_LOG_NAME)
    }

    /// Whether a workspace is currently cached
    pub fn is_cached(&self) -> bool {
        self.read_cached(|c| c.is_some())
    }

    /// Metadata of the cached build
    pub fn description(&self) -> Option<ProjectDescription> {
        self.read_cached(|c| c.map(|c| c.description.clone()))
    }

    /// When and how the cached workspace was produced
    pub fn last_build(&self) -> Option<BuildRecord> {
        self.read_cached(|c| c.map(|c| c.record.clone()))
    }

    /// The cached workspace, without triggering a build
    pub fn workspace(&self) -> Option<Arc<CompilationWorkspace>> {
        self.read_cached(|c| c.map(|c| c.workspace.clone()))
    }

    /// The error that ended the last failed build
    pub fn last_error(&self) -> Option<Arc<PrebuildError>> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn read_cached<T>(&self, read: impl FnOnce(Option<&CachedBuild>) -> T) -> T {
        let cached = self.cached.read().unwrap_or_else(PoisonError::into_inner);
        read(cached.as_ref())
    }

    fn adopt(
        &self,
        description: ProjectDescription,
        workspace: CompilationWorkspace,
        manifest: PathBuf,
        from_cache: bool,
    ) {
        let record = BuildRecord {
            built_at: Utc::now(),
            manifest,
            from_cache,
        };
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(CachedBuild {
            description,
            workspace: Arc::new(workspace),
            record,
        });
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.set_phase(WorkspaceState::Cached);
    }

    fn invalidate(&self, error: &Arc<PrebuildError>) {
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error.clone());
        self.set_phase(WorkspaceState::Failed);
    }

    /// Whether the directory holds anything besides lock sentinels
    fn has_content(&self) -> PrebuildResult<bool> {
        has_content(&self.directory).map_err(|e| {
            PrebuildError::io(format!("reading directory {}", self.directory.display()), e)
        })
    }

    fn project_file(&self) -> PrebuildResult<Option<PathBuf>> {
        project_file::find_project_file(&self.directory, self.toolchain.project_extension())
    }

    /// Adopt a fresh on-disk manifest, if there is one
    async fn load_from_cache(&self) -> PrebuildResult<bool> {
        let Some(manifest) = find_manifest(&self.directory)? else {
            return Ok(false);
        };

        if !is_fresh(&manifest, self.project_file()?.as_deref()) {
            info!("Cached build of {} is stale", self.name);
            return Ok(false);
        }

        let _lock = FileLock::try_create(&self.directory, &self.lock_options).await?;
        let loaded = async {
            let description = ProjectDescription::from_file(&manifest).await?;
            let workspace = CompilationWorkspace::from_description(&description).await?;
            workspace.check_usable()?;
            Ok::<_, PrebuildError>((description, workspace))
        }
        .await;

        match loaded {
            Ok((description, workspace)) => {
                debug!("Loaded {} from {}", self.name, manifest.display());
                self.adopt(description, workspace, manifest, true);
                Ok(true)
            }
            // Without build-on-demand nothing could replace it, so report why.
            Err(e) if !self.enable_build => Err(e),
            Err(e) => {
                warn!("Ignoring cached build of {}: {}", self.name, e);
                Ok(false)
            }
        }
    }

    /// The workspace, building on demand
    ///
    /// Concurrent callers within one debounce window share a single build
    /// and receive the same result.
    pub async fn get_or_create_workspace(&self) -> PrebuildResult<Arc<CompilationWorkspace>> {
        if let Some(workspace) = self.workspace() {
            return Ok(workspace);
        }

        let pending = {
            let mut completion = self
                .completion
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if completion.is_settled() {
                *completion = CompletionSource::new();
            }
            completion.future()
        };

        self.requests
            .send(())
            .map_err(|_| PrebuildError::Internal("build request task stopped".to_string()))?;

        pending.await.map_err(PrebuildError::Shared)
    }

    async fn process_requests(
        entity: Weak<Self>,
        mut receiver: mpsc::UnboundedReceiver<()>,
        window: Duration,
    ) {
        while receiver.recv().await.is_some() {
            // The window restarts on every request.
            loop {
                match tokio::time::timeout(window, receiver.recv()).await {
                    Ok(Some(())) => continue,
                    Ok(None) => return,
                    Err(_) => break,
                }
            }

            let Some(entity) = entity.upgrade() else {
                return;
            };
            let outcome = entity.process_build_request().await;
            entity
                .completion
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .set_result(outcome);
        }
        debug!("Build request channel closed");
    }

    async fn process_build_request(&self) -> BuildOutcome {
        let result = async {
            self.ensure_ready().await?;
            self.workspace().ok_or_else(|| {
                PrebuildError::Internal(format!("build of {} produced no workspace", self.name))
            })
        }
        .await;

        result.map_err(|e| match e {
            PrebuildError::Shared(inner) => inner,
            other => Arc::new(other),
        })
    }

    /// Create and build the package unless a workspace is already cached
    pub async fn ensure_ready(&self) -> PrebuildResult<()> {
        if self.is_cached() {
            debug!("Build of {} already loaded", self.name);
            return Ok(());
        }

        self.ensure_created().await?;
        self.ensure_built().await
    }

    async fn ensure_built(&self) -> PrebuildResult<()> {
        if self.is_cached() {
            return Ok(());
        }
        self.build().await
    }

    /// Scaffold the directory on first use
    async fn ensure_created(&self) -> PrebuildResult<()> {
        if !self.enable_build {
            return Ok(());
        }

        self.created
            .get_or_try_init(|| async {
                self.set_phase(WorkspaceState::Creating);
                let result = self.create().await;
                self.set_phase(match result {
                    Ok(()) => WorkspaceState::NeedsBuild,
                    Err(_) => WorkspaceState::Failed,
                });
                result
            })
            .await
            .map(|_| ())
    }

    async fn create(&self) -> PrebuildResult<()> {
        if !self.directory.exists() {
            info!("Creating directory {}", self.directory.display());
            tokio::fs::create_dir_all(&self.directory)
                .await
                .map_err(|e| {
                    PrebuildError::io(format!("creating directory {}", self.directory.display()), e)
                })?;
        }

        let _lock = FileLock::try_create(&self.directory, &self.lock_options).await?;
        if self.has_content()? {
            debug!("{} already initialized", self.directory.display());
            return Ok(());
        }

        info!(
            "Initializing {} with {:?} in {}",
            self.name,
            self.initializer,
            self.directory.display()
        );
        self.initializer
            .initialize(&self.directory, self.toolchain.as_ref())
            .await
    }

    /// Run the external build and adopt its manifest
    ///
    /// Requires build-on-demand. When a build is already in flight this
    /// waits for it and returns its outcome instead of building again.
    pub async fn build(&self) -> PrebuildResult<()> {
        if !self.enable_build {
            return Err(PrebuildError::BuildDisabled {
                package: self.name.clone(),
                directory: self.directory.clone(),
            });
        }

        self.ensure_created().await?;

        if self.build_count.fetch_add(1, Ordering::SeqCst) + 1 > 1 {
            info!("Build of {} already in progress, waiting", self.name);
            return self.wait_for_build_in_flight().await;
        }

        let _in_flight = InFlight(&self.build_count);
        self.run_build().await.map_err(|e| {
            let shared = Arc::new(e);
            self.invalidate(&shared);
            PrebuildError::Shared(shared)
        })
    }

    async fn wait_for_build_in_flight(&self) -> PrebuildResult<()> {
        loop {
            drop(self.coordinator.admit(&self.name).await?);
            if self.build_count.load(Ordering::SeqCst) == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }

        match self.last_error() {
            Some(error) if !self.is_cached() => Err(PrebuildError::Shared(error)),
            _ => Ok(()),
        }
    }

    async fn run_build(&self) -> PrebuildResult<()> {
        let _admission = self.coordinator.admit(&self.name).await?;
        self.set_phase(WorkspaceState::Building);
        info!("Building {}", self.name);

        let project = project_file::require_project_file(
            &self.directory,
            self.toolchain.project_extension(),
        )?;

        {
            let _lock = FileLock::try_create(&self.directory, &self.lock_options).await?;
            self.clean_intermediate_dirs().await?;

            let output = self.toolchain.build(&self.directory, &project).await?;
            let log = self.error_log_path();
            if !output.success() {
                let text = if output.stderr.trim().is_empty() {
                    output.error_tail()
                } else {
                    output.stderr.clone()
                };
                tokio::fs::write(&log, text).await.map_err(|e| {
                    PrebuildError::io(format!("writing {}", log.display()), e)
                })?;

                return Err(PrebuildError::ExternalBuild {
                    package: self.name.clone(),
                    code: output.code,
                    output: output.error_tail(),
                });
            }

            if log.exists() {
                tokio::fs::remove_file(&log).await.map_err(|e| {
                    PrebuildError::io(format!("removing {}", log.display()), e)
                })?;
            }
        }

        let manifest =
            find_manifest(&self.directory)?.ok_or_else(|| PrebuildError::ManifestMissing {
                directory: self.directory.clone(),
                suffix: MANIFEST_SUFFIX,
            })?;
        wait_for_file_available(&manifest, self.manifest_wait_attempts, MANIFEST_POLL_INTERVAL)
            .await?;
        // An unchanged manifest may be left with its old mtime.
        touch(&manifest)?;

        let (description, workspace) = {
            let _lock = FileLock::try_create(&self.directory, &self.lock_options).await?;
            let description = ProjectDescription::from_file(&manifest).await?;
            let workspace = CompilationWorkspace::from_description(&description).await?;
            (description, workspace)
        };
        workspace.check_usable()?;

        info!("Built {}", self.name);
        self.adopt(description, workspace, manifest, false);
        Ok(())
    }

    async fn clean_intermediate_dirs(&self) -> PrebuildResult<()> {
        for name in self.toolchain.intermediate_dirs() {
            let path = self.directory.join(name);
            if path.is_dir() {
                debug!("Removing {}", path.display());
                tokio::fs::remove_dir_all(&path).await.map_err(|e| {
                    PrebuildError::io(format!("removing {}", path.display()), e)
                })?;
            }
        }
        Ok(())
    }

    async fn project_info(&self) -> PrebuildResult<&ProjectInfo> {
        self.project_info
            .get_or_try_init(|| async {
                let project = project_file::require_project_file(
                    &self.directory,
                    self.toolchain.project_extension(),
                )?;
                let text = tokio::fs::read_to_string(&project).await.map_err(|e| {
                    PrebuildError::io(format!("reading project file {}", project.display()), e)
                })?;

                Ok(ProjectInfo {
                    target_framework: project_file::target_framework(&text),
                    assembly_name: project_file::assembly_name(&text, &project),
                })
            })
            .await
    }

    /// Target framework of the tracked project file
    pub async fn target_framework(&self) -> PrebuildResult<Option<String>> {
        Ok(self.project_info().await?.target_framework.clone())
    }

    /// Path of the compiled entry point assembly
    pub async fn entry_point_path(&self) -> PrebuildResult<Option<PathBuf>> {
        let info = self.project_info().await?;
        Ok(info.target_framework.as_deref().map(|tfm| {
            project_file::entry_point_path(
                &self.directory,
                self.toolchain.configuration(),
                tfm,
                &info.assembly_name,
            )
        }))
    }
}

impl fmt::Display for DirectoryWorkspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.directory.display())
    }
}

impl fmt::Debug for DirectoryWorkspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryWorkspace")
            .field("name", &self.name)
            .field("directory", &self.directory)
            .field("enable_build", &self.enable_build)
            .field("state", &self.state())
            .finish()
    }
}

fn has_content(directory: &Path) -> std::io::Result<bool> {
    if !directory.is_dir() {
        return Ok(false);
    }

    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_dir() {
            if has_content(&path)? {
                return Ok(true);
            }
        } else if !is_lock_file(&path) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Read-only snapshot of a package directory
#[derive(Debug, Clone, Serialize)]
pub struct PackageStatus {
    pub name: String,
    pub directory: PathBuf,
    pub exists: bool,
    pub project_file: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub fresh: bool,
    pub locked: bool,
    pub last_error: Option<String>,
}

impl PackageStatus {
    /// Inspect `directory` without locking, scaffolding or building
    pub fn inspect(name: &str, directory: &Path, extension: &str) -> PrebuildResult<Self> {
        let project_file = project_file::find_project_file(directory, extension)?;
        let manifest = find_manifest(directory)?;
        let fresh = manifest
            .as_deref()
            .is_some_and(|m| is_fresh(m, project_file.as_deref()));
        let last_error = std::fs::read_to_string(directory.join(BUILD_ERROR_LOG_NAME)).ok();

        Ok(Self {
            name: name.to_string(),
            directory: directory.to_path_buf(),
            exists: directory.is_dir(),
            project_file,
            manifest,
            fresh,
            locked: directory.join(crate::cache::LOCK_FILE_NAME).exists(),
            last_error,
        })
    }

    /// The state a workspace opened on this directory would start in
    pub fn state(&self) -> WorkspaceState {
        match (self.exists, self.fresh) {
            (_, true) => WorkspaceState::Cached,
            (true, false) if self.last_error.is_some() => WorkspaceState::Failed,
            (true, false) if self.project_file.is_some() => WorkspaceState::NeedsBuild,
            _ => WorkspaceState::Uninitialized,
        }
    }
}
