//! Template initializer
//!
//! Scaffolds an empty package directory from a named template, then runs
//! the registered after-create actions in order.

use crate::error::{PrebuildError, PrebuildResult};
use crate::package::project_file;
use crate::toolchain::{ScaffoldRequest, Toolchain};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Step run against a freshly scaffolded directory
#[async_trait]
pub trait AfterCreateAction: Send + Sync {
    /// Short description for logs
    fn describe(&self) -> String;

    /// Apply the step to `directory`
    async fn apply(&self, directory: &Path, toolchain: &dyn Toolchain) -> PrebuildResult<()>;
}

/// Add a package dependency through the toolchain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPackageReference {
    pub name: String,
    pub version: Option<String>,
}

#[async_trait]
impl AfterCreateAction for AddPackageReference {
    fn describe(&self) -> String {
        match &self.version {
            Some(version) => format!("add package {} {}", self.name, version),
            None => format!("add package {}", self.name),
        }
    }

    async fn apply(&self, directory: &Path, toolchain: &dyn Toolchain) -> PrebuildResult<()> {
        let output = toolchain
            .add_package(directory, &self.name, self.version.as_deref())
            .await?;

        if !output.success() {
            return Err(PrebuildError::Scaffold {
                directory: directory.to_path_buf(),
                reason: format!("{} failed: {}", self.describe(), output.error_tail()),
            });
        }
        Ok(())
    }
}

/// Pin the project's language version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetLanguageVersion {
    pub version: String,
}

#[async_trait]
impl AfterCreateAction for SetLanguageVersion {
    fn describe(&self) -> String {
        format!("set language version {}", self.version)
    }

    async fn apply(&self, directory: &Path, toolchain: &dyn Toolchain) -> PrebuildResult<()> {
        let project = project_file::require_project_file(directory, toolchain.project_extension())?;
        project_file::set_language_version(&project, &self.version).await
    }
}

type ActionFn =
    dyn for<'a> Fn(&'a Path, &'a dyn Toolchain) -> BoxFuture<'a, PrebuildResult<()>> + Send + Sync;

/// Closure-backed action
pub struct FnAction {
    label: String,
    action: Box<ActionFn>,
}

impl FnAction {
    pub fn new<F>(label: impl Into<String>, action: F) -> Self
    where
        F: for<'a> Fn(&'a Path, &'a dyn Toolchain) -> BoxFuture<'a, PrebuildResult<()>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            label: label.into(),
            action: Box::new(action),
        }
    }
}

impl fmt::Debug for FnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction").field("label", &self.label).finish()
    }
}

#[async_trait]
impl AfterCreateAction for FnAction {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn apply(&self, directory: &Path, toolchain: &dyn Toolchain) -> PrebuildResult<()> {
        (self.action)(directory, toolchain).await
    }
}

/// Scaffolds a package directory from a template
#[derive(Clone)]
pub struct TemplateInitializer {
    pub template: String,
    pub project_name: String,
    pub language: Option<String>,
    actions: Vec<Arc<dyn AfterCreateAction>>,
}

impl TemplateInitializer {
    /// Initializer for `template`, naming the project `project_name`
    pub fn new(template: impl Into<String>, project_name: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            project_name: project_name.into(),
            language: None,
            actions: Vec::new(),
        }
    }

    /// Pass an explicit language to the template
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Append an after-create action
    pub fn with_action(mut self, action: Arc<dyn AfterCreateAction>) -> Self {
        self.actions.push(action);
        self
    }

    /// Descriptions of the registered actions, in run order
    pub fn action_descriptions(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.describe()).collect()
    }

    /// Scaffold `directory`, then run every action in registration order
    ///
    /// A failed scaffold runs no actions. The first failing action stops
    /// the rest.
    pub async fn initialize(&self, directory: &Path, toolchain: &dyn Toolchain) -> PrebuildResult<()> {
        info!(
            "Initializing {} with template {}",
            directory.display(),
            self.template
        );

        let request = ScaffoldRequest {
            template: self.template.clone(),
            project_name: self.project_name.clone(),
            language: self.language.clone(),
            output: PathBuf::from(directory),
        };

        let scaffold_error = |reason: String| PrebuildError::Scaffold {
            directory: directory.to_path_buf(),
            reason,
        };

        let output = toolchain
            .scaffold(&request)
            .await
            .map_err(|e| scaffold_error(e.to_string()))?;
        if !output.success() {
            return Err(scaffold_error(output.error_tail()));
        }

        for action in &self.actions {
            debug!("After-create: {}", action.describe());
            action.apply(directory, toolchain).await?;
        }

        Ok(())
    }
}

impl fmt::Debug for TemplateInitializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateInitializer")
            .field("template", &self.template)
            .field("project_name", &self.project_name)
            .field("language", &self.language)
            .field("actions", &self.action_descriptions())
            .finish()
    }
}
