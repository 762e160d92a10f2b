//! Compilation workspace
//!
//! An in-memory project graph rebuilt from a [`ProjectDescription`]. Each
//! project owns immutable text snapshots of its source files, edges to
//! sibling projects already loaded in the same workspace, and the external
//! binaries and analyzers it compiles against.

use crate::cache::{OutputKind, ProjectDescription};
use crate::error::{PrebuildError, PrebuildResult};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Project identity within a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProjectId(pub Uuid);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Document identity: owning project plus position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DocumentId {
    pub project: ProjectId,
    pub index: usize,
}

/// A source file snapshot
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub path: PathBuf,
    #[serde(skip)]
    pub text: Arc<str>,
}

/// Kind of an on-disk reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Binary,
    Analyzer,
}

/// A binary or analyzer the project compiles against
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalReference {
    pub kind: ReferenceKind,
    pub path: PathBuf,
}

/// Compiler-facing settings of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilationSettings {
    pub language: Option<String>,
    pub language_version: Option<String>,
    pub preprocessor_symbols: BTreeSet<String>,
    pub output_kind: OutputKind,
}

/// A project node
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub file_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub settings: CompilationSettings,
    pub documents: Vec<Document>,
    pub project_references: Vec<ProjectId>,
    pub external_references: Vec<ExternalReference>,
}

impl Project {
    /// An empty project node
    pub fn new(id: ProjectId, file_path: PathBuf, settings: CompilationSettings) -> Self {
        let name = file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            id,
            name,
            file_path,
            output_path: None,
            settings,
            documents: Vec::new(),
            project_references: Vec::new(),
            external_references: Vec::new(),
        }
    }
}

/// One project's worth of compiler input
#[derive(Debug)]
pub struct CompilationUnit<'a> {
    pub project: &'a Project,
    pub documents: &'a [Document],
    pub references: Vec<&'a Path>,
    pub analyzers: Vec<&'a Path>,
    pub project_references: Vec<&'a Project>,
}

/// In-memory project graph
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationWorkspace {
    projects: Vec<Project>,
}

impl CompilationWorkspace {
    /// Create an empty workspace
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a workspace holding exactly the described project
    pub async fn from_description(description: &ProjectDescription) -> PrebuildResult<Self> {
        let mut workspace = Self::new();
        workspace.load_project(description).await?;
        Ok(workspace)
    }

    /// Add a project node; replaces a node with the same id
    pub fn add_project(&mut self, project: Project) -> ProjectId {
        let id = project.id;
        self.projects.retain(|p| p.id != id);
        self.projects.push(project);
        id
    }

    /// Attach a document snapshot to `project`
    pub fn add_document(
        &mut self,
        project: ProjectId,
        path: impl Into<PathBuf>,
        text: impl Into<Arc<str>>,
    ) -> PrebuildResult<DocumentId> {
        let node = self.project_mut(project)?;
        let path = path.into();
        let id = DocumentId {
            project,
            index: node.documents.len(),
        };
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        node.documents.push(Document {
            id,
            name,
            path,
            text: text.into(),
        });
        Ok(id)
    }

    /// Add an edge `from -> to`; both projects must be loaded
    pub fn add_project_reference(&mut self, from: ProjectId, to: ProjectId) -> PrebuildResult<()> {
        if self.project(to).is_none() {
            return Err(PrebuildError::Internal(format!(
                "project reference target {} is not loaded",
                to
            )));
        }

        let node = self.project_mut(from)?;
        if !node.project_references.contains(&to) {
            node.project_references.push(to);
        }
        Ok(())
    }

    /// Attach an external binary or analyzer
    pub fn add_external_reference(
        &mut self,
        project: ProjectId,
        reference: ExternalReference,
    ) -> PrebuildResult<()> {
        self.project_mut(project)?.external_references.push(reference);
        Ok(())
    }

    /// Look up a project
    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    fn project_mut(&mut self, id: ProjectId) -> PrebuildResult<&mut Project> {
        self.projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| PrebuildError::Internal(format!("project {} is not loaded", id)))
    }

    /// All projects in load order
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// The project whose file path matches, ignoring ASCII case
    pub fn find_project_by_path(&self, path: &Path) -> Option<&Project> {
        let wanted = path.to_string_lossy();
        self.projects
            .iter()
            .find(|p| p.file_path.to_string_lossy().eq_ignore_ascii_case(&wanted))
    }

    /// Compiler input for each project, in load order
    pub fn compilation_units(&self) -> Vec<CompilationUnit<'_>> {
        self.projects
            .iter()
            .map(|project| {
                let of_kind = |kind: ReferenceKind| {
                    project
                        .external_references
                        .iter()
                        .filter(move |r| r.kind == kind)
                        .map(|r| r.path.as_path())
                        .collect::<Vec<_>>()
                };

                CompilationUnit {
                    project,
                    documents: &project.documents,
                    references: of_kind(ReferenceKind::Binary),
                    analyzers: of_kind(ReferenceKind::Analyzer),
                    project_references: project
                        .project_references
                        .iter()
                        .filter_map(|id| self.project(*id))
                        .collect(),
                }
            })
            .collect()
    }

    /// Whether the workspace can feed a compilation
    pub fn check_usable(&self) -> PrebuildResult<()> {
        if self.projects.is_empty() {
            return Err(PrebuildError::WorkspaceUnusable(
                "workspace contains no projects".to_string(),
            ));
        }

        if let Some(project) = self
            .projects
            .iter()
            .find(|p| p.file_path.as_os_str().is_empty())
        {
            return Err(PrebuildError::WorkspaceUnusable(format!(
                "project {} has no project file path",
                project.id
            )));
        }

        Ok(())
    }

    /// Whether [`CompilationWorkspace::check_usable`] passes
    pub fn is_usable(&self) -> bool {
        self.check_usable().is_ok()
    }

    /// Add a project reconstructed from `description`
    ///
    /// Source files and references that no longer exist are skipped.
    /// Project references resolve only against projects already loaded
    /// here; the rest are dropped.
    pub async fn load_project(
        &mut self,
        description: &ProjectDescription,
    ) -> PrebuildResult<ProjectId> {
        let settings = CompilationSettings {
            language: description.language_name.clone(),
            language_version: description.language_version.clone(),
            preprocessor_symbols: description.preprocessor_symbols.clone(),
            output_kind: description.output_kind()?,
        };

        let id = ProjectId(description.project_guid);
        let mut project = Project::new(id, description.project_file_path.clone(), settings);
        project.output_path = description.output_path.clone();
        self.add_project(project);

        for path in &description.source_files {
            match tokio::fs::read_to_string(path).await {
                Ok(text) => {
                    self.add_document(id, path.clone(), text)?;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Skipping missing source file {}", path.display());
                }
                Err(e) => {
                    return Err(PrebuildError::io(
                        format!("reading source file {}", path.display()),
                        e,
                    ))
                }
            }
        }

        for path in &description.project_references {
            match self.find_project_by_path(path).map(|p| p.id) {
                Some(target) if target != id => self.add_project_reference(id, target)?,
                _ => debug!("Dropping unresolved project reference {}", path.display()),
            }
        }

        let externals = description
            .references
            .iter()
            .map(|p| (ReferenceKind::Binary, p))
            .chain(
                description
                    .analyzer_references
                    .iter()
                    .map(|p| (ReferenceKind::Analyzer, p)),
            );
        for (kind, path) in externals {
            if path.is_file() {
                self.add_external_reference(
                    id,
                    ExternalReference {
                        kind,
                        path: path.clone(),
                    },
                )?;
            } else {
                debug!("Skipping missing {:?} reference {}", kind, path.display());
            }
        }

        Ok(id)
    }
}
