//! Build manifest codec
//!
//! The external build leaves one `*.prebuild.manifest` file next to the
//! project file. It holds newline-separated `key=value` records: scalar
//! keys appear once, array keys repeat once per element in order.

use crate::error::{PrebuildError, PrebuildResult};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use uuid::Uuid;

/// File name suffix identifying a build manifest
pub const MANIFEST_SUFFIX: &str = ".prebuild.manifest";

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

/// Manifest record keys
pub mod keys {
    pub const PROJECT_GUID: &str = "ProjectGuid";
    pub const PROJECT_FILE_PATH: &str = "ProjectFilePath";
    pub const LANGUAGE_NAME: &str = "LanguageName";
    pub const TARGET_PATH: &str = "PropertyTargetPath";
    pub const LANG_VERSION: &str = "PropertyLangVersion";
    pub const OUTPUT_TYPE: &str = "PropertyOutputType";

    pub const PROJECT_REFERENCES: &str = "ProjectReferences";
    pub const SOURCE_FILES: &str = "SourceFiles";
    pub const REFERENCES: &str = "References";
    pub const ANALYZER_REFERENCES: &str = "AnalyzerReferences";
    pub const PREPROCESSOR_SYMBOLS: &str = "PreprocessorSymbols";
}

/// What a project compiles to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    DynamicLibrary,
    ConsoleExecutable,
    Module,
    WindowedExecutable,
}

impl OutputKind {
    /// Map a manifest `PropertyOutputType` value
    pub fn from_manifest(value: &str) -> Option<Self> {
        match value {
            "Library" => Some(Self::DynamicLibrary),
            "Exe" => Some(Self::ConsoleExecutable),
            "Module" => Some(Self::Module),
            "Winexe" => Some(Self::WindowedExecutable),
            _ => None,
        }
    }

    /// The manifest spelling of this kind
    pub fn as_manifest(&self) -> &'static str {
        match self {
            Self::DynamicLibrary => "Library",
            Self::ConsoleExecutable => "Exe",
            Self::Module => "Module",
            Self::WindowedExecutable => "Winexe",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DynamicLibrary => "library",
            Self::ConsoleExecutable => "executable",
            Self::Module => "module",
            Self::WindowedExecutable => "windowed-executable",
        };
        write!(f, "{}", name)
    }
}

/// Structured contents of a build manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDescription {
    /// Project identity (generated when the build does not provide one)
    pub project_guid: Uuid,
    pub project_file_path: PathBuf,
    pub language_name: Option<String>,
    /// Path of the primary build output
    pub output_path: Option<PathBuf>,
    pub source_files: Vec<PathBuf>,
    pub project_references: Vec<PathBuf>,
    /// Binary references
    pub references: Vec<PathBuf>,
    pub analyzer_references: Vec<PathBuf>,
    pub preprocessor_symbols: BTreeSet<String>,
    pub language_version: Option<String>,
    /// Raw output type; mapped by [`ProjectDescription::output_kind`]
    pub output_type: Option<String>,
}

impl ProjectDescription {
    /// An empty description for `project_file_path` with a fresh identity
    pub fn new(project_file_path: impl Into<PathBuf>) -> Self {
        Self {
            project_guid: Uuid::new_v4(),
            project_file_path: project_file_path.into(),
            language_name: None,
            output_path: None,
            source_files: Vec::new(),
            project_references: Vec::new(),
            references: Vec::new(),
            analyzer_references: Vec::new(),
            preprocessor_symbols: BTreeSet::new(),
            language_version: None,
            output_type: None,
        }
    }

    /// Parse manifest text
    pub fn parse(content: &str) -> Self {
        let mut scalars: HashMap<String, String> = HashMap::new();
        let mut arrays: HashMap<String, Vec<String>> = HashMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                keys::PROJECT_GUID
                | keys::PROJECT_FILE_PATH
                | keys::LANGUAGE_NAME
                | keys::TARGET_PATH
                | keys::LANG_VERSION
                | keys::OUTPUT_TYPE => {
                    scalars.insert(key.to_string(), value.to_string());
                }
                keys::PROJECT_REFERENCES
                | keys::SOURCE_FILES
                | keys::REFERENCES
                | keys::ANALYZER_REFERENCES
                | keys::PREPROCESSOR_SYMBOLS => {
                    arrays
                        .entry(key.to_string())
                        .or_default()
                        .push(value.to_string());
                }
                _ => {}
            }
        }

        let mut scalar = |key: &str| scalars.remove(key).filter(|v| !v.is_empty());
        let mut values = |key: &str| -> Vec<String> {
            arrays
                .remove(key)
                .unwrap_or_default()
                .into_iter()
                .filter(|v| !v.is_empty())
                .collect()
        };
        let paths = |values: Vec<String>| -> Vec<PathBuf> {
            values.into_iter().map(PathBuf::from).collect()
        };

        let project_guid = scalar(keys::PROJECT_GUID)
            .and_then(|v| Uuid::parse_str(&v).ok())
            .unwrap_or_else(Uuid::new_v4);

        // The build emits the raw `;`-joined list as well as each symbol.
        let preprocessor_symbols = values(keys::PREPROCESSOR_SYMBOLS)
            .iter()
            .flat_map(|v| v.split(';'))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            project_guid,
            project_file_path: scalar(keys::PROJECT_FILE_PATH)
                .map(PathBuf::from)
                .unwrap_or_default(),
            language_name: scalar(keys::LANGUAGE_NAME),
            output_path: scalar(keys::TARGET_PATH).map(PathBuf::from),
            source_files: paths(values(keys::SOURCE_FILES)),
            project_references: paths(values(keys::PROJECT_REFERENCES)),
            references: paths(values(keys::REFERENCES)),
            analyzer_references: paths(values(keys::ANALYZER_REFERENCES)),
            preprocessor_symbols,
            language_version: scalar(keys::LANG_VERSION),
            output_type: scalar(keys::OUTPUT_TYPE),
        }
    }

    /// Read and parse a manifest file
    pub async fn from_file(path: &Path) -> PrebuildResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            PrebuildError::io(format!("reading build manifest {}", path.display()), e)
        })?;
        Ok(Self::parse(&content))
    }

    /// Encode as manifest text; the inverse of [`ProjectDescription::parse`]
    pub fn to_manifest(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut push = |key: &str, value: &str| lines.push(format!("{}={}", key, value));

        push(keys::PROJECT_GUID, &self.project_guid.to_string());
        push(
            keys::PROJECT_FILE_PATH,
            &self.project_file_path.to_string_lossy(),
        );
        if let Some(language) = &self.language_name {
            push(keys::LANGUAGE_NAME, language);
        }
        if let Some(output) = &self.output_path {
            push(keys::TARGET_PATH, &output.to_string_lossy());
        }
        for path in &self.source_files {
            push(keys::SOURCE_FILES, &path.to_string_lossy());
        }
        for path in &self.project_references {
            push(keys::PROJECT_REFERENCES, &path.to_string_lossy());
        }
        for path in &self.references {
            push(keys::REFERENCES, &path.to_string_lossy());
        }
        for path in &self.analyzer_references {
            push(keys::ANALYZER_REFERENCES, &path.to_string_lossy());
        }
        for symbol in &self.preprocessor_symbols {
            push(keys::PREPROCESSOR_SYMBOLS, symbol);
        }
        if let Some(version) = &self.language_version {
            push(keys::LANG_VERSION, version);
        }
        if let Some(output_type) = &self.output_type {
            push(keys::OUTPUT_TYPE, output_type);
        }

        let mut text = lines.join(LINE_ENDING);
        text.push_str(LINE_ENDING);
        text
    }

    /// Resolve the output kind; unrecognized or absent values are an error
    pub fn output_kind(&self) -> PrebuildResult<OutputKind> {
        let raw = self.output_type.as_deref().unwrap_or_default();
        OutputKind::from_manifest(raw)
            .ok_or_else(|| PrebuildError::UnknownOutputKind(raw.to_string()))
    }

    /// Project name derived from the project file
    pub fn project_name(&self) -> String {
        self.project_file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// First manifest file directly inside `directory`, by name order
pub fn find_manifest(directory: &Path) -> PrebuildResult<Option<PathBuf>> {
    find_file(directory, |name| name.ends_with(MANIFEST_SUFFIX))
}

/// First file directly inside `directory` whose name satisfies `matches`
pub(crate) fn find_file(
    directory: &Path,
    matches: impl Fn(&str) -> bool,
) -> PrebuildResult<Option<PathBuf>> {
    if !directory.is_dir() {
        return Ok(None);
    }

    let entries = fs::read_dir(directory).map_err(|e| {
        PrebuildError::io(format!("reading directory {}", directory.display()), e)
    })?;

    let mut found: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(&matches)
        })
        .collect();
    found.sort();

    Ok(found.into_iter().next())
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Whether `manifest` can be trusted for `project_file`
///
/// A manifest is fresh when it was written at or after the last change to
/// the project file. A missing project file is never fresh.
pub fn is_fresh(manifest: &Path, project_file: Option<&Path>) -> bool {
    let Some(project_file) = project_file else {
        return false;
    };

    match (modified(manifest), modified(project_file)) {
        (Some(manifest_time), Some(project_time)) => {
            let fresh = manifest_time >= project_time;
            if !fresh {
                debug!(
                    "Manifest {} is older than {}",
                    manifest.display(),
                    project_file.display()
                );
            }
            fresh
        }
        _ => false,
    }
}

/// Stamp `path` with the current time so it reads as fresh
pub fn touch(path: &Path) -> PrebuildResult<()> {
    fs::File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(SystemTime::now()))
        .map_err(|e| PrebuildError::io(format!("touching {}", path.display()), e))
}

/// Wait until `path` can be opened and its size stops changing
pub async fn wait_for_file_available(
    path: &Path,
    attempts: u32,
    interval: Duration,
) -> PrebuildResult<()> {
    let mut last_len: Option<u64> = None;

    for _ in 0..attempts.max(1) {
        match fs::File::open(path).and_then(|f| f.metadata()) {
            Ok(meta) => {
                if last_len == Some(meta.len()) {
                    return Ok(());
                }
                last_len = Some(meta.len());
            }
            Err(e) => debug!("Waiting for {}: {}", path.display(), e),
        }
        tokio::time::sleep(interval).await;
    }

    if last_len.is_some() {
        warn!("{} still changing, reading anyway", path.display());
        return Ok(());
    }

    Err(PrebuildError::io(
        format!("waiting for {}", path.display()),
        std::io::Error::new(std::io::ErrorKind::NotFound, "file never became readable"),
    ))
}
