//! Project file inspection
//!
//! Read-only lookups on the tracked project file plus the one edit the
//! package layer makes to it (language version).

use crate::cache::manifest::find_file;
use crate::error::{PrebuildError, PrebuildResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn property_regex(name: &str) -> Option<Regex> {
    Regex::new(&format!(r"<{name}>\s*([^<]*?)\s*</{name}>")).ok()
}

fn property(text: &str, name: &str) -> Option<String> {
    property_regex(name)?
        .captures(text)
        .map(|c| c[1].to_string())
        .filter(|v| !v.is_empty())
}

/// The project file with `extension` directly inside `directory`
pub fn find_project_file(directory: &Path, extension: &str) -> PrebuildResult<Option<PathBuf>> {
    let suffix = format!(".{}", extension);
    find_file(directory, |name| name.ends_with(&suffix))
}

/// Like [`find_project_file`], but absence is an error
pub fn require_project_file(directory: &Path, extension: &str) -> PrebuildResult<PathBuf> {
    find_project_file(directory, extension)?.ok_or_else(|| PrebuildError::ProjectFileNotFound {
        directory: directory.to_path_buf(),
        extension: extension.to_string(),
    })
}

/// `TargetFramework`, or the first entry of `TargetFrameworks`
pub fn target_framework(text: &str) -> Option<String> {
    property(text, "TargetFramework").or_else(|| {
        property(text, "TargetFrameworks").and_then(|list| {
            list.split(';')
                .map(str::trim)
                .find(|s| !s.is_empty())
                .map(str::to_string)
        })
    })
}

/// `AssemblyName`, falling back to the project file stem
pub fn assembly_name(text: &str, project_file: &Path) -> String {
    property(text, "AssemblyName").unwrap_or_else(|| {
        project_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    })
}

/// Compiled entry point: `<dir>/bin/<configuration>/<tfm>/<assembly>.dll`
pub fn entry_point_path(
    directory: &Path,
    configuration: &str,
    target_framework: &str,
    assembly_name: &str,
) -> PathBuf {
    directory
        .join("bin")
        .join(configuration)
        .join(target_framework)
        .join(format!("{}.dll", assembly_name))
}

/// Set `LangVersion`, replacing an existing value or adding it to the
/// first `PropertyGroup`
pub fn with_language_version(text: &str, version: &str) -> Option<String> {
    static LANG_VERSION: OnceLock<Option<Regex>> = OnceLock::new();
    static PROPERTY_GROUP: OnceLock<Option<Regex>> = OnceLock::new();

    let lang_version = LANG_VERSION
        .get_or_init(|| property_regex("LangVersion"))
        .as_ref()?;
    if lang_version.is_match(text) {
        let replacement = format!("<LangVersion>{}</LangVersion>", version);
        return Some(
            lang_version
                .replace(text, regex::NoExpand(&replacement))
                .into_owned(),
        );
    }

    let group = PROPERTY_GROUP
        .get_or_init(|| Regex::new(r"<PropertyGroup\s*>").ok())
        .as_ref()?;
    let open = group.find(text)?;
    let mut edited = String::with_capacity(text.len() + 48);
    edited.push_str(&text[..open.end()]);
    edited.push_str(&format!("\n    <LangVersion>{}</LangVersion>", version));
    edited.push_str(&text[open.end()..]);
    Some(edited)
}

/// Apply [`with_language_version`] to the file at `project_file`
pub async fn set_language_version(project_file: &Path, version: &str) -> PrebuildResult<()> {
    let text = tokio::fs::read_to_string(project_file).await.map_err(|e| {
        PrebuildError::io(format!("reading project file {}", project_file.display()), e)
    })?;

    let edited = with_language_version(&text, version).ok_or_else(|| {
        PrebuildError::Internal(format!(
            "{} has no PropertyGroup to hold LangVersion",
            project_file.display()
        ))
    })?;

    tokio::fs::write(project_file, edited).await.map_err(|e| {
        PrebuildError::io(format!("writing project file {}", project_file.display()), e)
    })
}
