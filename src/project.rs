//! Writing a parsed developer output to disk.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::ProjectError;
use crate::output::DeveloperOutput;

static CODE_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?code>").unwrap());

/// Remove `<code>` / `</code>` wrappers and surrounding whitespace.
pub fn clean_file_content(content: &str) -> String {
    CODE_TAG_REGEX.replace_all(content, "").trim().to_string()
}

/// `path` joined under `root`, or `None` when it is absolute or climbs out
/// with `..`.
fn resolve_under(root: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path);
    if path.is_empty() {
        return None;
    }
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    safe.then(|| root.join(relative))
}

/// What [`materialize`] did.
#[derive(Debug, Default, Clone, Serialize)]
pub struct MaterializeReport {
    pub root: PathBuf,
    pub dirs_created: Vec<PathBuf>,
    pub files_written: Vec<PathBuf>,
    /// `(path, error)` for every directory or file that was not written.
    pub failures: Vec<(String, String)>,
    /// Reported to the user, never executed.
    pub creation_command: Option<String>,
}

impl MaterializeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Create the directories and files of `output` under `root`.
///
/// A failing directory or file is recorded in the report and the rest are
/// still written. Only failing to create `root` itself is an error.
pub fn materialize(output: &DeveloperOutput, root: &Path) -> Result<MaterializeReport, ProjectError> {
    std::fs::create_dir_all(root).map_err(|source| ProjectError::CreateRoot {
        path: root.to_path_buf(),
        source,
    })?;

    let mut report = MaterializeReport {
        root: root.to_path_buf(),
        ..Default::default()
    };

    let command = output.project_creation_command.trim();
    if !command.is_empty() {
        info!(command, "project creation command (not executed)");
        report.creation_command = Some(command.to_string());
    }

    for dir in &output.project_structure {
        let Some(target) = resolve_under(root, dir) else {
            warn!(dir = %dir, "refusing unsafe directory path");
            report.failures.push((
                dir.clone(),
                ProjectError::UnsafePath { path: dir.clone() }.to_string(),
            ));
            continue;
        };
        match std::fs::create_dir_all(&target) {
            Ok(()) => report.dirs_created.push(target),
            Err(e) => {
                warn!(dir = %dir, error = %e, "failed to create directory");
                report.failures.push((dir.clone(), e.to_string()));
            }
        }
    }

    for file in &output.files {
        let Some(target) = resolve_under(root, &file.path) else {
            warn!(path = %file.path, "refusing unsafe file path");
            report.failures.push((
                file.path.clone(),
                ProjectError::UnsafePath {
                    path: file.path.clone(),
                }
                .to_string(),
            ));
            continue;
        };
        let written = target
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(&target, clean_file_content(&file.content)));
        match written {
            Ok(()) => report.files_written.push(target),
            Err(e) => {
                warn!(path = %file.path, error = %e, "failed to write file");
                report.failures.push((file.path.clone(), e.to_string()));
            }
        }
    }

    info!(
        root = %root.display(),
        dirs = report.dirs_created.len(),
        files = report.files_written.len(),
        failures = report.failures.len(),
        "project materialized"
    );
    Ok(report)
}

/// Read a developer XML file and materialize it.
pub fn materialize_file(xml_path: &Path, root: &Path) -> anyhow::Result<MaterializeReport> {
    use anyhow::Context;

    let xml = std::fs::read_to_string(xml_path).map_err(|source| ProjectError::Read {
        path: xml_path.to_path_buf(),
        source,
    })?;
    let output = DeveloperOutput::parse(&xml)
        .with_context(|| format!("Failed to parse {}", xml_path.display()))?;
    Ok(materialize(&output, root)?)
}
