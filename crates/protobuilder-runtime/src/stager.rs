//! Code staging: copy a local source tree into a running container.

use std::path::Path;

use protobuilder_common::{ContainerEngine, ContainerHandle};
use tracing::{debug, info};

use crate::error::RuntimeError;

/// Build an in-memory tar archive whose top-level entries are the entries of
/// `src` (not `src` itself), sorted by name.
pub fn build_archive(src: &Path) -> Result<Vec<u8>, RuntimeError> {
    if !src.is_dir() {
        return Err(RuntimeError::SourceMissing {
            path: src.to_path_buf(),
        });
    }
    let archive_err = |source| RuntimeError::Archive {
        path: src.to_path_buf(),
        source,
    };

    let mut entries = std::fs::read_dir(src)
        .and_then(|rd| rd.collect::<Result<Vec<_>, _>>())
        .map_err(archive_err)?;
    entries.sort_by_key(|e| e.file_name());

    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);
    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let file_type = entry.file_type().map_err(archive_err)?;
        if file_type.is_dir() {
            builder.append_dir_all(&name, &path).map_err(archive_err)?;
        } else {
            builder
                .append_path_with_name(&path, &name)
                .map_err(archive_err)?;
        }
        debug!(entry = %name.to_string_lossy(), "archived");
    }

    builder.into_inner().map_err(archive_err)
}

/// Copies local directories into containers.
///
/// No rollback: a failed transfer may leave partial content behind.
pub struct CodeStager;

impl CodeStager {
    pub async fn stage<E: ContainerEngine + ?Sized>(
        engine: &E,
        handle: &ContainerHandle,
        src: &Path,
        dest: &str,
    ) -> Result<(), RuntimeError> {
        let archive = build_archive(src)?;
        let size = archive.len();
        engine.upload_archive(&handle.id, dest, archive).await?;
        info!(
            container = %handle.name,
            src = %src.display(),
            dest,
            bytes = size,
            "staged code into container"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeEngine;
    use std::fs;

    fn top_level_entries(archive: &[u8]) -> Vec<String> {
        let mut names: Vec<String> = tar::Archive::new(archive)
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .filter_map(|p| {
                p.trim_end_matches('/')
                    .split('/')
                    .next()
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn local_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run.sh"), "#!/bin/sh\nnpm run serve\n").unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        fs::create_dir_all(dir.path().join("src/components")).unwrap();
        fs::write(dir.path().join("src/components/App.js"), "export default 1;").unwrap();
        fs::create_dir_all(dir.path().join("public")).unwrap();
        dir
    }

    #[test]
    fn archive_top_level_matches_directory_entries() {
        let dir = sample_tree();
        let archive = build_archive(dir.path()).unwrap();
        assert_eq!(top_level_entries(&archive), local_entries(dir.path()));
    }

    #[test]
    fn archive_preserves_nested_paths() {
        let dir = sample_tree();
        let archive = build_archive(dir.path()).unwrap();
        let paths: Vec<String> = tar::Archive::new(&archive[..])
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(paths.iter().any(|p| p == "src/components/App.js"));
        assert!(!paths.iter().any(|p| p.starts_with('/')));
    }

    #[test]
    fn missing_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_archive(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, RuntimeError::SourceMissing { .. }));
    }

    #[test]
    fn file_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("single.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            build_archive(&file),
            Err(RuntimeError::SourceMissing { .. })
        ));
    }

    #[test]
    fn empty_directory_produces_empty_listing() {
        let dir = tempfile::tempdir().unwrap();
        let archive = build_archive(dir.path()).unwrap();
        assert!(top_level_entries(&archive).is_empty());
    }

    #[tokio::test]
    async fn staged_entries_match_source_in_container() {
        let dir = sample_tree();
        let engine = FakeEngine::new();
        let handle = ContainerHandle::new("c1", "web", "node:14-slim", "/workspace");

        CodeStager::stage(&engine, &handle, dir.path(), "/workspace")
            .await
            .unwrap();

        assert_eq!(
            engine.list_staged("c1", "/workspace"),
            local_entries(dir.path())
        );
    }

    #[tokio::test]
    async fn upload_failure_propagates() {
        let dir = sample_tree();
        let engine = FakeEngine::new();
        engine.state().fail_upload = true;
        let handle = ContainerHandle::new("c1", "web", "node:14-slim", "/workspace");

        let err = CodeStager::stage(&engine, &handle, dir.path(), "/workspace")
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Engine(_)));
    }
}
