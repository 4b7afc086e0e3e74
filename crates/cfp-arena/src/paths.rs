//! Engine binary discovery.
//!
//! Engines live under one configurable directory. Discovery walks it
//! recursively and reports executable files by their path relative to
//! that directory, which is also the form observers use in `engine
//! load path ...`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::hub::HubError;

/// Lists executable files under `dir`, recursively, as relative paths
/// in lexical order.
///
/// # Errors
///
/// [`HubError::EngineDir`] when the directory cannot be read.
pub fn discover_engines(dir: &Path) -> Result<Vec<PathBuf>, HubError> {
    let root = dir
        .canonicalize()
        .map_err(|e| HubError::EngineDir(format!("{}: {e}", dir.display())))?;
    let mut found = Vec::new();
    walk(&root, &root, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(root: &Path, dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), HubError> {
    let entries =
        fs::read_dir(dir).map_err(|e| HubError::EngineDir(format!("{}: {e}", dir.display())))?;
    for entry in entries {
        let entry =
            entry.map_err(|e| HubError::EngineDir(format!("{}: {e}", dir.display())))?;
        let path = entry.path();
        let metadata = entry
            .metadata()
            .map_err(|e| HubError::EngineDir(format!("{}: {e}", path.display())))?;
        if metadata.is_dir() {
            walk(root, &path, found)?;
        } else if is_executable(&metadata) {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            found.push(relative.to_path_buf());
        }
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn touch(path: &Path, executable: bool) {
        fs::write(path, "#!/bin/sh\n").unwrap();
        let mode = if executable { 0o755 } else { 0o644 };
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn finds_executables_recursively() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("alpha"), true);
        touch(&dir.path().join("notes.txt"), false);
        fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested/beta"), true);

        let found = discover_engines(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![PathBuf::from("alpha"), PathBuf::from("nested/beta")]
        );
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_engines(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = discover_engines(Path::new("/no/such/engine/dir")).unwrap_err();
        assert!(matches!(err, HubError::EngineDir(_)));
    }
}
