//! Test fixtures: shell-script engine doubles.
//!
//! Integration tests (here and in `cfp-arena`) need real processes
//! that speak just enough CFP. A `/bin/sh` read-loop is plenty; these
//! helpers write one to disk and mark it executable.

use std::io;
use std::path::{Path, PathBuf};

/// A well-behaved engine: fixed identity, a spin and a combo option,
/// always answers `bestmove 3`.
pub const STUB_ENGINE: &str = r#"#!/bin/sh
while read -r line; do
  set -- $line
  case "$1" in
    cfp)
      echo "id name Stub Engine"
      echo "id author Arena Tests"
      echo "option name Depth type spin default 1 min 0 max 10"
      echo "option name Style type combo default B var A var B var C"
      echo "cfpok"
      ;;
    isready) echo "readyok" ;;
    stop) echo "bestmove 3" ;;
    quit) exit 0 ;;
  esac
done
"#;

/// An engine that reads everything and answers nothing. Handshakes
/// against it time out.
pub const SILENT_ENGINE: &str = r#"#!/bin/sh
while read -r line; do
  :
done
"#;

/// An engine that finishes the handshake without declaring an author.
pub const ANONYMOUS_ENGINE: &str = r#"#!/bin/sh
while read -r line; do
  set -- $line
  case "$1" in
    cfp)
      echo "id name Nameless Wonder"
      echo "cfpok"
      ;;
    isready) echo "readyok" ;;
    quit) exit 0 ;;
  esac
done
"#;

/// Writes an engine script into `dir` under `name` and marks it
/// executable.
///
/// # Errors
///
/// Propagates filesystem errors.
pub fn write_engine_script(dir: &Path, name: &str, script: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, script)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms)?;
    }
    Ok(path)
}

/// Writes the default [`STUB_ENGINE`] into `dir`.
///
/// # Errors
///
/// Propagates filesystem errors.
pub fn write_stub_engine(dir: &Path) -> io::Result<PathBuf> {
    write_engine_script(dir, "stub-engine", STUB_ENGINE)
}
