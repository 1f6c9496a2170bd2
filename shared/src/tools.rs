use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::ToolError;

/// Makes an external executable available before any work that needs it starts.
///
/// With a `staging_source`, the executable is copied into `staging_directory` and
/// marked executable; an already staged copy of the same size is reused, so calling
/// this repeatedly is cheap. Without a source, `name` is used as-is when it points to
/// a file, otherwise it is looked up on `PATH`.
pub fn ensure_tool_available(
    name: &str,
    staging_source: Option<&Path>,
    staging_directory: &Path,
) -> Result<PathBuf, ToolError> {
    let tool_path = match staging_source {
        Some(source_path) => stage_tool(name, source_path, staging_directory)?,
        None => find_tool(name)?,
    };

    if !is_executable(&tool_path) {
        return Err(ToolError::NotExecutable {
            name: name.to_string(),
            path: tool_path,
        });
    }

    debug!(tool = name, path = ?tool_path, "Tool is available.");
    Ok(tool_path)
}

fn stage_tool(name: &str, source_path: &Path, staging_directory: &Path) -> Result<PathBuf, ToolError> {
    if !source_path.is_file() {
        return Err(ToolError::MissingSource {
            name: name.to_string(),
            source_path: source_path.to_path_buf(),
        });
    }

    let staged_path = staging_directory.join(name);
    let stage_error = |source| ToolError::Stage {
        name: name.to_string(),
        path: staged_path.clone(),
        source,
    };

    let source_length = fs::metadata(source_path).map_err(stage_error)?.len();
    let already_staged = fs::metadata(&staged_path)
        .map(|metadata| metadata.is_file() && metadata.len() == source_length)
        .unwrap_or(false);

    if already_staged {
        debug!(tool = name, "Tool is already staged, reusing it.");
    } else {
        info!(tool = name, from = ?source_path, to = ?staged_path, "Staging tool.");
        fs::create_dir_all(staging_directory).map_err(stage_error)?;
        fs::copy(source_path, &staged_path).map_err(stage_error)?;
    }

    mark_executable(&staged_path).map_err(stage_error)?;
    Ok(staged_path)
}

fn find_tool(name: &str) -> Result<PathBuf, ToolError> {
    let direct_path = PathBuf::from(name);
    if direct_path.components().count() > 1 || direct_path.is_absolute() {
        return if direct_path.is_file() {
            Ok(direct_path)
        } else {
            Err(ToolError::NotFound {
                name: name.to_string(),
            })
        };
    }

    env::var_os("PATH")
        .and_then(|search_path| {
            env::split_paths(&search_path)
                .map(|directory| directory.join(name))
                .find(|candidate| candidate.is_file())
        })
        .ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}


#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn stages_source_once_and_marks_it_executable() {
        let directory = tempfile::tempdir().unwrap();
        let source = directory.path().join("gm-bundled");
        fs::write(&source, "#!/bin/sh\nexit 0\n").unwrap();
        let staging = directory.path().join("tools");

        let first = ensure_tool_available("gm", Some(&source), &staging).unwrap();
        assert_eq!(first, staging.join("gm"));
        assert!(is_executable(&first));

        let second = ensure_tool_available("gm", Some(&source), &staging).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_source_is_a_staging_error() {
        let directory = tempfile::tempdir().unwrap();
        let result = ensure_tool_available(
            "gm",
            Some(&directory.path().join("nope")),
            directory.path(),
        );

        assert!(matches!(result, Err(ToolError::MissingSource { .. })));
    }

    #[test]
    fn explicit_path_must_be_executable() {
        let directory = tempfile::tempdir().unwrap();
        let plain_file = directory.path().join("renderer");
        fs::write(&plain_file, "not a program").unwrap();

        let result = ensure_tool_available(plain_file.to_str().unwrap(), None, directory.path());
        assert!(matches!(result, Err(ToolError::NotExecutable { .. })));
    }

    #[test]
    fn finds_tools_on_path() {
        let result = ensure_tool_available("sh", None, Path::new("/nonexistent"));
        assert!(result.is_ok());

        let result = ensure_tool_available(
            "definitely-not-an-installed-tool",
            None,
            Path::new("/nonexistent"),
        );
        assert!(matches!(result, Err(ToolError::NotFound { .. })));
    }
}
