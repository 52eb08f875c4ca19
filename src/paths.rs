use std::path::{Component, Path, PathBuf};

use crate::error::{Result, StevedoreError};

/// Normalize a path to be absolute and clean, without requiring it to exist.
///
/// This function:
/// - Converts relative paths to absolute against `base` (or the current
///   directory when `base` is `None`)
/// - Removes `.` and `..` components where possible
/// - Does NOT resolve symlinks
/// - Does NOT require the path to exist
pub(crate) fn absolutize(path: impl AsRef<Path>, base: Option<&Path>) -> PathBuf {
    let path = path.as_ref();

    let absolute = if path.is_relative() {
        let base = match base {
            Some(base) if base.is_absolute() => base.to_path_buf(),
            Some(base) => current_dir().join(base),
            None => current_dir(),
        };
        base.join(path)
    } else {
        path.to_path_buf()
    };

    let mut components = Vec::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                if let Some(last) = components.last()
                    && !matches!(last, Component::ParentDir | Component::RootDir)
                {
                    components.pop();
                    continue;
                }
                if matches!(components.last(), Some(Component::RootDir)) {
                    continue;
                }
                components.push(component);
            }
            Component::CurDir => continue,
            _ => components.push(component),
        }
    }

    let mut result = PathBuf::new();
    for component in components {
        result.push(component);
    }

    result
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Renders a relative path with forward-slash separators.
pub(crate) fn to_slash(path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| StevedoreError::InvalidUtf8Path(path.to_path_buf()))?,
            ),
            Component::CurDir => {}
            other => parts.push(
                other
                    .as_os_str()
                    .to_str()
                    .ok_or_else(|| StevedoreError::InvalidUtf8Path(path.to_path_buf()))?,
            ),
        }
    }
    Ok(parts.join("/"))
}

/// Joins two slash-separated virtual paths.
pub(crate) fn join_slash(base: &str, rest: &str) -> String {
    let base = base.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}/{rest}"),
    }
}

pub(crate) fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| StevedoreError::InvalidUtf8Path(path.to_path_buf()))
}
