//! Path helpers for user-supplied config and data locations.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Expand a leading `~` and make the path absolute.
///
/// Relative paths resolve against the current directory. `.` and `..` are
/// folded syntactically; the path does not need to exist.
#[must_use]
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let expanded = expand_home(path);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        env::current_dir().map_or_else(|_| expanded.clone(), |cwd| cwd.join(&expanded))
    };
    fold_components(&absolute)
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

fn fold_components(path: &Path) -> PathBuf {
    let mut kept: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(kept.last(), Some(Component::Normal(_))) {
                    kept.pop();
                }
            }
            other => kept.push(other),
        }
    }
    kept.into_iter().collect()
}
