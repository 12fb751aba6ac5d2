use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Why a file's contents could not be loaded.
#[derive(Debug)]
pub enum LoadFailure {
    /// The path does not exist or is not a regular file.
    NotFound,
    /// The file exists but reading it failed.
    Read(io::Error),
}

/// Reads the full contents of a file.
///
/// # Errors
///
/// - `LoadFailure::NotFound` if the path doesn't exist or isn't a file.
/// - `LoadFailure::Read` for any other read fault.
pub fn read_file_contents(path: &Path) -> Result<String, LoadFailure> {
    if !path.is_file() {
        return Err(LoadFailure::NotFound);
    }

    fs::read_to_string(path).map_err(LoadFailure::Read)
}

/// Computes an absolute file path from a base directory and a candidate path.
///
/// The candidate may be absolute (used as-is) or relative (joined onto
/// `base_dir`). Resolution is purely lexical: `.` and `..` components are
/// normalized without touching the filesystem, so paths to files that do not
/// exist yet resolve fine. Ordinary not-found conditions are therefore never
/// an error here.
///
/// # Errors
///
/// Returns a message when no absolute path can be computed, e.g. when `..`
/// components climb past the filesystem root.
pub fn resolve_path(base_dir: &Path, candidate: &Path) -> Result<PathBuf, String> {
    if candidate.as_os_str().is_empty() {
        return Err("the path is empty".to_string());
    }

    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    };

    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(format!(
                        "path '{}' climbs past the filesystem root",
                        joined.display()
                    ));
                }
            }
            Component::Normal(part) => resolved.push(part),
        }
    }

    Ok(resolved)
}

/// Path equality as the cycle detector and the save guard see it:
/// case-insensitive comparison of the textual form.
pub fn paths_equal_ignore_case(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}
