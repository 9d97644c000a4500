//! Filesystem helpers shared by the benchmark harness.
//!
//! [`update_path`] locates a data folder or file relative to some ancestor of
//! the working directory, and [`create_dir`] prepares output folders.

use log::{debug, warn};
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Default number of parent hops tried by [`update_path`].
pub const DEFAULT_MAX_HOPS: usize = 5;

#[derive(thiserror::Error, Debug)]
pub enum UtilError {
    #[error("Missing directory: {0}")]
    MissingDirectory(PathBuf),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for UtilError {
    fn from(err: std::io::Error) -> Self {
        UtilError::IOError(err.to_string())
    }
}

/// Bubble up the folder tree until the desired path exists, otherwise return
/// the original one.
///
/// Candidates are `path`, `../path`, `../../path`, ... for at most `max_hops`
/// attempts. Absolute paths are returned untouched and home-relative paths
/// (`~/...`) are only expanded. When `absolute` is set the result is turned
/// into a normalized absolute path.
///
/// # Arguments
///
/// * `path` - Path relative to the current directory or one of its ancestors
/// * `max_hops` - Number of candidates to try before giving up
/// * `absolute` - Return an absolute path
///
/// # Examples
///
/// ```rust
/// use benchmark_io::util::update_path;
///
/// assert!(update_path("/", 5, false).exists());
/// assert_eq!(
///     update_path("no/such/folder/anywhere", 5, false),
///     std::path::PathBuf::from("no/such/folder/anywhere")
/// );
/// ```
pub fn update_path<P: AsRef<Path>>(path: P, max_hops: usize, absolute: bool) -> PathBuf {
    let base = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    update_path_in(&base, path, max_hops, absolute)
}

/// Same as [`update_path`] but candidates are looked up relative to `base`
/// instead of the current directory.
pub fn update_path_in<P: AsRef<Path>>(
    base: &Path,
    path: P,
    max_hops: usize,
    absolute: bool,
) -> PathBuf {
    let path = path.as_ref();
    if path.has_root() {
        return path.to_path_buf();
    }
    if let Some(expanded) = expand_home(path) {
        return expanded;
    }

    let mut resolved = path.to_path_buf();
    let mut candidate = path.to_path_buf();
    for _ in 0..max_hops {
        if base.join(&candidate).exists() {
            debug!("Resolved {} to {}", path.display(), candidate.display());
            resolved = candidate;
            break;
        }
        candidate = Path::new("..").join(candidate);
    }

    if absolute {
        normalize_path(&base.join(resolved))
    } else {
        resolved
    }
}

/// Expand a leading `~` component to the user's home directory.
///
/// Returns `None` when the path is not home-relative or `HOME` is unset.
fn expand_home(path: &Path) -> Option<PathBuf> {
    let rest = path.strip_prefix("~").ok()?;
    let home = env::var_os("HOME")?;
    Some(PathBuf::from(home).join(rest))
}

/// Join a relative path onto the current directory and normalize it.
///
/// Falls back to the lexically normalized input if the current directory
/// cannot be determined.
pub fn absolute_path(path: &Path) -> PathBuf {
    if path.has_root() {
        return normalize_path(path);
    }
    match env::current_dir() {
        Ok(cwd) => normalize_path(&cwd.join(path)),
        Err(_) => normalize_path(path),
    }
}

/// Lexically remove `.` and `..` components without touching the filesystem.
///
/// Leading `..` components of a relative path are kept, `..` at the root is
/// dropped.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

/// Create a folder (and its parents) if it does not exist yet.
///
/// An already existing folder only produces a warning. Returns the absolute
/// path of the folder.
pub fn create_dir<P: AsRef<Path>>(path: P) -> Result<PathBuf, UtilError> {
    let path_dir = absolute_path(path.as_ref());
    if path_dir.is_dir() {
        warn!("Folder already exists: {}", path_dir.display());
        return Ok(path_dir);
    }

    fs::DirBuilder::new()
        .recursive(true)
        .mode_if_supported()
        .create(&path_dir)
        .map_err(|e| {
            UtilError::IOError(format!(
                "Failed to create directory {}: {e}",
                path_dir.display()
            ))
        })?;
    debug!("Created folder: {}", path_dir.display());
    Ok(path_dir)
}

/// Check that the folder holding `path` exists.
///
/// A bare file name refers to the current directory, which always passes.
pub fn ensure_parent_dir(path: &Path) -> Result<(), UtilError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            Err(UtilError::MissingDirectory(parent.to_path_buf()))
        }
        _ => Ok(()),
    }
}

trait DirBuilderModeExt {
    fn mode_if_supported(&mut self) -> &mut Self;
}

impl DirBuilderModeExt for fs::DirBuilder {
    #[cfg(unix)]
    fn mode_if_supported(&mut self) -> &mut Self {
        use std::os::unix::fs::DirBuilderExt;
        self.mode(0o775)
    }

    #[cfg(not(unix))]
    fn mode_if_supported(&mut self) -> &mut Self {
        self
    }
}
