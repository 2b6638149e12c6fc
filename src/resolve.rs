//! Locating the changelog file of a package.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

fn path_contains(path: &Path, needle: &str) -> bool {
    path.to_string_lossy().to_lowercase().contains(needle)
}

/// Pick the changelog among a package's file paths.
///
/// The first path containing `changelog.md` (any case) wins; failing that,
/// the first containing `history.md`. Paths are matched as given, so pass
/// package-relative paths.
pub fn select_changelog<P: AsRef<Path>>(paths: &[P]) -> Option<&P> {
    paths
        .iter()
        .find(|p| path_contains(p.as_ref(), "changelog.md"))
        .or_else(|| paths.iter().find(|p| path_contains(p.as_ref(), "history.md")))
}

/// Find the changelog file directly inside `dir`.
///
/// # Errors
/// Returns an error if the directory cannot be listed.
pub fn find_in_dir(dir: &Path) -> Result<Option<PathBuf>> {
    let mut names = fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| PathBuf::from(entry.file_name()))
        .collect::<Vec<_>>();
    // read_dir order is platform dependent.
    names.sort();
    // Match on file names only; the directory itself may look like a changelog.
    let found = select_changelog(&names).map(|name| dir.join(name));
    tracing::debug!(dir = %dir.display(), found = ?found, "changelog lookup");
    Ok(found)
}

/// Resolve a CLI path argument to a changelog file.
///
/// Files are returned as-is; directories are searched with [`find_in_dir`].
///
/// # Errors
/// Returns an error if `path` does not exist or a directory holds no
/// changelog file.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        return find_in_dir(path)?.with_context(|| {
            format!(
                "No changelog file (CHANGELOG.md or HISTORY.md) in {}",
                path.display()
            )
        });
    }
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    Ok(path.to_path_buf())
}
