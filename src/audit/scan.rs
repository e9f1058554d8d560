//! Read-only source tree listing for the frontend static checks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| extensions.contains(&ext))
}

/// Recursively list files under `root` with one of `extensions`, sorted.
///
/// A missing root is an error: the caller cannot tell "clean" from "not found".
pub fn list_source_files(root: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Source directory not found: {}", root.display()),
        ));
    }

    fn walk_dir(dir: &Path, extensions: &[&str], files: &mut Vec<PathBuf>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();
            if file_type.is_symlink() {
                // Symlinked directories are never followed
                if path.is_file() && has_extension(&path, extensions) {
                    files.push(path);
                }
            } else if file_type.is_dir() {
                walk_dir(&path, extensions, files)?;
            } else if file_type.is_file() && has_extension(&path, extensions) {
                files.push(path);
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    walk_dir(root, extensions, &mut files)?;
    files.sort();
    Ok(files)
}

/// Files directly inside `dir` with one of `extensions`; empty if `dir` is absent.
pub fn list_top_level_files(dir: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
