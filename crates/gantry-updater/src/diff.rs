use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gantry_core::{ManifestFile, UpdateManifest};

use crate::verify::sha256_file;

/// Result of comparing a manifest against the local target tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffPlan {
    /// Manifest entries that are missing, size-mismatched, or
    /// hash-mismatched locally, in manifest order.
    pub needed: Vec<ManifestFile>,
    /// Local files absent from the manifest; removal is policy-controlled
    /// and never happens during planning.
    pub extraneous: Vec<String>,
}

/// Relative slash-separated paths of every file under `root`. A missing
/// root is an empty tree, not an error.
pub fn scan_tree(root: &Path) -> io::Result<Vec<String>> {
    let mut paths = Vec::new();
    if !root.is_dir() {
        return Ok(paths);
    }

    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(root.to_path_buf());

    while let Some(dir) = queue.pop_front() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                queue.push_back(path);
            } else if file_type.is_file() {
                if let Ok(relative) = path.strip_prefix(root) {
                    paths.push(normalize_relative_path(relative));
                }
            }
        }
    }

    paths.sort();
    Ok(paths)
}

/// Compares `manifest` against the local tree at `target` by path, size, and
/// content hash. Paths in `skip` are excluded from both sides of the diff.
pub fn plan_updates(
    manifest: &UpdateManifest,
    target: &Path,
    skip: &[String],
) -> io::Result<DiffPlan> {
    let skipped: HashSet<&str> = skip.iter().map(String::as_str).collect();

    let mut needed = Vec::new();
    for entry in &manifest.files {
        if skipped.contains(entry.path.as_str()) {
            continue;
        }
        if local_file_differs(entry, target)? {
            needed.push(entry.clone());
        }
    }

    let manifest_paths: HashSet<&str> = manifest
        .files
        .iter()
        .map(|entry| entry.path.as_str())
        .collect();
    let extraneous = scan_tree(target)?
        .into_iter()
        .filter(|path| !manifest_paths.contains(path.as_str()))
        .filter(|path| !skipped.contains(path.as_str()))
        .collect();

    Ok(DiffPlan { needed, extraneous })
}

fn local_file_differs(entry: &ManifestFile, target: &Path) -> io::Result<bool> {
    let destination = target.join(&entry.path);
    let metadata = match fs::metadata(&destination) {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Ok(true),
    };

    if metadata.len() != entry.size {
        return Ok(true);
    }

    Ok(sha256_file(&destination)? != entry.sha256)
}

fn normalize_relative_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
