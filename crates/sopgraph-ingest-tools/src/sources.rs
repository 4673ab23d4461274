//! Locating tool source files on disk.

use crate::{SourceScanner, ToolTableMap};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Options controlling which files count as tool source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSourceOptions {
    /// File extensions to include when walking a directory (lowercase, without dot).
    pub include_extensions: Vec<String>,
    /// Directory names to skip (exact match).
    pub exclude_dir_names: Vec<String>,
    /// Maximum file size to read (bytes) when walking a directory.
    pub max_file_bytes: u64,
}

impl Default for ToolSourceOptions {
    fn default() -> Self {
        Self {
            include_extensions: vec!["py".to_string(), "txt".to_string()],
            exclude_dir_names: vec![
                ".git".to_string(),
                "__pycache__".to_string(),
                "target".to_string(),
                "node_modules".to_string(),
            ],
            max_file_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolSourceFile {
    pub path: PathBuf,
    pub text: String,
}

/// Read tool sources from files and directories.
///
/// Explicit file paths must be readable. Directory entries that cannot be read,
/// are too large, or have a foreign extension are skipped. Files come back
/// ordered by path within each directory.
pub fn collect_tool_sources(
    paths: &[PathBuf],
    options: &ToolSourceOptions,
) -> Result<Vec<ToolSourceFile>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            files.extend(walk_dir(path, options));
        } else {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read tool source {}", path.display()))?;
            files.push(ToolSourceFile {
                path: path.clone(),
                text,
            });
        }
    }

    Ok(files)
}

fn walk_dir(root: &Path, options: &ToolSourceOptions) -> Vec<ToolSourceFile> {
    let include: BTreeSet<&str> = options
        .include_extensions
        .iter()
        .map(String::as_str)
        .collect();
    let exclude_dirs: BTreeSet<&str> = options
        .exclude_dir_names
        .iter()
        .map(String::as_str)
        .collect();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !exclude_dirs.contains(name.as_ref())
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(e) => e.to_lowercase(),
            None => continue,
        };
        if !include.contains(ext.as_str()) {
            continue;
        }

        match entry.metadata() {
            Ok(m) if m.len() > options.max_file_bytes => {
                tracing::debug!(path = %path.display(), bytes = m.len(), "skipping oversized tool source");
                continue;
            }
            Ok(_) => {}
            Err(_) => continue,
        }

        match std::fs::read_to_string(path) {
            Ok(text) => files.push(ToolSourceFile {
                path: path.to_path_buf(),
                text,
            }),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable tool source");
            }
        }
    }

    files
}

/// Scan every file independently and merge the results.
pub fn scan_tool_sources(files: &[ToolSourceFile], scanner: &dyn SourceScanner) -> ToolTableMap {
    let mut map = ToolTableMap::default();
    for file in files {
        let scanned = scanner.scan(&file.text);
        tracing::debug!(
            path = %file.path.display(),
            tools = scanned.tables_by_tool.len(),
            "scanned tool source"
        );
        map.merge(scanned);
    }
    map
}
