/*!
 * Quick comparison of a live tree against a snapshot
 *
 * This is the cheap consistency check: it walks the tree collecting file
 * sizes only, never hashing content. Useful for spotting drift before
 * deciding whether a full re-snapshot is worth the IO.
 */

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use indicatif::ProgressBar;
use walkdir::WalkDir;

use crate::error::Result;
use crate::paths;
use crate::types::{Entry, Snapshot};

/// A file whose recorded and observed sizes disagree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeMismatch {
    /// Relative path
    pub path: String,
    /// Size recorded in the snapshot
    pub recorded: u64,
    /// Size found on disk
    pub found: u64,
}

/// Outcome of a quick compare
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompareResult {
    /// Files on disk with no file entry in the snapshot
    pub extra: Vec<String>,
    /// File entries in the snapshot with no file on disk
    pub missing: Vec<String>,
    /// Files present on both sides with differing sizes
    pub different: Vec<SizeMismatch>,
}

impl CompareResult {
    /// True when the tree matches the snapshot at the size level
    pub fn is_clean(&self) -> bool {
        self.extra.is_empty() && self.missing.is_empty() && self.different.is_empty()
    }
}

/// Compare the files under `root` against `snapshot` by size only
pub fn quick_compare(
    root: &Path,
    snapshot: &Snapshot,
    progress: Arc<ProgressBar>,
) -> Result<CompareResult> {
    let root = fs::canonicalize(root)?;
    progress.set_message("scanning tree");

    let mut on_disk: BTreeMap<String, u64> = BTreeMap::new();
    for entry in WalkDir::new(&root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|error| crate::error::SnapError::Io(error.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = paths::to_rel_string(entry.path().strip_prefix(&root).map_err(|_| {
            crate::error!(Path, "entry escapes root: {}", entry.path().display())
        })?)?;
        on_disk.insert(rel, entry.metadata().map(|m| m.len()).unwrap_or(0));
        progress.inc(1);
    }

    let mut result = CompareResult::default();
    for (path, size) in &on_disk {
        match snapshot.entries.get(path) {
            Some(Entry::File(file)) => {
                if file.size != *size {
                    result.different.push(SizeMismatch {
                        path: path.clone(),
                        recorded: file.size,
                        found: *size,
                    });
                }
            }
            _ => result.extra.push(path.clone()),
        }
    }
    for (path, entry) in &snapshot.entries {
        if entry.as_file().is_some() && !on_disk.contains_key(path) {
            result.missing.push(path.clone());
        }
    }

    progress.finish_with_message("compare complete");
    Ok(result)
}
