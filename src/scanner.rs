/*!
 * Snapshot builder: walks a directory tree and captures it as a [`Snapshot`]
 *
 * The walk runs in two passes. The first pass indexes the tree, decides
 * which files can reuse a prior fingerprint, and totals the bytes that
 * still need hashing so progress is meaningful. The second pass streams
 * those files through SHA-256, optionally in parallel.
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use indicatif::ProgressBar;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::Result;
use crate::hash;
use crate::paths;
use crate::types::{Entry, FileEntry, Snapshot};
use crate::utils::format_file_size;

/// A file that must be hashed during the second pass
struct HashJob {
    rel: String,
    abs: PathBuf,
    size: u64,
    mtime: i64,
}

/// Builder for directory snapshots
pub struct Scanner {
    /// Root directory to capture
    root: PathBuf,
    /// Prior snapshot used to skip re-hashing unchanged files
    prior: Option<Snapshot>,
    /// Testing hook: replaces every emitted timestamp
    time_override: Option<i64>,
    /// Progress bar (hidden when progress is disabled)
    progress: Arc<ProgressBar>,
}

impl Scanner {
    /// Create a new scanner for `root`
    pub fn new(root: &Path, progress: Arc<ProgressBar>) -> Self {
        Self {
            root: root.to_path_buf(),
            prior: None,
            time_override: None,
            progress,
        }
    }

    /// Supply a prior snapshot; files whose (size, mtime) match it adopt
    /// its fingerprint without being re-read
    pub fn with_prior(mut self, prior: Option<Snapshot>) -> Self {
        self.prior = prior;
        self
    }

    /// Replace every emitted timestamp with a constant
    pub fn with_time_override(mut self, time_override: Option<i64>) -> Self {
        self.time_override = time_override;
        self
    }

    /// Walk the tree and capture it
    ///
    /// Fails on the first unreadable file or directory; partial snapshots
    /// are never produced.
    pub fn scan(&self) -> Result<Snapshot> {
        let root = fs::canonicalize(&self.root)?;
        if !root.is_dir() {
            return Err(crate::error!(
                PathNotFound,
                "{} is not a directory",
                root.display()
            ));
        }

        self.progress.set_message("indexing tree");
        let mut snapshot = Snapshot::new(root.display().to_string(), self.capture_time());
        let mut jobs = Vec::new();

        for entry in WalkDir::new(&root).min_depth(1).follow_links(false) {
            let entry = entry.map_err(io_from_walkdir)?;
            let rel = paths::to_rel_string(entry.path().strip_prefix(&root).map_err(|_| {
                crate::error!(Path, "entry escapes root: {}", entry.path().display())
            })?)?;

            let file_type = entry.file_type();
            if file_type.is_dir() {
                snapshot.entries.insert(rel, Entry::Dir);
            } else if file_type.is_file() {
                let metadata = entry.metadata().map_err(io_from_walkdir)?;
                let size = metadata.len();
                let mtime = system_time_secs(metadata.modified()?);

                match self.reusable_entry(&rel, size, mtime) {
                    Some(entry) => {
                        snapshot.entries.insert(rel, entry);
                    }
                    None => jobs.push(HashJob {
                        rel,
                        abs: entry.path().to_path_buf(),
                        size,
                        mtime,
                    }),
                }
            }
            // Symlinks, sockets and other kinds are not captured.
        }

        let total: u64 = jobs.iter().map(|job| job.size).sum();
        self.progress.set_length(total);
        self.progress
            .set_message(format!("hashing {} of content", format_file_size(total)));

        let hashed = jobs
            .into_par_iter()
            .map(|job| {
                let hash = hash::digest_file(&job.abs)?;
                self.progress.inc(job.size);
                Ok((
                    job.rel,
                    Entry::File(FileEntry {
                        size: job.size,
                        mtime: self.time_override.unwrap_or(job.mtime),
                        hash,
                    }),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        snapshot.entries.extend(hashed);
        self.progress.finish_with_message("snapshot complete");
        Ok(snapshot)
    }

    /// Prior entry to adopt for `rel`, when size and mtime both match
    fn reusable_entry(&self, rel: &str, size: u64, mtime: i64) -> Option<Entry> {
        let prior = self.prior.as_ref()?;
        let file = prior.entries.get(rel)?.as_file()?;
        if file.size != size || file.mtime != mtime {
            return None;
        }
        Some(Entry::File(FileEntry {
            size: file.size,
            mtime: self.time_override.unwrap_or(file.mtime),
            hash: file.hash.clone(),
        }))
    }

    /// Capture timestamp for the snapshot header
    fn capture_time(&self) -> String {
        match self.time_override {
            Some(secs) => chrono::DateTime::from_timestamp(secs, 0)
                .map(|time| time.to_rfc3339())
                .unwrap_or_else(|| secs.to_string()),
            None => chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Seconds since the Unix epoch, signed so pre-epoch mtimes survive
fn system_time_secs(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as i64,
        Err(before_epoch) => -(before_epoch.duration().as_secs() as i64),
    }
}

fn io_from_walkdir(error: walkdir::Error) -> crate::error::SnapError {
    crate::error::SnapError::Io(error.into())
}
