/*!
 * Patch application: replays a [`Diff`] onto a live destination tree
 *
 * Changes are reordered into four phases before anything touches the
 * filesystem: kind flips, removals (deepest first), additions (directories
 * before files, shallowest first), then content edits. Conflicts never
 * abort the patch; the obstructing entry is renamed to a `.bak[N]` sibling
 * and the audit record carries the chosen name.
 */

use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::hash;
use crate::paths;
use crate::types::{Change, Diff, EntryKind};

/// Outcome of applying one change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyStatus {
    /// Applied as described by the diff
    Ok,
    /// Destination already carried the target content
    OkUnchanged,
    /// Destination already carried the target kind
    OkExists,
    /// Content edit landed on a missing file; it was added instead
    OkAdded,
    /// Content edit overwrote the expected old content
    OkChanged,
    /// Destination content matched neither side; renamed aside
    ContentConflict,
    /// Destination kind did not match either side; renamed aside
    TypeConflict,
    /// Directory removal found leftover entries; renamed aside
    ConflictNonempty,
}

impl fmt::Display for ApplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            ApplyStatus::Ok => "ok",
            ApplyStatus::OkUnchanged => "ok_unchanged",
            ApplyStatus::OkExists => "ok_exists",
            ApplyStatus::OkAdded => "ok_added",
            ApplyStatus::OkChanged => "ok_changed",
            ApplyStatus::ContentConflict => "content_conflict",
            ApplyStatus::TypeConflict => "type_conflict",
            ApplyStatus::ConflictNonempty => "conflict_nonempty",
        };
        f.write_str(token)
    }
}

/// One audit entry, in application order
///
/// `Display` renders the exact audit line:
/// `FROM->TO:STATUS:PATH` or `FROM->TO:STATUS:PATH ==> ALT_PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRecord {
    /// Kind on the before side
    pub from: EntryKind,
    /// Kind on the after side
    pub to: EntryKind,
    /// What actually happened on the destination
    pub status: ApplyStatus,
    /// Relative path of the change
    pub path: String,
    /// Sibling an obstructing entry was renamed to, if any
    pub renamed_to: Option<String>,
}

impl fmt::Display for ApplyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}:{}:{}", self.from, self.to, self.status, self.path)?;
        if let Some(alt) = &self.renamed_to {
            write!(f, " ==> {}", alt)?;
        }
        Ok(())
    }
}

/// What currently occupies a destination path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DestState {
    Missing,
    File,
    Dir,
    /// Symlink, socket, device: anything the snapshot model does not carry
    Other,
}

/// Applies diffs onto a destination tree, reading file bytes from a
/// path-compatible data source
pub struct Patcher {
    dest: PathBuf,
    source: PathBuf,
}

impl Patcher {
    /// Create a patcher writing into `dest` and reading bytes from `source`
    pub fn new(dest: &Path, source: &Path) -> Self {
        Self {
            dest: dest.to_path_buf(),
            source: source.to_path_buf(),
        }
    }

    /// Apply every change in phase order, writing one audit line per change
    ///
    /// Conflicts are resolved in-band and reported through the audit
    /// records; IO failures abort with whatever lines were already written.
    pub fn apply<W: Write>(&self, diff: &Diff, log: &mut W) -> Result<Vec<ApplyRecord>> {
        // Reject malformed documents before mutating anything.
        for change in &diff.changes {
            if change.from == change.to && change.from != EntryKind::File {
                return Err(crate::error!(
                    Patch,
                    "invalid change {}->{} at {}",
                    change.from,
                    change.to,
                    change.path
                ));
            }
        }

        let mut records = Vec::with_capacity(diff.changes.len());
        for change in phase_order(diff) {
            let record = self.apply_change(change)?;
            writeln!(log, "{}", record)?;
            records.push(record);
        }
        Ok(records)
    }

    fn apply_change(&self, change: &Change) -> Result<ApplyRecord> {
        match (change.from, change.to) {
            (EntryKind::Absent, EntryKind::File) => self.add_file(change),
            (EntryKind::Absent, EntryKind::Dir) => self.add_dir(change),
            (EntryKind::File, EntryKind::Absent) => self.remove_file(change),
            (EntryKind::Dir, EntryKind::Absent) => self.remove_dir(change),
            (EntryKind::File, EntryKind::File) => self.edit_file(change),
            (EntryKind::File, EntryKind::Dir) => self.flip_to_dir(change),
            (EntryKind::Dir, EntryKind::File) => self.flip_to_file(change),
            (from, to) => Err(crate::error!(
                Patch,
                "unsupported change {}->{} at {}",
                from,
                to,
                change.path
            )),
        }
    }

    fn add_file(&self, change: &Change) -> Result<ApplyRecord> {
        let path = &change.path;
        match self.dest_state(path)? {
            DestState::Missing => {
                self.copy_in(path)?;
                Ok(record(change, ApplyStatus::Ok, None))
            }
            DestState::File => {
                if self.dest_matches(path, after_hash(change))? {
                    return Ok(record(change, ApplyStatus::OkUnchanged, None));
                }
                let alt = self.rename_aside(path)?;
                self.copy_in(path)?;
                Ok(record(change, ApplyStatus::ContentConflict, Some(alt)))
            }
            DestState::Dir | DestState::Other => {
                let alt = self.rename_aside(path)?;
                self.copy_in(path)?;
                Ok(record(change, ApplyStatus::TypeConflict, Some(alt)))
            }
        }
    }

    fn add_dir(&self, change: &Change) -> Result<ApplyRecord> {
        let path = &change.path;
        match self.dest_state(path)? {
            DestState::Missing => {
                fs::create_dir_all(self.dest_path(path))?;
                Ok(record(change, ApplyStatus::Ok, None))
            }
            DestState::Dir => Ok(record(change, ApplyStatus::OkExists, None)),
            DestState::File | DestState::Other => {
                let alt = self.rename_aside(path)?;
                fs::create_dir_all(self.dest_path(path))?;
                Ok(record(change, ApplyStatus::TypeConflict, Some(alt)))
            }
        }
    }

    fn remove_file(&self, change: &Change) -> Result<ApplyRecord> {
        let path = &change.path;
        match self.dest_state(path)? {
            DestState::Missing => Ok(record(change, ApplyStatus::Ok, None)),
            DestState::File => {
                if self.dest_matches(path, before_hash(change))? {
                    fs::remove_file(self.dest_path(path))?;
                    return Ok(record(change, ApplyStatus::Ok, None));
                }
                let alt = self.rename_aside(path)?;
                Ok(record(change, ApplyStatus::ContentConflict, Some(alt)))
            }
            DestState::Dir | DestState::Other => {
                let alt = self.rename_aside(path)?;
                Ok(record(change, ApplyStatus::TypeConflict, Some(alt)))
            }
        }
    }

    fn remove_dir(&self, change: &Change) -> Result<ApplyRecord> {
        let path = &change.path;
        match self.dest_state(path)? {
            DestState::Missing => Ok(record(change, ApplyStatus::Ok, None)),
            DestState::Dir => {
                let target = self.dest_path(path);
                if fs::read_dir(&target)?.next().is_none() {
                    fs::remove_dir(&target)?;
                    return Ok(record(change, ApplyStatus::Ok, None));
                }
                // Leftovers: pre-existing extras or entries renamed aside
                // by earlier changes. Keep them all.
                let alt = self.rename_aside(path)?;
                Ok(record(change, ApplyStatus::ConflictNonempty, Some(alt)))
            }
            DestState::File | DestState::Other => {
                let alt = self.rename_aside(path)?;
                Ok(record(change, ApplyStatus::TypeConflict, Some(alt)))
            }
        }
    }

    fn edit_file(&self, change: &Change) -> Result<ApplyRecord> {
        let path = &change.path;
        match self.dest_state(path)? {
            DestState::Missing => {
                self.copy_in(path)?;
                Ok(record(change, ApplyStatus::OkAdded, None))
            }
            DestState::File => {
                let digest = hash::digest_file(&self.dest_path(path))?;
                if Some(digest.as_str()) == after_hash(change) {
                    return Ok(record(change, ApplyStatus::OkUnchanged, None));
                }
                if Some(digest.as_str()) == before_hash(change) {
                    self.copy_in(path)?;
                    return Ok(record(change, ApplyStatus::OkChanged, None));
                }
                let alt = self.rename_aside(path)?;
                self.copy_in(path)?;
                Ok(record(change, ApplyStatus::ContentConflict, Some(alt)))
            }
            DestState::Dir | DestState::Other => {
                let alt = self.rename_aside(path)?;
                self.copy_in(path)?;
                Ok(record(change, ApplyStatus::TypeConflict, Some(alt)))
            }
        }
    }

    fn flip_to_dir(&self, change: &Change) -> Result<ApplyRecord> {
        let path = &change.path;
        match self.dest_state(path)? {
            DestState::File => {
                fs::remove_file(self.dest_path(path))?;
                fs::create_dir_all(self.dest_path(path))?;
                Ok(record(change, ApplyStatus::Ok, None))
            }
            DestState::Dir => Ok(record(change, ApplyStatus::OkExists, None)),
            DestState::Missing => {
                fs::create_dir_all(self.dest_path(path))?;
                Ok(record(change, ApplyStatus::Ok, None))
            }
            DestState::Other => {
                let alt = self.rename_aside(path)?;
                fs::create_dir_all(self.dest_path(path))?;
                Ok(record(change, ApplyStatus::TypeConflict, Some(alt)))
            }
        }
    }

    fn flip_to_file(&self, change: &Change) -> Result<ApplyRecord> {
        let path = &change.path;
        match self.dest_state(path)? {
            DestState::Dir => {
                // Descendant removals run later and will find nothing,
                // which they report as clean no-ops.
                fs::remove_dir_all(self.dest_path(path))?;
                self.copy_in(path)?;
                Ok(record(change, ApplyStatus::Ok, None))
            }
            DestState::File => Ok(record(change, ApplyStatus::OkExists, None)),
            DestState::Missing => {
                self.copy_in(path)?;
                Ok(record(change, ApplyStatus::Ok, None))
            }
            DestState::Other => {
                let alt = self.rename_aside(path)?;
                self.copy_in(path)?;
                Ok(record(change, ApplyStatus::TypeConflict, Some(alt)))
            }
        }
    }

    /// Move whatever sits at `rel` to the first free `.bak[N]` sibling
    ///
    /// The renamed entry keeps its kind; the shortened-name rule applies
    /// when the suffixed name would exceed the component limit.
    fn rename_aside(&self, rel: &str) -> Result<String> {
        let (parent, name) = paths::split(rel);
        let mut counter: u32 = 1;
        loop {
            let suffix = if counter == 1 {
                ".bak".to_string()
            } else {
                format!(".bak{}", counter)
            };
            let alt_rel = paths::join(parent, &paths::clamp_suffixed(name, &suffix));
            let alt_abs = self.dest_path(&alt_rel);
            if fs::symlink_metadata(&alt_abs).is_err() {
                fs::rename(self.dest_path(rel), &alt_abs).map_err(|error| {
                    crate::error!(Patch, "cannot rename {} aside: {}", rel, error)
                })?;
                return Ok(alt_rel);
            }
            counter += 1;
        }
    }

    /// Copy `source/rel` over `dest/rel`, creating missing parents
    fn copy_in(&self, rel: &str) -> Result<()> {
        let target = self.dest_path(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(paths::under(&self.source, rel), &target).map_err(|error| {
            crate::error!(Patch, "cannot copy {} from data source: {}", rel, error)
        })?;
        Ok(())
    }

    /// True when the destination file's digest equals `expected`
    fn dest_matches(&self, rel: &str, expected: Option<&str>) -> Result<bool> {
        let digest = hash::digest_file(&self.dest_path(rel))?;
        Ok(Some(digest.as_str()) == expected)
    }

    fn dest_path(&self, rel: &str) -> PathBuf {
        paths::under(&self.dest, rel)
    }

    fn dest_state(&self, rel: &str) -> Result<DestState> {
        match fs::symlink_metadata(self.dest_path(rel)) {
            Ok(metadata) => {
                let file_type = metadata.file_type();
                if file_type.is_dir() {
                    Ok(DestState::Dir)
                } else if file_type.is_file() {
                    Ok(DestState::File)
                } else {
                    Ok(DestState::Other)
                }
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(DestState::Missing),
            Err(error) => Err(error.into()),
        }
    }
}

/// Reorder changes into the four application phases
///
/// 1. kind flips on existing paths, so later changes see the right parent
///    kind; 2. removals, deepest first; 3. directory additions then file
///    additions, shallowest first; 4. content edits.
fn phase_order(diff: &Diff) -> Vec<&Change> {
    let mut flips = Vec::new();
    let mut removals = Vec::new();
    let mut dir_adds = Vec::new();
    let mut file_adds = Vec::new();
    let mut edits = Vec::new();

    for change in &diff.changes {
        match (change.from, change.to) {
            (EntryKind::File, EntryKind::Dir) | (EntryKind::Dir, EntryKind::File) => {
                flips.push(change)
            }
            (_, EntryKind::Absent) => removals.push(change),
            (EntryKind::Absent, EntryKind::Dir) => dir_adds.push(change),
            (EntryKind::Absent, EntryKind::File) => file_adds.push(change),
            (EntryKind::File, EntryKind::File) => edits.push(change),
            _ => {}
        }
    }

    flips.sort_by(|a, b| a.path.cmp(&b.path));
    removals.sort_by(|a, b| b.depth().cmp(&a.depth()).then_with(|| a.path.cmp(&b.path)));
    dir_adds.sort_by(|a, b| a.path.cmp(&b.path));
    file_adds.sort_by(|a, b| a.path.cmp(&b.path));
    edits.sort_by(|a, b| a.path.cmp(&b.path));

    let mut ordered = flips;
    ordered.extend(removals);
    ordered.extend(dir_adds);
    ordered.extend(file_adds);
    ordered.extend(edits);
    ordered
}

fn record(change: &Change, status: ApplyStatus, renamed_to: Option<String>) -> ApplyRecord {
    ApplyRecord {
        from: change.from,
        to: change.to,
        status,
        path: change.path.clone(),
        renamed_to,
    }
}

fn before_hash(change: &Change) -> Option<&str> {
    change
        .before
        .as_ref()
        .and_then(|entry| entry.as_file())
        .map(|file| file.hash.as_str())
}

fn after_hash(change: &Change) -> Option<&str> {
    change
        .after
        .as_ref()
        .and_then(|entry| entry.as_file())
        .map(|file| file.hash.as_str())
}
