/*!
 * Core types and data structures for the snapfs engine
 */

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bail;
use crate::error::Result;

/// Format version written into snapshot and diff documents
pub const FORMAT_VERSION: u32 = 1;

/// The kind of a tree entry at a given path
///
/// `Absent` never appears inside a snapshot; it exists so a [`Change`] can
/// describe additions and removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// No entry at this path
    Absent,
    /// Regular file
    File,
    /// Directory
    Dir,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            EntryKind::Absent => "absent",
            EntryKind::File => "file",
            EntryKind::Dir => "dir",
        };
        f.write_str(token)
    }
}

/// Recorded state of a regular file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Size in bytes
    pub size: u64,
    /// Modification time, seconds since the Unix epoch (signed)
    pub mtime: i64,
    /// Lowercase hex SHA-256 of the file content
    pub hash: String,
}

/// A single snapshot entry: a file with its fingerprint, or a directory
///
/// Directories carry no payload; their children are encoded by path prefix
/// and empty directories are stored explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entry {
    /// Regular file entry
    File(FileEntry),
    /// Directory entry
    Dir,
}

impl Entry {
    /// The kind of this entry
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::File(_) => EntryKind::File,
            Entry::Dir => EntryKind::Dir,
        }
    }

    /// The file payload, if this entry is a file
    pub fn as_file(&self) -> Option<&FileEntry> {
        match self {
            Entry::File(file) => Some(file),
            Entry::Dir => None,
        }
    }
}

/// A path-keyed capture of every file and directory below a root
///
/// Paths are `/`-separated, relative, and never empty; the root itself is
/// not stored. The `BTreeMap` keeps serialization canonical, so two
/// captures of identical trees produce identical documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Document format version
    pub version: u32,
    /// Absolute root path at capture time (diagnostic only)
    pub root: String,
    /// Capture timestamp, RFC 3339 (diagnostic only)
    pub time: String,
    /// All entries, keyed by relative path
    pub entries: BTreeMap<String, Entry>,
}

impl Snapshot {
    /// Create an empty snapshot for the given root
    pub fn new(root: String, time: String) -> Self {
        Self {
            version: FORMAT_VERSION,
            root,
            time,
            entries: BTreeMap::new(),
        }
    }

    /// Kind of the entry stored at `path`, or `Absent`
    pub fn kind_of(&self, path: &str) -> EntryKind {
        self.entries
            .get(path)
            .map_or(EntryKind::Absent, Entry::kind)
    }

    /// Read a snapshot document from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;
        if snapshot.version != FORMAT_VERSION {
            bail!(
                Snapshot,
                "unsupported snapshot version {} in {}",
                snapshot.version,
                path.display()
            );
        }
        Ok(snapshot)
    }

    /// Write this snapshot as a JSON document
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// A single per-path transition between entry kinds
///
/// `from` and `to` always differ. `before`/`after` carry the snapshot entry
/// for each side that is not absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Relative path the transition applies to
    pub path: String,
    /// Kind in the `before` snapshot
    pub from: EntryKind,
    /// Kind in the `after` snapshot
    pub to: EntryKind,
    /// Entry on the `before` side, when not absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Entry>,
    /// Entry on the `after` side, when not absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Entry>,
}

impl Change {
    /// Number of path components, used for phase ordering
    pub fn depth(&self) -> usize {
        crate::paths::depth(&self.path)
    }
}

/// An ordered list of [`Change`]s between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    /// Document format version
    pub version: u32,
    /// The changes, sorted by path at emission
    pub changes: Vec<Change>,
}

impl Diff {
    /// Create a diff from a list of changes
    pub fn new(changes: Vec<Change>) -> Self {
        Self {
            version: FORMAT_VERSION,
            changes,
        }
    }

    /// True when the two snapshots were structurally identical
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Read a diff document from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read a diff document from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let diff: Diff = serde_json::from_reader(reader)?;
        if diff.version != FORMAT_VERSION {
            bail!(Snapshot, "unsupported diff version {}", diff.version);
        }
        Ok(diff)
    }

    /// Write this diff as a JSON document to any writer
    pub fn to_writer<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }
}
