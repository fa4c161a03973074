/*!
 * Structural diff of two snapshots
 *
 * The differ walks the union of paths and compares kinds. File identity is
 * the content fingerprint alone; size and mtime exist only to speed up
 * snapshot reuse and never produce changes by themselves.
 */

use std::collections::BTreeSet;

use crate::types::{Change, Diff, EntryKind, Snapshot};

/// Compute the changes that turn `before` into `after`
///
/// Emitted changes are sorted by path; the patch applier imposes its own
/// phase order during application.
pub fn diff_snapshots(before: &Snapshot, after: &Snapshot) -> Diff {
    let paths: BTreeSet<&str> = before
        .entries
        .keys()
        .chain(after.entries.keys())
        .map(String::as_str)
        .collect();

    let mut changes = Vec::new();
    for path in paths {
        let from = before.kind_of(path);
        let to = after.kind_of(path);

        if from == to {
            if from == EntryKind::File {
                let old = before.entries[path].as_file();
                let new = after.entries[path].as_file();
                if let (Some(old), Some(new)) = (old, new) {
                    if old.hash != new.hash {
                        changes.push(Change {
                            path: path.to_string(),
                            from,
                            to,
                            before: before.entries.get(path).cloned(),
                            after: after.entries.get(path).cloned(),
                        });
                    }
                }
            }
            // Two directories at the same path are always equal.
            continue;
        }

        changes.push(Change {
            path: path.to_string(),
            from,
            to,
            before: before.entries.get(path).cloned(),
            after: after.entries.get(path).cloned(),
        });
    }

    Diff::new(changes)
}
