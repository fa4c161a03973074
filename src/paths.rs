/*!
 * Relative-path utilities
 *
 * Snapshot paths are `/`-joined UTF-8 strings relative to the capture root.
 * The empty string denotes the root itself. This module also implements the
 * name-shortening rule for filesystems with a 255-byte component limit.
 */

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Hard per-component byte limit of the target filesystems
pub const COMPONENT_MAX: usize = 255;

/// Literal marker inserted where a shortened name drops characters
pub const OMIT_MARKER: &str = "(omit)";

/// Join a parent path and a child name
///
/// An empty parent denotes the root, so the child name is the whole path.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Split a path into (parent, final component)
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Number of components in a relative path (0 for the root)
pub fn depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.split('/').count()
    }
}

/// Convert a relative `Path` into a `/`-joined UTF-8 string
///
/// Non-UTF-8 names are rejected rather than lossily converted: replacement
/// characters could map two distinct names onto one snapshot key.
pub fn to_rel_string(path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        let name = component.as_os_str().to_str().ok_or_else(|| {
            crate::error!(Path, "non-UTF-8 path not supported: {:?}", path)
        })?;
        parts.push(name);
    }
    Ok(parts.join("/"))
}

/// Resolve a relative snapshot path below a filesystem root
pub fn under(root: &Path, rel: &str) -> PathBuf {
    let mut out = root.to_path_buf();
    for part in rel.split('/') {
        out.push(part);
    }
    out
}

/// Append `suffix` to `name`, shortening `name` if the result would exceed
/// the 255-byte component limit
///
/// The kept head always ends on a code-point boundary, and the literal
/// `(omit)` marker records that characters were dropped:
/// `head + "(omit)" + suffix`, with the total within [`COMPONENT_MAX`].
pub fn clamp_suffixed(name: &str, suffix: &str) -> String {
    if name.len() + suffix.len() <= COMPONENT_MAX {
        return format!("{}{}", name, suffix);
    }

    let budget = COMPONENT_MAX
        .saturating_sub(OMIT_MARKER.len())
        .saturating_sub(suffix.len());
    let mut cut = budget.min(name.len());
    while cut > 0 && !name.is_char_boundary(cut) {
        cut -= 1;
    }

    format!("{}{}{}", &name[..cut], OMIT_MARKER, suffix)
}
