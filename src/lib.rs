/*!
 * snapfs - directory-tree snapshot, diff, and patch engine
 *
 * This library captures the structural and content state of a directory
 * tree into a portable JSON snapshot, computes structural deltas between
 * snapshots, and replays a delta onto a live tree with a deterministic
 * rename-aside conflict policy.
 */

pub mod compare;
pub mod config;
pub mod diff;
pub mod error;
pub mod hash;
pub mod patch;
pub mod paths;
pub mod report;
pub mod scanner;
pub mod types;
pub mod utils;


// Re-export main components for easier access
pub use compare::{quick_compare, CompareResult};
pub use config::{Args, Config, Mode};
pub use diff::diff_snapshots;
pub use error::{Result, SnapError};
pub use patch::{ApplyRecord, ApplyStatus, Patcher};
pub use report::{CompareReport, PatchReport, ReportFormat, Reporter};
pub use scanner::Scanner;
pub use types::{Change, Diff, Entry, EntryKind, FileEntry, Snapshot};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
