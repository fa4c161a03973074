/*!
 * Configuration handling for snapfs
 */

use std::path::{Path, PathBuf};

use clap::Parser;
use clap_complete::Shell;

use crate::bail;
use crate::error::Result;

/// Command-line arguments for snapfs
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "snapfs",
    version = env!("CARGO_PKG_VERSION"),
    about = "Directory-tree snapshot, diff, and patch engine",
    long_about = "Captures a directory tree into a JSON snapshot with per-file content \
fingerprints, computes structural diffs between snapshots, and replays a diff onto a \
live tree using a content-addressed data source."
)]
pub struct Args {
    /// Take a snapshot of this directory (writes to --snapshot_out)
    #[clap(long = "take_snapshot", value_name = "DIR")]
    pub take_snapshot: Option<PathBuf>,

    /// Diff this before-snapshot against --snapshot_in; JSON goes to stdout
    #[clap(long = "diff_snapshot", value_name = "FILE")]
    pub diff_snapshot: Option<PathBuf>,

    /// Apply this diff onto --patch_on using --data_source; audit log goes to stdout
    #[clap(long = "apply_patch", value_name = "FILE")]
    pub apply_patch: Option<PathBuf>,

    /// Compare this directory against --snapshot_in by file size only
    #[clap(long = "quick_compare", value_name = "DIR")]
    pub quick_compare: Option<PathBuf>,

    /// Snapshot file to read (prior snapshot, after-side of a diff, or compare base)
    #[clap(long = "snapshot_in", value_name = "FILE")]
    pub snapshot_in: Option<PathBuf>,

    /// Snapshot file to write
    #[clap(long = "snapshot_out", value_name = "FILE")]
    pub snapshot_out: Option<PathBuf>,

    /// Destination tree mutated by --apply_patch
    #[clap(long = "patch_on", value_name = "DIR")]
    pub patch_on: Option<PathBuf>,

    /// Directory supplying file bytes for additions and content changes
    #[clap(long = "data_source", value_name = "DIR")]
    pub data_source: Option<PathBuf>,

    /// Disable the progress bar
    #[clap(long = "noprogress_bar")]
    pub noprogress_bar: bool,

    /// Replace every emitted timestamp with this epoch value; empty means off
    #[clap(long = "testonly_json_time_override", value_name = "SECS")]
    pub testonly_json_time_override: Option<String>,

    /// Number of threads to use for hashing
    #[clap(long, default_value = "4")]
    pub threads: usize,

    /// Generate shell completions
    #[clap(long = "generate", value_enum)]
    pub generate: Option<Shell>,
}

/// The operation a single invocation performs
#[derive(Debug, Clone)]
pub enum Mode {
    /// Capture a directory into a snapshot file
    TakeSnapshot {
        /// Directory to capture
        root: PathBuf,
        /// Snapshot file to write
        out: PathBuf,
        /// Prior snapshot enabling fingerprint reuse
        prior: Option<PathBuf>,
    },
    /// Diff two snapshot files
    DiffSnapshot {
        /// Before-side snapshot file
        before: PathBuf,
        /// After-side snapshot file
        after: PathBuf,
    },
    /// Apply a diff onto a live tree
    ApplyPatch {
        /// Diff file to apply
        diff: PathBuf,
        /// Destination tree
        dest: PathBuf,
        /// Data source tree
        source: PathBuf,
    },
    /// Size-only comparison of a tree against a snapshot
    QuickCompare {
        /// Directory to scan
        root: PathBuf,
        /// Snapshot file to compare against
        snapshot: PathBuf,
    },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Resolved operation
    pub mode: Mode,
    /// Whether to render a progress bar
    pub progress_bar: bool,
    /// Testing hook: constant replacing every emitted timestamp
    pub time_override: Option<i64>,
    /// Number of threads for the hashing pool
    pub num_threads: usize,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let mode = Self::resolve_mode(&args)?;
        let time_override = match args.testonly_json_time_override.as_deref() {
            None | Some("") => None,
            Some(value) => Some(value.parse::<i64>().map_err(|_| {
                crate::error!(
                    InvalidArgument,
                    "--testonly_json_time_override must be an integer or empty, got {:?}",
                    value
                )
            })?),
        };

        Ok(Self {
            mode,
            progress_bar: !args.noprogress_bar,
            time_override,
            num_threads: args.threads,
        })
    }

    fn resolve_mode(args: &Args) -> Result<Mode> {
        let selected = [
            args.take_snapshot.is_some(),
            args.diff_snapshot.is_some(),
            args.apply_patch.is_some(),
            args.quick_compare.is_some(),
        ]
        .iter()
        .filter(|given| **given)
        .count();
        if selected != 1 {
            bail!(
                InvalidArgument,
                "exactly one of --take_snapshot, --diff_snapshot, --apply_patch, \
--quick_compare must be given"
            );
        }

        if let Some(root) = &args.take_snapshot {
            let out = args.snapshot_out.clone().ok_or_else(|| {
                crate::error!(InvalidArgument, "--take_snapshot requires --snapshot_out")
            })?;
            return Ok(Mode::TakeSnapshot {
                root: root.clone(),
                out,
                prior: args.snapshot_in.clone(),
            });
        }
        if let Some(before) = &args.diff_snapshot {
            let after = args.snapshot_in.clone().ok_or_else(|| {
                crate::error!(InvalidArgument, "--diff_snapshot requires --snapshot_in")
            })?;
            return Ok(Mode::DiffSnapshot {
                before: before.clone(),
                after,
            });
        }
        if let Some(diff) = &args.apply_patch {
            let dest = args.patch_on.clone().ok_or_else(|| {
                crate::error!(InvalidArgument, "--apply_patch requires --patch_on")
            })?;
            let source = args.data_source.clone().ok_or_else(|| {
                crate::error!(InvalidArgument, "--apply_patch requires --data_source")
            })?;
            return Ok(Mode::ApplyPatch {
                diff: diff.clone(),
                dest,
                source,
            });
        }
        if let Some(root) = &args.quick_compare {
            let snapshot = args.snapshot_in.clone().ok_or_else(|| {
                crate::error!(InvalidArgument, "--quick_compare requires --snapshot_in")
            })?;
            return Ok(Mode::QuickCompare {
                root: root.clone(),
                snapshot,
            });
        }

        unreachable!("mode count was checked above")
    }

    /// Validate the configuration against the filesystem
    pub fn validate(&self) -> Result<()> {
        match &self.mode {
            Mode::TakeSnapshot { root, out, prior } => {
                require_dir(root)?;
                if let Some(parent) = out.parent() {
                    if parent != Path::new("") && !parent.exists() {
                        bail!(PathNotFound, "output directory {}", parent.display());
                    }
                }
                if let Some(prior) = prior {
                    require_file(prior)?;
                }
            }
            Mode::DiffSnapshot { before, after } => {
                require_file(before)?;
                require_file(after)?;
            }
            Mode::ApplyPatch { diff, dest, source } => {
                require_file(diff)?;
                require_dir(dest)?;
                require_dir(source)?;
            }
            Mode::QuickCompare { root, snapshot } => {
                require_dir(root)?;
                require_file(snapshot)?;
            }
        }
        Ok(())
    }
}

fn require_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        bail!(PathNotFound, "directory {}", path.display());
    }
    Ok(())
}

fn require_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!(PathNotFound, "file {}", path.display());
    }
    Ok(())
}
