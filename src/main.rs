/*!
 * Command-line interface for snapfs
 */

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;

use snapfs::error::Result;
use snapfs::{
    diff_snapshots, quick_compare, Args, CompareReport, Config, Diff, Mode, PatchReport, Patcher,
    ReportFormat, Reporter, Scanner, Snapshot,
};

/// Generate shell completions
fn print_completions(generator: Shell, cmd: &mut clap::Command) {
    generate(
        generator,
        cmd,
        cmd.get_name().to_string(),
        &mut io::stdout(),
    );
}

/// Progress bar sized in bytes, for the hashing pass
fn byte_progress(enabled: bool) -> Result<Arc<ProgressBar>> {
    if !enabled {
        return Ok(Arc::new(ProgressBar::hidden()));
    }
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} {prefix:.bold.cyan} {wide_msg:.dim.white} \
[{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            )
            .map_err(|e| snapfs::error!(Config, "failed to create progress style: {}", e))?,
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(Arc::new(bar))
}

/// Spinner-style progress for passes that only count entries
fn spinner_progress(enabled: bool) -> Result<Arc<ProgressBar>> {
    if !enabled {
        return Ok(Arc::new(ProgressBar::hidden()));
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {wide_msg:.dim.white} {pos} entries")
            .map_err(|e| snapfs::error!(Config, "failed to create progress style: {}", e))?,
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(Arc::new(bar))
}

fn run_take_snapshot(
    config: &Config,
    root: &Path,
    out: &Path,
    prior: Option<&Path>,
) -> Result<()> {
    let prior = prior.map(Snapshot::load).transpose()?;
    let progress = byte_progress(config.progress_bar)?;
    progress.set_prefix("📸 Snapshot");

    let start = Instant::now();
    let snapshot = Scanner::new(root, progress)
        .with_prior(prior)
        .with_time_override(config.time_override)
        .scan()?;
    snapshot.save(out)?;

    eprintln!(
        "Wrote {} with {} entries in {:.4?}",
        out.display(),
        snapshot.entries.len(),
        start.elapsed()
    );
    Ok(())
}

fn run_diff_snapshot(before: &Path, after: &Path) -> Result<()> {
    let before = Snapshot::load(before)?;
    let after = Snapshot::load(after)?;
    let diff = diff_snapshots(&before, &after);

    let stdout = io::stdout();
    diff.to_writer(stdout.lock())?;
    eprintln!("{} changes", diff.changes.len());
    Ok(())
}

fn run_apply_patch(diff: &Path, dest: &Path, source: &Path) -> Result<()> {
    let diff = Diff::load(diff)?;
    let patcher = Patcher::new(dest, source);

    let stdout = io::stdout();
    let mut log = stdout.lock();
    let start = Instant::now();
    let records = patcher.apply(&diff, &mut log)?;
    log.flush()?;

    let report = PatchReport::from_records(&records, start.elapsed());
    Reporter::new(ReportFormat::ConsoleTable).print_patch_report(&report);
    Ok(())
}

fn run_quick_compare(config: &Config, root: &Path, snapshot: &Path) -> Result<()> {
    let snapshot = Snapshot::load(snapshot)?;
    let progress = spinner_progress(config.progress_bar)?;
    progress.set_prefix("🔎 Compare");

    let start = Instant::now();
    let result = quick_compare(root, &snapshot, progress)?;

    let report = CompareReport {
        duration: start.elapsed(),
        result,
    };
    Reporter::new(ReportFormat::ConsoleTable).print_compare_report(&report);
    Ok(())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Handle completions if requested
    if let Some(generator) = args.generate {
        let mut cmd = Args::command();
        eprintln!("Generating completion file for {generator:?}...");
        print_completions(generator, &mut cmd);
        return Ok(());
    }

    let config = Config::from_args(args)?;
    config.validate()?;

    // Configure thread pool
    if let Err(e) = ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build_global()
    {
        eprintln!("Warning: Failed to set thread pool size: {}", e);
    }

    match config.mode.clone() {
        Mode::TakeSnapshot { root, out, prior } => {
            run_take_snapshot(&config, &root, &out, prior.as_deref())
        }
        Mode::DiffSnapshot { before, after } => run_diff_snapshot(&before, &after),
        Mode::ApplyPatch { diff, dest, source } => run_apply_patch(&diff, &dest, &source),
        Mode::QuickCompare { root, snapshot } => run_quick_compare(&config, &root, &snapshot),
    }
}
