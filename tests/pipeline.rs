/*!
 * End-to-end test of the snapshot -> diff -> patch pipeline through the CLI
 */

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

use snapfs::{Diff, Snapshot};

fn snapfs() -> Command {
    Command::new(env!("CARGO_BIN_EXE_snapfs"))
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut file = File::create(path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
}

fn copy_tree(src: &Path, dst: &Path) {
    fs::create_dir_all(dst).unwrap();
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let target = dst.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

fn take_snapshot(root: &Path, out: &Path, prior: Option<&Path>) {
    let mut cmd = snapfs();
    cmd.arg(format!("--take_snapshot={}", root.display()))
        .arg(format!("--snapshot_out={}", out.display()))
        .arg("--noprogress_bar")
        .arg("--testonly_json_time_override=0");
    if let Some(prior) = prior {
        cmd.arg(format!("--snapshot_in={}", prior.display()));
    }
    let status = cmd.status().unwrap();
    assert!(status.success());
}

#[test]
fn test_snapshot_diff_apply_pipeline() {
    let temp = tempdir().unwrap();
    let before_dir = temp.path().join("before");
    let after_dir = temp.path().join("after");
    let dst = temp.path().join("dst");

    write_file(&before_dir.join("a.txt"), "a\n");
    write_file(&before_dir.join("sub/keep.txt"), "k\n");
    write_file(&after_dir.join("a.txt"), "changed\n");
    write_file(&after_dir.join("sub/keep.txt"), "k\n");
    write_file(&after_dir.join("new.txt"), "n\n");
    copy_tree(&before_dir, &dst);

    let before_json = temp.path().join("before.json");
    let after_json = temp.path().join("after.json");
    take_snapshot(&before_dir, &before_json, None);
    take_snapshot(&after_dir, &after_json, None);

    // Diff goes to stdout as a JSON document.
    let output = snapfs()
        .arg(format!("--diff_snapshot={}", before_json.display()))
        .arg(format!("--snapshot_in={}", after_json.display()))
        .output()
        .unwrap();
    assert!(output.status.success());
    let diff: Diff = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(diff.changes.len(), 2);

    let diff_json = temp.path().join("diff.json");
    fs::write(&diff_json, &output.stdout).unwrap();

    // Audit log goes to stdout, one line per change, in phase order.
    let output = snapfs()
        .arg(format!("--apply_patch={}", diff_json.display()))
        .arg(format!("--patch_on={}", dst.display()))
        .arg(format!("--data_source={}", after_dir.display()))
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "absent->file:ok:new.txt\nfile->file:ok_changed:a.txt\n"
    );

    assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "changed\n");
    assert_eq!(fs::read_to_string(dst.join("new.txt")).unwrap(), "n\n");
    assert_eq!(
        fs::read_to_string(dst.join("sub/keep.txt")).unwrap(),
        "k\n"
    );

    // The patched tree now snapshots identically to the after tree.
    let patched_json = temp.path().join("patched.json");
    take_snapshot(&dst, &patched_json, None);
    let patched = Snapshot::load(&patched_json).unwrap();
    let after = Snapshot::load(&after_json).unwrap();
    assert_eq!(patched.entries, after.entries);
}

#[test]
fn test_snapshot_reuse_accepts_prior_file() {
    let temp = tempdir().unwrap();
    let tree = temp.path().join("tree");
    write_file(&tree.join("a.txt"), "a\n");

    // No time override here: reuse keys on the real (size, mtime) pair.
    let first = temp.path().join("first.json");
    let second = temp.path().join("second.json");
    for (out, prior) in [(&first, None), (&second, Some(&first))] {
        let mut cmd = snapfs();
        cmd.arg(format!("--take_snapshot={}", tree.display()))
            .arg(format!("--snapshot_out={}", out.display()))
            .arg("--noprogress_bar");
        if let Some(prior) = prior {
            cmd.arg(format!("--snapshot_in={}", prior.display()));
        }
        assert!(cmd.status().unwrap().success());
    }

    let first = Snapshot::load(&first).unwrap();
    let second = Snapshot::load(&second).unwrap();
    assert_eq!(first.entries, second.entries);
}

#[test]
fn test_missing_companion_flag_fails() {
    let output = snapfs().arg("--take_snapshot=somewhere").output().unwrap();
    assert!(!output.status.success());
}
