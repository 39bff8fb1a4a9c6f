//! Lock regeneration through a real child process.
//!
//! A shell script stands in for `terraform` so the tests need no network.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tf_patcher::lock::{regenerate_lock, LockError, LockRunner, TerraformCli};
use tf_patcher::manifest::{DependencyFile, FileRole};

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn project_files() -> Vec<DependencyFile> {
    vec![
        DependencyFile::new(
            "main.tf",
            "terraform {\n  required_providers {\n    aws = {\n      source  = \"hashicorp/aws\"\n      version = \"3.40.0\"\n    }\n  }\n}\n",
            FileRole::Configuration,
        ),
        DependencyFile::new(".terraform.lock.hcl", "# stale\n", FileRole::LockArtifact),
    ]
}

#[test]
fn fake_terraform_regenerates_lock() {
    let bin = TempDir::new().unwrap();
    // $1=providers $2=lock, options, then the provider source last
    let script = write_script(
        bin.path(),
        "terraform",
        r#"[ "$1" = "providers" ] && [ "$2" = "lock" ] || exit 2
for arg; do source="$arg"; done
test -f main.tf || exit 3
printf 'provider "%s" {\n  # %s %s\n}\n' "$source" "$TF_IN_AUTOMATION" "$TF_INPUT" > .terraform.lock.hcl
"#,
    );

    let runner = TerraformCli::new(&script).with_extra_args(vec!["-platform=linux_amd64".to_string()]);
    let lock = regenerate_lock(
        "registry.terraform.io/hashicorp/aws",
        &project_files(),
        ".terraform.lock.hcl",
        &runner,
    )
    .unwrap();

    assert_eq!(lock, "provider \"registry.terraform.io/hashicorp/aws\" {\n  # 1 0\n}\n");
}

#[test]
fn failing_command_reports_exit_code_and_stderr() {
    let bin = TempDir::new().unwrap();
    let script = write_script(
        bin.path(),
        "terraform",
        "echo 'Error: Failed to query available provider packages' >&2\nexit 1\n",
    );

    let err = regenerate_lock(
        "registry.terraform.io/hashicorp/aws",
        &project_files(),
        ".terraform.lock.hcl",
        &TerraformCli::new(&script),
    )
    .unwrap_err();

    match err {
        LockError::CommandFailed { code, stderr, .. } => {
            assert_eq!(code, 1);
            assert_eq!(stderr, "Error: Failed to query available provider packages");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn slow_command_times_out() {
    let bin = TempDir::new().unwrap();
    let script = write_script(bin.path(), "terraform", "exec sleep 10\n");
    let runner = TerraformCli::new(&script).with_timeout(Duration::from_millis(200));

    let started = Instant::now();
    let err = runner
        .lock_providers(bin.path(), "registry.terraform.io/hashicorp/aws")
        .unwrap_err();

    assert!(matches!(err, LockError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn timeout_holds_when_wrapper_forks_a_child() {
    let bin = TempDir::new().unwrap();
    // No exec: the shell stays alive and `sleep` inherits both pipes
    let script = write_script(bin.path(), "terraform", "sleep 6\necho done\n");
    let runner = TerraformCli::new(&script).with_timeout(Duration::from_millis(200));

    let started = Instant::now();
    let err = runner
        .lock_providers(bin.path(), "registry.terraform.io/hashicorp/aws")
        .unwrap_err();

    assert!(matches!(err, LockError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn command_without_lock_output_is_missing_lock_file() {
    let bin = TempDir::new().unwrap();
    let script = write_script(bin.path(), "terraform", "rm -f .terraform.lock.hcl\n");

    let err = regenerate_lock(
        "registry.terraform.io/hashicorp/aws",
        &project_files(),
        ".terraform.lock.hcl",
        &TerraformCli::new(&script),
    )
    .unwrap_err();

    assert!(matches!(err, LockError::MissingLockFile { ref name } if name == ".terraform.lock.hcl"));
}
