//! Provider lock regeneration.
//!
//! The lock file is never edited in place: the current file set is written
//! to a disposable directory, `terraform providers lock` rewrites the lock
//! there, and the result is read back wholesale.
//!
//! # Example
//!
//! ```no_run
//! use tf_patcher::lock::{regenerate_lock, TerraformCli};
//! use tf_patcher::manifest::DependencyFile;
//!
//! let files = vec![
//!     DependencyFile::classified("main.tf", "terraform {}\n").unwrap(),
//!     DependencyFile::classified(".terraform.lock.hcl", "").unwrap(),
//! ];
//! let lock = regenerate_lock(
//!     "registry.terraform.io/hashicorp/aws",
//!     &files,
//!     ".terraform.lock.hcl",
//!     &TerraformCli::default(),
//! )
//! .unwrap();
//! println!("{lock}");
//! ```

pub mod runner;

pub use runner::{LockRunner, TerraformCli};

use crate::manifest::DependencyFile;
use crate::safety::{SafetyError, SandboxGuard};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("failed to create lock sandbox: {0}")]
    Sandbox(#[source] std::io::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsafe file name: {0}")]
    Safety(#[from] SafetyError),

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` failed with exit code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("lock command did not produce {name}")]
    MissingLockFile { name: String },
}

/// Regenerate `lock_file_name` for `provider_source` from `files`.
///
/// The sandbox directory is removed when this returns, on success and on
/// every error path.
pub fn regenerate_lock(
    provider_source: &str,
    files: &[DependencyFile],
    lock_file_name: &str,
    runner: &dyn LockRunner,
) -> Result<String, LockError> {
    let sandbox = tempfile::Builder::new()
        .prefix("tf-patcher-")
        .tempdir()
        .map_err(LockError::Sandbox)?;
    let guard = SandboxGuard::new(sandbox.path());

    for file in files {
        let path = guard.resolve(&file.name)?;
        write_file(&path, &file.content)?;
    }

    let lock_path = guard.resolve(lock_file_name)?;
    let workdir = lock_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| guard.root().to_path_buf());
    fs::create_dir_all(&workdir).map_err(|source| LockError::Io {
        path: workdir.clone(),
        source,
    })?;

    info!(provider_source, lock_file = lock_file_name, "regenerating provider lock");
    runner.lock_providers(&workdir, provider_source)?;

    fs::read_to_string(&lock_path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => LockError::MissingLockFile {
            name: lock_file_name.to_string(),
        },
        _ => LockError::Io {
            path: lock_path.clone(),
            source,
        },
    })
}

fn write_file(path: &std::path::Path, content: &str) -> Result<(), LockError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| LockError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| LockError::Io {
        path: path.to_path_buf(),
        source,
    })
}
