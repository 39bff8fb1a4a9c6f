//! Requirement diffing and file updates for a single dependency bump.
//!
//! This module turns a [`Dependency`](crate::manifest::Dependency) with
//! paired previous/new requirement records into the minimal list of changed
//! files:
//! - Pairs that did not change are dropped
//! - Each remaining pair is located and patched in its file
//! - Provider bumps regenerate the lock artifact next to the file
//!
//! Every failure is fatal; nothing is returned when any step fails.

pub mod engine;

pub use engine::{
    changed_requirements, compute_updated_files, single_dependency, FileUpdater,
    RequirementChange, UpdatedFile,
};

use crate::edit::EditError;
use crate::locate::LocateError;
use crate::lock::LockError;
use std::fmt;

/// Errors raised while computing updated files
#[derive(Debug)]
pub enum UpdateError {
    /// Not exactly one dependency was supplied
    DependencyCount { found: usize },
    /// The file set holds no Terraform or Terragrunt configuration
    NoConfigurationFile,
    /// `requirements` and `previous_requirements` differ in length
    RequirementCountMismatch {
        dependency: String,
        requirements: usize,
        previous: usize,
    },
    /// A changed pair names different files before and after
    MismatchedRequirementFile { previous: String, new: String },
    /// The new source has a type the updater cannot patch
    UnsupportedSource { kind: String },
    /// A file selected for update came out identical
    ContentUnchanged { file: String },
    /// The run produced no changed files at all
    NoFilesChanged,
    /// Pattern construction failed
    Locate(LocateError),
    /// Edit verification failed
    Edit(EditError),
    /// Lock regeneration failed
    Lock(LockError),
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateError::DependencyCount { found } => {
                write!(f, "expected exactly one dependency, found {found}")
            }
            UpdateError::NoConfigurationFile => write!(f, "no Terraform configuration file"),
            UpdateError::RequirementCountMismatch {
                dependency,
                requirements,
                previous,
            } => write!(
                f,
                "dependency '{dependency}' has {requirements} requirements but {previous} previous requirements"
            ),
            UpdateError::MismatchedRequirementFile { previous, new } => write!(
                f,
                "requirement moved between files ('{previous}' -> '{new}')"
            ),
            UpdateError::UnsupportedSource { kind } => {
                write!(f, "don't know how to update a {kind} declaration")
            }
            UpdateError::ContentUnchanged { file } => {
                write!(f, "content of {file} did not change")
            }
            UpdateError::NoFilesChanged => write!(f, "no files changed"),
            UpdateError::Locate(e) => write!(f, "locate error: {e}"),
            UpdateError::Edit(e) => write!(f, "edit error: {e}"),
            UpdateError::Lock(e) => write!(f, "lock regeneration failed: {e}"),
        }
    }
}

impl std::error::Error for UpdateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UpdateError::Locate(e) => Some(e),
            UpdateError::Edit(e) => Some(e),
            UpdateError::Lock(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LocateError> for UpdateError {
    fn from(e: LocateError) -> Self {
        UpdateError::Locate(e)
    }
}

impl From<EditError> for UpdateError {
    fn from(e: EditError) -> Self {
        UpdateError::Edit(e)
    }
}

impl From<LockError> for UpdateError {
    fn from(e: LockError) -> Self {
        UpdateError::Lock(e)
    }
}
