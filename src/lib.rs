//! tf-patcher: surgical dependency bumps for Terraform and Terragrunt files
//!
//! Given the previous and new requirement records of one dependency, the
//! updater rewrites only the version constraint or git `ref` inside that
//! dependency's declaration and leaves every other byte of the file alone.
//! Provider bumps also regenerate `.terraform.lock.hcl` by running
//! `terraform providers lock` in a throwaway directory.
//!
//! # Architecture
//!
//! All content changes compile down to a single primitive: [`Edit`], a
//! verified byte-span replacement. Intelligence lives in span acquisition
//! ([`locate`]) and field selection ([`patch`]), not in the application
//! logic.
//!
//! # Safety
//!
//! - All edits verify expected before-text before applying
//! - Atomic file writes (tempfile + fsync + rename)
//! - Lock sandboxes confine file names and are always removed
//! - Any failure aborts the whole run; no partial results
//!
//! # Example
//!
//! ```no_run
//! use tf_patcher::manifest::{load_from_path, DependencyFile};
//! use tf_patcher::update::{single_dependency, compute_updated_files};
//! use tf_patcher::lock::TerraformCli;
//!
//! let manifest = load_from_path("update.toml").unwrap();
//! let dependency = single_dependency(&manifest.dependencies).unwrap();
//! let files = vec![DependencyFile::classified(
//!     "main.tf",
//!     std::fs::read_to_string("main.tf").unwrap(),
//! )
//! .unwrap()];
//!
//! let runner = TerraformCli::from_settings(&manifest.lock);
//! for file in compute_updated_files(dependency, &files, &runner).unwrap() {
//!     println!("{} changed", file.name);
//! }
//! ```

pub mod cache;
pub mod edit;
pub mod locate;
pub mod lock;
pub mod manifest;
pub mod patch;
pub mod safety;
pub mod update;

// Re-exports
pub use edit::{write_atomic, Edit, EditError, EditVerification};
pub use locate::{locate, DeclarationPattern, DeclarationTarget, LocateError, Span};
pub use lock::{regenerate_lock, LockError, LockRunner, TerraformCli};
pub use manifest::{
    load_from_path, load_from_str, Dependency, DependencyFile, FileRole, ManifestError,
    RequirementRecord, SourceDescriptor, SourceKind, UpdateManifest,
};
pub use patch::{FieldPatcher, PatchPlan};
pub use safety::{SafetyError, SandboxGuard};
pub use update::{
    compute_updated_files, single_dependency, FileUpdater, UpdateError, UpdatedFile,
};
