pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, ManifestError, ManifestFormat};
pub use schema::{
    Dependency, DependencyFile, FileEntry, FileRole, LockSettings, RequirementRecord,
    SourceDescriptor, SourceKind, UpdateManifest, ValidationError, ValidationIssue,
    LOCK_FILE_NAME,
};
