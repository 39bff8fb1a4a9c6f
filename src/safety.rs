use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Confines dependency file names to a sandbox directory.
///
/// File names come from the update manifest, so they are resolved lexically
/// (the targets do not exist yet when the sandbox is populated).
#[derive(Debug, Clone)]
pub struct SandboxGuard {
    root: PathBuf,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("file name is absolute: {0}")]
    AbsolutePath(PathBuf),

    #[error("file name escapes the sandbox: {name} (root: {root})")]
    OutsideSandbox { name: PathBuf, root: PathBuf },

    #[error("file name is empty")]
    EmptyName,
}

impl SandboxGuard {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a relative file name to a path inside the sandbox.
    ///
    /// `.` components are dropped; `..` may only walk back out of
    /// directories the name itself entered.
    pub fn resolve(&self, name: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let name = name.as_ref();
        if name.as_os_str().is_empty() {
            return Err(SafetyError::EmptyName);
        }

        let mut relative = PathBuf::new();
        for component in name.components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !relative.pop() {
                        return Err(SafetyError::OutsideSandbox {
                            name: name.to_path_buf(),
                            root: self.root.clone(),
                        });
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(SafetyError::AbsolutePath(name.to_path_buf()));
                }
            }
        }

        if relative.as_os_str().is_empty() {
            return Err(SafetyError::EmptyName);
        }

        Ok(self.root.join(relative))
    }

    /// Get the sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
