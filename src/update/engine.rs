use crate::edit::Edit;
use crate::lock::{regenerate_lock, LockRunner};
use crate::manifest::{Dependency, DependencyFile, FileRole, RequirementRecord, SourceKind};
use crate::patch::PatchPlan;
use crate::update::UpdateError;
use std::path::Path;
use tracing::{debug, info, warn};

/// A file whose content changed, ready to be written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedFile {
    pub name: String,
    pub content: String,
}

/// One previous/new requirement pair that actually differs.
#[derive(Debug, Clone, Copy)]
pub struct RequirementChange<'a> {
    pub previous: &'a RequirementRecord,
    pub new: &'a RequirementRecord,
}

/// The only dependency of a run; anything but exactly one is an error.
pub fn single_dependency(dependencies: &[Dependency]) -> Result<&Dependency, UpdateError> {
    match dependencies {
        [dependency] => Ok(dependency),
        _ => Err(UpdateError::DependencyCount {
            found: dependencies.len(),
        }),
    }
}

/// Pair requirements by position and keep the ones that changed.
///
/// Every kept pair must stay in the same file; this is checked for all pairs
/// before the caller touches any content.
pub fn changed_requirements(dependency: &Dependency) -> Result<Vec<RequirementChange<'_>>, UpdateError> {
    if dependency.requirements.len() != dependency.previous_requirements.len() {
        return Err(UpdateError::RequirementCountMismatch {
            dependency: dependency.name.clone(),
            requirements: dependency.requirements.len(),
            previous: dependency.previous_requirements.len(),
        });
    }

    let changes: Vec<RequirementChange<'_>> = dependency
        .requirements
        .iter()
        .zip(&dependency.previous_requirements)
        .filter(|(new, previous)| new != previous)
        .map(|(new, previous)| RequirementChange { previous, new })
        .collect();

    if let Some(change) = changes.iter().find(|c| c.previous.file != c.new.file) {
        return Err(UpdateError::MismatchedRequirementFile {
            previous: change.previous.file.clone(),
            new: change.new.file.clone(),
        });
    }

    Ok(changes)
}

/// Compute updated files for `dependency`, regenerating locks with `runner`.
pub fn compute_updated_files(
    dependency: &Dependency,
    files: &[DependencyFile],
    runner: &dyn LockRunner,
) -> Result<Vec<UpdatedFile>, UpdateError> {
    FileUpdater::new(dependency, files, runner).updated_dependency_files()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LockRequest {
    provider_source: String,
    requested_by: String,
}

/// Applies one dependency bump to a set of files.
pub struct FileUpdater<'a> {
    dependency: &'a Dependency,
    files: &'a [DependencyFile],
    runner: Option<&'a dyn LockRunner>,
}

impl<'a> FileUpdater<'a> {
    pub fn new(
        dependency: &'a Dependency,
        files: &'a [DependencyFile],
        runner: &'a dyn LockRunner,
    ) -> Self {
        Self {
            dependency,
            files,
            runner: Some(runner),
        }
    }

    /// An updater that patches declarations but never runs the lock command.
    pub fn without_lock_regeneration(
        dependency: &'a Dependency,
        files: &'a [DependencyFile],
    ) -> Self {
        Self {
            dependency,
            files,
            runner: None,
        }
    }

    /// Changed files: configuration, then nested-tool configuration, then locks.
    pub fn updated_dependency_files(&self) -> Result<Vec<UpdatedFile>, UpdateError> {
        let has_configuration = self.files.iter().any(|f| {
            matches!(
                f.role,
                FileRole::Configuration | FileRole::NestedToolConfiguration
            )
        });
        if !has_configuration {
            return Err(UpdateError::NoConfigurationFile);
        }

        let changes = changed_requirements(self.dependency)?;
        debug!(
            dependency = %self.dependency.name,
            changed = changes.len(),
            "computed requirement changes"
        );

        // Lock files are only ever regenerated, never patched
        let patched_lock = self.files.iter().find(|f| {
            f.role == FileRole::LockArtifact && changes.iter().any(|c| c.new.file == f.name)
        });
        if let Some(lock) = patched_lock {
            return Err(UpdateError::ContentUnchanged {
                file: lock.name.clone(),
            });
        }

        let mut working: Vec<DependencyFile> = self.files.to_vec();
        let mut updated = Vec::new();
        let mut lock_requests = Vec::new();

        for role in [FileRole::Configuration, FileRole::NestedToolConfiguration] {
            for (idx, file) in self.files.iter().enumerate() {
                if file.role != role {
                    continue;
                }
                let file_changes: Vec<&RequirementChange<'_>> =
                    changes.iter().filter(|c| c.new.file == file.name).collect();
                if file_changes.is_empty() {
                    continue;
                }

                let content = self.patched_content(file, &file_changes, &mut lock_requests)?;
                if content == file.content {
                    return Err(UpdateError::ContentUnchanged {
                        file: file.name.clone(),
                    });
                }

                info!(file = %file.name, "updated declaration");
                working[idx].content = content.clone();
                updated.push(UpdatedFile {
                    name: file.name.clone(),
                    content,
                });
            }
        }

        updated.extend(self.regenerated_locks(&lock_requests, &mut working)?);

        if updated.is_empty() {
            return Err(UpdateError::NoFilesChanged);
        }
        Ok(updated)
    }

    fn patched_content(
        &self,
        file: &DependencyFile,
        changes: &[&RequirementChange<'_>],
        lock_requests: &mut Vec<LockRequest>,
    ) -> Result<String, UpdateError> {
        let mut content = file.content.clone();

        for change in changes {
            let source = &change.new.source;
            let kind = source.kind().ok_or_else(|| UpdateError::UnsupportedSource {
                kind: source.tag().to_string(),
            })?;
            debug!(
                file = %file.name,
                %kind,
                previous = ?change.previous.requirement,
                new = ?change.new.requirement,
                "patching requirement"
            );

            let plan = PatchPlan::for_change(
                &self.dependency.name,
                kind,
                file.role,
                change.previous,
                change.new,
            )?;
            if let Some(edit) = plan.edit(&file.name, &content) {
                content = edit.apply_to(&content)?;
            }

            if kind == SourceKind::Provider {
                if let Some(provider_source) = source.provider_source() {
                    let request = LockRequest {
                        provider_source,
                        requested_by: file.name.clone(),
                    };
                    if !lock_requests.contains(&request) {
                        lock_requests.push(request);
                    }
                }
            }
        }

        Ok(content)
    }

    /// Regenerate each requested lock against the patched file set.
    fn regenerated_locks(
        &self,
        requests: &[LockRequest],
        working: &mut [DependencyFile],
    ) -> Result<Vec<UpdatedFile>, UpdateError> {
        // Indexed by position in `self.files` so output follows input order
        let mut regenerated: Vec<(usize, String)> = Vec::new();

        for request in requests {
            let Some(idx) = self.lock_file_for(&request.requested_by) else {
                warn!(
                    provider = %request.provider_source,
                    file = %request.requested_by,
                    "no lock file next to configuration; skipping lock regeneration"
                );
                continue;
            };
            let Some(runner) = self.runner else {
                warn!(
                    provider = %request.provider_source,
                    lock_file = %self.files[idx].name,
                    "lock regeneration disabled; skipping"
                );
                continue;
            };

            let lock_name = self.files[idx].name.clone();
            let content = regenerate_lock(&request.provider_source, working, &lock_name, runner)?;
            working[idx].content = content.clone();
            match regenerated.iter_mut().find(|(i, _)| *i == idx) {
                Some(entry) => entry.1 = content,
                None => regenerated.push((idx, content)),
            }
        }

        regenerated.sort_by_key(|(idx, _)| *idx);
        regenerated
            .into_iter()
            .map(|(idx, content)| {
                let original = &self.files[idx];
                let edit = Edit::new(
                    &original.name,
                    0,
                    original.content.len(),
                    content,
                    &original.content,
                );
                if edit.is_applied(&original.content) {
                    return Err(UpdateError::ContentUnchanged {
                        file: original.name.clone(),
                    });
                }
                let content = edit.apply_to(&original.content)?;
                info!(file = %original.name, "regenerated lock file");
                Ok(UpdatedFile {
                    name: original.name.clone(),
                    content,
                })
            })
            .collect()
    }

    fn lock_file_for(&self, config_file: &str) -> Option<usize> {
        let dir = Path::new(config_file).parent();
        self.files
            .iter()
            .position(|f| f.role == FileRole::LockArtifact && Path::new(&f.name).parent() == dir)
    }
}
