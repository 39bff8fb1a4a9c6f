use crate::edit::{Edit, EditError};
use crate::locate::{locate, DeclarationPattern, LocateError};
use crate::manifest::{FileRole, RequirementRecord, SourceDescriptor, SourceKind};
use crate::patch::field::FieldPatcher;
use std::borrow::Cow;
use tracing::debug;

#[derive(Debug, Clone)]
struct FieldChange {
    patcher: FieldPatcher,
    old: String,
    new: String,
}

/// Locate + patch strategy for one changed requirement in one file.
#[derive(Debug, Clone)]
pub struct PatchPlan {
    kind: SourceKind,
    pattern: DeclarationPattern,
    change: Option<FieldChange>,
}

impl PatchPlan {
    /// Build the plan for a `previous -> new` requirement change of a `kind` source.
    ///
    /// Git sources rewrite the `ref=` of the previous URL; registry and
    /// provider sources rewrite the version constraint. A change without the
    /// values it needs yields a plan that never edits anything.
    pub fn for_change(
        dependency_name: &str,
        kind: SourceKind,
        role: FileRole,
        previous: &RequirementRecord,
        new: &RequirementRecord,
    ) -> Result<Self, LocateError> {
        let pattern = locate(dependency_name, kind, role)?;

        let change = match kind {
            SourceKind::Git => match (&previous.source, &new.source) {
                (
                    SourceDescriptor::Git {
                        url,
                        reference: Some(old_ref),
                    },
                    SourceDescriptor::Git {
                        reference: Some(new_ref),
                        ..
                    },
                ) => Some(FieldChange {
                    patcher: FieldPatcher::git_reference(url, old_ref)?,
                    old: old_ref.clone(),
                    new: new_ref.clone(),
                }),
                _ => None,
            },
            SourceKind::Registry | SourceKind::Provider => {
                match (&previous.requirement, &new.requirement) {
                    (Some(old), Some(new)) => Some(FieldChange {
                        patcher: FieldPatcher::version_field()?,
                        old: old.clone(),
                        new: new.clone(),
                    }),
                    _ => None,
                }
            }
        };

        Ok(Self {
            kind,
            pattern,
            change,
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn pattern(&self) -> &DeclarationPattern {
        &self.pattern
    }

    /// The file-level edit this plan makes to `content`, if any.
    pub fn edit(&self, file: &str, content: &str) -> Option<Edit> {
        let change = self.change.as_ref()?;

        let span = match self.pattern.find_required(content) {
            Ok(span) => span,
            Err(e) => {
                debug!(file, error = %e, "skipping file");
                return None;
            }
        };
        debug!(
            file,
            declaration = %self.pattern.target(),
            byte_start = span.byte_start,
            byte_end = span.byte_end,
            "located declaration"
        );

        let edit = change
            .patcher
            .find_edit(file, span.text(content), &change.old, &change.new);
        if edit.is_none() {
            debug!(file, old = %change.old, "field value not found in declaration");
        }
        edit.map(|edit| edit.shifted(span.byte_start))
    }

    /// Apply the plan to `content`, borrowing it back when nothing changed.
    pub fn apply<'a>(&self, file: &str, content: &'a str) -> Result<Cow<'a, str>, EditError> {
        match self.edit(file, content) {
            Some(edit) => edit.apply_to(content).map(Cow::Owned),
            None => Ok(Cow::Borrowed(content)),
        }
    }
}
