use crate::cache;
use crate::edit::{Edit, EditVerification};
use crate::locate::LocateError;
use regex::{escape, Regex};
use std::borrow::Cow;

/// First `version = ...` line of a span.
pub const VERSION_FIELD: &str = r"(?m)^[ \t]*version[ \t]*=.*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Substitution {
    /// First occurrence of the old value anywhere in the field match
    FirstOccurrence,
    /// The old value that ends the field match (the `ref=` token)
    TrailingToken,
}

/// Replaces one value inside a located declaration span.
///
/// At most one substitution happens per call. A missing field or a missing
/// old value leaves the span untouched; callers detect that by comparing
/// whole contents.
#[derive(Debug, Clone)]
pub struct FieldPatcher {
    field: Regex,
    substitution: Substitution,
}

impl FieldPatcher {
    /// Patcher for registry and provider version constraints.
    pub fn version_field() -> Result<Self, LocateError> {
        Ok(Self {
            field: compile(VERSION_FIELD)?,
            substitution: Substitution::FirstOccurrence,
        })
    }

    /// Patcher for the `ref=` of a git source URL.
    ///
    /// The field is `<url>...ref=<reference>` on a single line, with any
    /// `https://` scheme dropped from `url` so `git::https://` and
    /// scheme-less sources match alike.
    pub fn git_reference(url: &str, reference: &str) -> Result<Self, LocateError> {
        let url = url.strip_prefix("https://").unwrap_or(url);
        let pattern = format!("{}.*ref={}", escape(url), escape(reference));
        Ok(Self {
            field: compile(&pattern)?,
            substitution: Substitution::TrailingToken,
        })
    }

    pub fn field(&self) -> &Regex {
        &self.field
    }

    /// Build the span-relative edit replacing `old` with `new`, if there is one.
    pub fn find_edit(&self, file: &str, span: &str, old: &str, new: &str) -> Option<Edit> {
        if old.is_empty() {
            return None;
        }

        let m = self.field.find(span)?;
        let byte_start = match self.substitution {
            Substitution::FirstOccurrence => m.start() + m.as_str().find(old)?,
            Substitution::TrailingToken => {
                if !m.as_str().ends_with(old) {
                    return None;
                }
                m.end() - old.len()
            }
        };

        Some(Edit::with_verification(
            file,
            byte_start,
            byte_start + old.len(),
            new,
            EditVerification::ExactMatch(old.to_string()),
        ))
    }

    /// Replace the first `old` in the field's first match inside `span`.
    pub fn patch<'a>(&self, span: &'a str, old: &str, new: &str) -> Cow<'a, str> {
        let Some(edit) = self.find_edit("<span>", span, old, new) else {
            return Cow::Borrowed(span);
        };
        match edit.apply_to(span) {
            Ok(patched) => Cow::Owned(patched),
            Err(_) => Cow::Borrowed(span),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, LocateError> {
    cache::get_or_compile(pattern).map_err(|e| LocateError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}
