use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Basename Terraform writes provider locks to.
pub const LOCK_FILE_NAME: &str = ".terraform.lock.hcl";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct UpdateManifest {
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub lock: LockSettings,
}

impl UpdateManifest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.dependencies.len() != 1 {
            issues.push(ValidationIssue::DependencyCount {
                found: self.dependencies.len(),
            });
        }

        for dependency in &self.dependencies {
            if dependency.name.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    dependency: None,
                    field: "name",
                });
            }

            if dependency.requirements.len() != dependency.previous_requirements.len() {
                issues.push(ValidationIssue::InvalidCombo {
                    dependency: Some(dependency.name.clone()),
                    message: format!(
                        "{} requirements but {} previous_requirements",
                        dependency.requirements.len(),
                        dependency.previous_requirements.len()
                    ),
                });
            }

            let all = dependency
                .requirements
                .iter()
                .chain(&dependency.previous_requirements);
            for req in all {
                if req.file.trim().is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        dependency: Some(dependency.name.clone()),
                        field: "requirements.file",
                    });
                }
            }
        }

        for entry in &self.files {
            if entry.resolved_role().is_none() {
                issues.push(ValidationIssue::UnknownFileRole {
                    name: entry.name.clone(),
                });
            }
        }

        if self.lock.command.trim().is_empty() {
            issues.push(ValidationIssue::InvalidLockSettings {
                message: "lock.command must not be empty".to_string(),
            });
        }
        if self.lock.timeout_secs == 0 {
            issues.push(ValidationIssue::InvalidLockSettings {
                message: "lock.timeout_secs must be greater than zero".to_string(),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

/// The single dependency a run updates.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    #[serde(default)]
    pub requirements: Vec<RequirementRecord>,
    #[serde(default)]
    pub previous_requirements: Vec<RequirementRecord>,
}

/// Where a dependency is declared and what it is constrained to.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RequirementRecord {
    pub file: String,
    #[serde(default)]
    pub requirement: Option<String>,
    pub source: SourceDescriptor,
}

/// How a dependency reference resolves.
///
/// Unknown `type` tags deserialize to [`SourceDescriptor::Unsupported`] so the
/// updater can reject them with a typed error.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(try_from = "RawSource")]
pub enum SourceDescriptor {
    Git {
        url: String,
        reference: Option<String>,
    },
    Registry {
        registry_hostname: Option<String>,
        module_identifier: Option<String>,
    },
    Provider {
        registry_hostname: String,
        module_identifier: String,
    },
    Unsupported {
        kind: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Git,
    Registry,
    Provider,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Git => write!(f, "git"),
            SourceKind::Registry => write!(f, "registry"),
            SourceKind::Provider => write!(f, "provider"),
        }
    }
}

impl SourceDescriptor {
    pub fn kind(&self) -> Option<SourceKind> {
        match self {
            SourceDescriptor::Git { .. } => Some(SourceKind::Git),
            SourceDescriptor::Registry { .. } => Some(SourceKind::Registry),
            SourceDescriptor::Provider { .. } => Some(SourceKind::Provider),
            SourceDescriptor::Unsupported { .. } => None,
        }
    }

    /// The `type` tag as written in the manifest.
    pub fn tag(&self) -> &str {
        match self {
            SourceDescriptor::Git { .. } => "git",
            SourceDescriptor::Registry { .. } => "registry",
            SourceDescriptor::Provider { .. } => "provider",
            SourceDescriptor::Unsupported { kind } => kind,
        }
    }

    /// `<registry_hostname>/<module_identifier>` for provider sources.
    pub fn provider_source(&self) -> Option<String> {
        match self {
            SourceDescriptor::Provider {
                registry_hostname,
                module_identifier,
            } => Some(format!("{registry_hostname}/{module_identifier}")),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct RawSource {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "ref")]
    reference: Option<String>,
    #[serde(default)]
    registry_hostname: Option<String>,
    #[serde(default)]
    module_identifier: Option<String>,
}

impl TryFrom<RawSource> for SourceDescriptor {
    type Error = String;

    fn try_from(raw: RawSource) -> Result<Self, Self::Error> {
        match raw.kind.as_str() {
            "git" => Ok(SourceDescriptor::Git {
                url: raw.url.ok_or("git source missing required field 'url'")?,
                reference: raw.reference,
            }),
            "registry" => Ok(SourceDescriptor::Registry {
                registry_hostname: raw.registry_hostname,
                module_identifier: raw.module_identifier,
            }),
            "provider" => Ok(SourceDescriptor::Provider {
                registry_hostname: raw
                    .registry_hostname
                    .ok_or("provider source missing required field 'registry_hostname'")?,
                module_identifier: raw
                    .module_identifier
                    .ok_or("provider source missing required field 'module_identifier'")?,
            }),
            _ => Ok(SourceDescriptor::Unsupported { kind: raw.kind }),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FileRole {
    /// Plain Terraform configuration (`*.tf`)
    Configuration,
    /// Terragrunt configuration (`*.hcl`)
    NestedToolConfiguration,
    /// Provider lock file
    LockArtifact,
}

impl FileRole {
    /// Classify a file by its name; `None` for files the updater never touches.
    pub fn from_file_name(name: &str) -> Option<FileRole> {
        let basename = Path::new(name).file_name()?.to_str()?;
        if basename == LOCK_FILE_NAME {
            Some(FileRole::LockArtifact)
        } else if basename.ends_with(".tf") {
            Some(FileRole::Configuration)
        } else if basename.ends_with(".hcl") {
            Some(FileRole::NestedToolConfiguration)
        } else {
            None
        }
    }
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRole::Configuration => write!(f, "configuration"),
            FileRole::NestedToolConfiguration => write!(f, "nested-tool-configuration"),
            FileRole::LockArtifact => write!(f, "lock-artifact"),
        }
    }
}

/// A file as handed to the updater: name, raw text and role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyFile {
    pub name: String,
    pub content: String,
    pub role: FileRole,
}

impl DependencyFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>, role: FileRole) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            role,
        }
    }

    /// Build a file whose role is inferred from its name.
    pub fn classified(name: impl Into<String>, content: impl Into<String>) -> Option<Self> {
        let name = name.into();
        let role = FileRole::from_file_name(&name)?;
        Some(Self::new(name, content, role))
    }
}

/// A file listed in the manifest; the role defaults to the name's classification.
#[derive(Debug, Deserialize, Clone)]
pub struct FileEntry {
    pub name: String,
    #[serde(default)]
    pub role: Option<FileRole>,
}

impl FileEntry {
    pub fn resolved_role(&self) -> Option<FileRole> {
        self.role.or_else(|| FileRole::from_file_name(&self.name))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LockSettings {
    /// Program invoked as `<command> providers lock <source>`
    pub command: String,
    /// Extra options placed before the provider source
    pub extra_args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            command: "terraform".to_string(),
            extra_args: Vec::new(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    DependencyCount {
        found: usize,
    },
    MissingField {
        dependency: Option<String>,
        field: &'static str,
    },
    InvalidCombo {
        dependency: Option<String>,
        message: String,
    },
    UnknownFileRole {
        name: String,
    },
    InvalidLockSettings {
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::DependencyCount { found } => {
                write!(f, "manifest must name exactly one dependency, found {found}")
            }
            ValidationIssue::MissingField { dependency, field } => match dependency {
                Some(name) => write!(f, "dependency '{name}' missing required field '{field}'"),
                None => write!(f, "dependency missing required field '{field}'"),
            },
            ValidationIssue::InvalidCombo {
                dependency,
                message,
            } => match dependency {
                Some(name) => write!(f, "dependency '{name}' is invalid: {message}"),
                None => write!(f, "invalid dependency: {message}"),
            },
            ValidationIssue::UnknownFileRole { name } => {
                write!(f, "cannot infer a role for file '{name}'; set `role` explicitly")
            }
            ValidationIssue::InvalidLockSettings { message } => {
                write!(f, "invalid lock settings: {message}")
            }
        }
    }
}
