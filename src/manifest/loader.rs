use crate::manifest::schema::{UpdateManifest, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Serialization format of an update manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Toml,
    Json,
}

impl ManifestFormat {
    /// `.json` files are JSON; everything else is read as TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ManifestFormat::Json,
            _ => ManifestFormat::Toml,
        }
    }
}

#[derive(Debug)]
pub enum ManifestError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ManifestError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ManifestError::Io { .. } => self,
            ManifestError::Toml { path: None, source } => ManifestError::Toml {
                path: Some(path),
                source,
            },
            ManifestError::Json { path: None, source } => ManifestError::Json {
                path: Some(path),
                source,
            },
            ManifestError::Validation { path: None, source } => ManifestError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Io { path, source } => {
                write!(
                    f,
                    "failed to read update manifest from {}: {}",
                    path.display(),
                    source
                )
            }
            ManifestError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse update manifest TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse update manifest TOML: {}", source),
            },
            ManifestError::Json { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse update manifest JSON ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse update manifest JSON: {}", source),
            },
            ManifestError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid update manifest ({}): {}", path.display(), source),
                None => write!(f, "invalid update manifest: {}", source),
            },
        }
    }
}

impl std::error::Error for ManifestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ManifestError::Io { source, .. } => Some(source),
            ManifestError::Toml { source, .. } => Some(source),
            ManifestError::Json { source, .. } => Some(source),
            ManifestError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str, format: ManifestFormat) -> Result<UpdateManifest, ManifestError> {
    let manifest: UpdateManifest = match format {
        ManifestFormat::Toml => toml_edit::de::from_str(input)
            .map_err(|source| ManifestError::Toml { path: None, source })?,
        ManifestFormat::Json => serde_json::from_str(input)
            .map_err(|source| ManifestError::Json { path: None, source })?,
    };
    manifest
        .validate()
        .map_err(|source| ManifestError::Validation { path: None, source })?;
    Ok(manifest)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<UpdateManifest, ManifestError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents, ManifestFormat::from_path(path)).map_err(|error| error.with_path(path))
}
