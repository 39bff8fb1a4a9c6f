use crate::cache;
use crate::locate::errors::LocateError;
use crate::manifest::{FileRole, SourceKind};
use regex::{escape, Regex};
use std::fmt;

/// The declaration shape a dependency is expected to appear in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationTarget {
    /// `module "<name>" { ... }`
    Module { name: String },

    /// The first `terraform { ... }` block (Terragrunt files carry no name
    /// anchor for git modules)
    TerraformBlock,

    /// Body of the top-level block holding `source = "<name>"`
    RegistrySource { name: String },

    /// From `source = "<name>"` or a `<name> = {` block label onwards
    ProviderSource { name: String },
}

impl DeclarationTarget {
    /// Pick the declaration shape for a dependency of `kind` inside a file of `role`.
    pub fn for_source(name: &str, kind: SourceKind, role: FileRole) -> Self {
        match kind {
            SourceKind::Git if role == FileRole::NestedToolConfiguration => {
                DeclarationTarget::TerraformBlock
            }
            SourceKind::Git => DeclarationTarget::Module {
                name: name.to_string(),
            },
            SourceKind::Registry => DeclarationTarget::RegistrySource {
                name: name.to_string(),
            },
            SourceKind::Provider => DeclarationTarget::ProviderSource {
                name: name.to_string(),
            },
        }
    }

    /// Regex source for the anchor of the declaration.
    pub fn anchor_pattern(&self) -> String {
        match self {
            DeclarationTarget::Module { name } => {
                format!(r#"module\s+["']{}["']\s*\{{"#, escape(name))
            }
            DeclarationTarget::TerraformBlock => r"\bterraform\s*\{".to_string(),
            DeclarationTarget::RegistrySource { name } => {
                format!(r#"source\s*=\s*["']{}["']"#, escape(name))
            }
            DeclarationTarget::ProviderSource { name } => {
                let name = escape(name);
                format!(r#"source\s*=\s*["']{name}["']|(?m:^[ \t]*["']?{name}["']?\s*=\s*\{{)"#)
            }
        }
    }

    fn extent(&self) -> Extent {
        match self {
            DeclarationTarget::RegistrySource { .. } => Extent::EnclosingBlock,
            _ => Extent::FromAnchor,
        }
    }
}

impl fmt::Display for DeclarationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationTarget::Module { name } => write!(f, "module \"{name}\""),
            DeclarationTarget::TerraformBlock => write!(f, "terraform block"),
            DeclarationTarget::RegistrySource { name } => write!(f, "block with source \"{name}\""),
            DeclarationTarget::ProviderSource { name } => write!(f, "provider \"{name}\""),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extent {
    /// Anchor start up to the next column-zero `}`
    FromAnchor,
    /// Just after the opening `{` of the block around the anchor, up to the
    /// next column-zero `}`
    EnclosingBlock,
}

/// Byte range of a located declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub byte_start: usize,
    pub byte_end: usize,
}

impl Span {
    pub fn text<'a>(&self, content: &'a str) -> &'a str {
        &content[self.byte_start..self.byte_end]
    }

    pub fn len(&self) -> usize {
        self.byte_end - self.byte_start
    }

    pub fn is_empty(&self) -> bool {
        self.byte_start == self.byte_end
    }
}

/// Compiled declaration pattern for one target.
///
/// Blocks are delimited by the next `}` at column zero; nesting depth is not
/// tracked, so inner blocks must be indented and outer blocks must not be.
#[derive(Debug, Clone)]
pub struct DeclarationPattern {
    target: DeclarationTarget,
    anchor: Regex,
}

impl DeclarationPattern {
    pub fn new(target: DeclarationTarget) -> Result<Self, LocateError> {
        let pattern = target.anchor_pattern();
        let anchor =
            cache::get_or_compile(&pattern).map_err(|e| LocateError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { target, anchor })
    }

    pub fn target(&self) -> &DeclarationTarget {
        &self.target
    }

    pub fn anchor(&self) -> &Regex {
        &self.anchor
    }

    /// Find the first (leftmost) declaration span in `content`.
    pub fn find(&self, content: &str) -> Option<Span> {
        match self.target.extent() {
            Extent::FromAnchor => {
                let m = self.anchor.find(content)?;
                Some(Span {
                    byte_start: m.start(),
                    byte_end: next_block_close(content, m.end()),
                })
            }
            Extent::EnclosingBlock => {
                for m in self.anchor.find_iter(content) {
                    let floor = previous_block_close(content, m.start()).map_or(0, |close| close + 1);
                    let Some(open) = content[floor..m.start()].find('{') else {
                        continue;
                    };
                    return Some(Span {
                        byte_start: floor + open + 1,
                        byte_end: next_block_close(content, m.end()),
                    });
                }
                None
            }
        }
    }

    /// Like [`find`](Self::find), but a missing declaration is an error.
    pub fn find_required(&self, content: &str) -> Result<Span, LocateError> {
        self.find(content).ok_or_else(|| LocateError::NotFound {
            target: self.target.to_string(),
        })
    }
}

/// Build the declaration pattern for a dependency of `kind` in a file of `role`.
pub fn locate(
    dependency_name: &str,
    kind: SourceKind,
    role: FileRole,
) -> Result<DeclarationPattern, LocateError> {
    DeclarationPattern::new(DeclarationTarget::for_source(dependency_name, kind, role))
}

fn is_line_start(content: &str, pos: usize) -> bool {
    pos == 0 || content.as_bytes()[pos - 1] == b'\n'
}

/// Offset of the first column-zero `}` at or after `from`, or end of input.
fn next_block_close(content: &str, from: usize) -> usize {
    if is_line_start(content, from) && content[from..].starts_with('}') {
        return from;
    }
    match content[from..].find("\n}") {
        Some(idx) => from + idx + 1,
        None => content.len(),
    }
}

/// Offset of the last column-zero `}` strictly before `before`.
fn previous_block_close(content: &str, before: usize) -> Option<usize> {
    let head = &content[..before];
    head.rfind("\n}")
        .map(|idx| idx + 1)
        .or_else(|| head.starts_with('}').then_some(0))
}
