//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for identifiers and
//! remote-share values. Each newtype ensures validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

/// Maximum length of a single file name on the remote share, in bytes.
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// Characters that SMB/NTFS reject in a file name.
const RESERVED_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a single pipeline execution, used to correlate log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(Uuid);

impl TransferId {
    /// Create a new random TransferId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TransferId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("{s}: {e}")))
    }
}

/// Identity of a message sender on the chat platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(i64);

impl SenderId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl Display for SenderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SenderId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("{s}: {e}")))
    }
}

impl From<i64> for SenderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// SharePath
// ============================================================================

/// An absolute directory path inside the remote share (e.g. `/backups/2026`)
///
/// Paths always start with `/`, never contain `..` components, empty
/// components or backslashes, and never end with a trailing slash (except
/// the root itself).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SharePath(String);

impl SharePath {
    /// Create a new SharePath
    ///
    /// # Errors
    /// Returns error if the path is relative, contains traversal,
    /// double slashes or backslashes
    pub fn new(path: String) -> Result<Self, DomainError> {
        if !path.starts_with('/') {
            return Err(DomainError::InvalidSharePath(format!(
                "Share path must start with '/': {path}"
            )));
        }

        if path.contains('\\') {
            return Err(DomainError::InvalidSharePath(format!(
                "Share path must use '/' separators: {path}"
            )));
        }

        if path.len() > 1 && path.contains("//") {
            return Err(DomainError::InvalidSharePath(format!(
                "Share path contains invalid double slashes: {path}"
            )));
        }

        if path.split('/').any(|c| c == ".." || c == ".") {
            return Err(DomainError::InvalidSharePath(format!(
                "Share path contains invalid traversal: {path}"
            )));
        }

        let trimmed = if path.len() > 1 {
            path.trim_end_matches('/').to_string()
        } else {
            path
        };

        Ok(Self(trimmed))
    }

    /// Parses a user-supplied directory such as `backups`, `/backups/` or `/`
    ///
    /// A missing leading slash is added and trailing slashes are removed.
    ///
    /// # Errors
    /// Returns error if the normalized path is still invalid
    pub fn parse_lenient(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        if trimmed.starts_with('/') {
            Self::new(trimmed.to_string())
        } else {
            Self::new(format!("/{trimmed}"))
        }
    }

    /// Create the root path "/"
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Join a single path component
    ///
    /// # Errors
    /// Returns error if component is empty or contains separators/traversal
    pub fn join(&self, component: &str) -> Result<Self, DomainError> {
        if component.is_empty()
            || component.contains('/')
            || component.contains('\\')
            || component == ".."
            || component == "."
        {
            return Err(DomainError::InvalidSharePath(format!(
                "Invalid path component: {component}"
            )));
        }

        if self.is_root() {
            Self::new(format!("/{component}"))
        } else {
            Self::new(format!("{}/{component}", self.0))
        }
    }

    /// Get the parent path
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }

        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Iterates over the non-empty components of the path
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|c| !c.is_empty())
    }

    /// Returns every ancestor from the first segment down to `self`
    ///
    /// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`. The root yields nothing.
    #[must_use]
    pub fn ancestors_inclusive(&self) -> Vec<Self> {
        let mut current = Self::root();
        let mut out = Vec::new();
        for component in self.components() {
            current = Self(if current.is_root() {
                format!("/{component}")
            } else {
                format!("{}/{component}", current.0)
            });
            out.push(current.clone());
        }
        out
    }
}

impl Display for SharePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SharePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for SharePath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SharePath> for String {
    fn from(path: SharePath) -> Self {
        path.0
    }
}

// ============================================================================
// FileName
// ============================================================================

/// A single file name that is safe to create on the remote share
///
/// Invariants: non-empty, at most [`MAX_FILE_NAME_BYTES`] bytes, no path
/// separators, no reserved or control characters, not `.` or `..`, and no
/// trailing dot or space (Windows servers silently strip those).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileName(String);

impl FileName {
    /// Create a new FileName
    ///
    /// # Errors
    /// Returns error if any invariant is violated
    pub fn new(name: String) -> Result<Self, DomainError> {
        if name.is_empty() {
            return Err(DomainError::InvalidFileName("empty name".to_string()));
        }
        if name == "." || name == ".." {
            return Err(DomainError::InvalidFileName(name));
        }
        if name.len() > MAX_FILE_NAME_BYTES {
            return Err(DomainError::InvalidFileName(format!(
                "name exceeds {MAX_FILE_NAME_BYTES} bytes: {name}"
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| RESERVED_CHARS.contains(c) || c.is_control())
        {
            return Err(DomainError::InvalidFileName(format!(
                "reserved character {c:?} in {name}"
            )));
        }
        if name.ends_with('.') || name.ends_with(' ') {
            return Err(DomainError::InvalidFileName(format!(
                "trailing dot or space in {name:?}"
            )));
        }
        Ok(Self(name))
    }

    /// Builds a valid name from arbitrary user input
    ///
    /// Reserved and control characters become `_`, surrounding whitespace and
    /// trailing dots are removed, and over-long names are truncated on a char
    /// boundary while keeping the extension. Returns `None` when nothing
    /// usable is left.
    #[must_use]
    pub fn sanitize(raw: &str) -> Option<Self> {
        let replaced: String = raw
            .trim()
            .chars()
            .map(|c| {
                if RESERVED_CHARS.contains(&c) || c.is_control() {
                    '_'
                } else {
                    c
                }
            })
            .collect();
        let cleaned = replaced.trim_end_matches(['.', ' ']).to_string();
        if cleaned.is_empty() || cleaned.chars().all(|c| c == '_' || c == '.') {
            return None;
        }

        let fitted = if cleaned.len() > MAX_FILE_NAME_BYTES {
            let (stem, ext) = split_extension(&cleaned);
            let budget = MAX_FILE_NAME_BYTES.saturating_sub(ext.len());
            format!("{}{ext}", truncate_to_bytes(stem, budget))
        } else {
            cleaned
        };

        Self::new(fitted).ok()
    }

    /// A random `file_<uuid>` name, valid by construction
    #[must_use]
    pub fn placeholder() -> Self {
        Self(format!("file_{}", Uuid::new_v4().simple()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File stem (name without the last extension)
    #[must_use]
    pub fn stem(&self) -> &str {
        split_extension(&self.0).0
    }

    /// Last extension including the dot (e.g. `.jpg`), or `""`
    #[must_use]
    pub fn extension(&self) -> &str {
        split_extension(&self.0).1
    }

    /// Returns `stem + suffix + extension`, truncating the stem when needed
    ///
    /// # Errors
    /// Returns error if the suffix itself produces an invalid name
    pub fn with_suffix(&self, suffix: &str) -> Result<Self, DomainError> {
        let ext = self.extension();
        let budget = MAX_FILE_NAME_BYTES.saturating_sub(ext.len() + suffix.len());
        let stem = truncate_to_bytes(self.stem(), budget);
        Self::new(format!("{stem}{suffix}{ext}"))
    }
}

impl Display for FileName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for FileName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FileName> for String {
    fn from(name: FileName) -> Self {
        name.0
    }
}

/// Splits `name` into `(stem, ".ext")`; dotfiles have no extension
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => (&name[..idx], &name[idx..]),
    }
}

fn truncate_to_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
