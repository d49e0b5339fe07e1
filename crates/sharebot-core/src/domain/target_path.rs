//! Remote target location of a transfer

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{FileName, SharePath};

/// Directory plus file name on the share
///
/// Both halves are validated newtypes, so any `TargetPath` is safe to create.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetPath {
    pub directory: SharePath,
    pub file_name: FileName,
}

impl TargetPath {
    pub fn new(directory: SharePath, file_name: FileName) -> Self {
        Self {
            directory,
            file_name,
        }
    }

    /// Parses a full path like `/backups/photo.jpg`
    ///
    /// # Errors
    /// Returns error if the path has no file component or either half is invalid
    pub fn parse(full: &str) -> Result<Self, DomainError> {
        let idx = full
            .rfind('/')
            .ok_or_else(|| DomainError::InvalidSharePath(full.to_string()))?;
        let (dir, name) = (&full[..idx], &full[idx + 1..]);
        let directory = if dir.is_empty() {
            SharePath::root()
        } else {
            SharePath::new(dir.to_string())?
        };
        Ok(Self::new(directory, FileName::new(name.to_string())?))
    }

    /// Same directory, different name
    #[must_use]
    pub fn with_file_name(&self, file_name: FileName) -> Self {
        Self::new(self.directory.clone(), file_name)
    }

    /// Full share-relative path string
    #[must_use]
    pub fn full_path(&self) -> String {
        if self.directory.is_root() {
            format!("/{}", self.file_name)
        } else {
            format!("{}/{}", self.directory, self.file_name)
        }
    }
}

impl fmt::Display for TargetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path())
    }
}
