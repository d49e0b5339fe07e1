//! Target naming for inbound files
//!
//! Picks where on the share an inbound file is written. The name comes from
//! the sender when usable, otherwise it is synthesized from the media kind.
//! Collisions are resolved by renaming, never by overwriting:
//! `photo.jpg`, `photo_1.jpg`, `photo_2.jpg`, ... then `photo_<uuid8>.jpg`.

use std::future::Future;

use uuid::Uuid;

use super::inbound::InboundFile;
use super::newtypes::{FileName, SharePath};
use super::target_path::TargetPath;

/// Highest numeric suffix tried before falling back to a random one
pub const MAX_NUMERIC_SUFFIX: u32 = 9_999;

/// Computes collision-free target paths
#[derive(Debug, Clone)]
pub struct FileNamer {
    backup_directory: SharePath,
    date_subdirectories: bool,
}

impl FileNamer {
    pub fn new(backup_directory: SharePath, date_subdirectories: bool) -> Self {
        Self {
            backup_directory,
            date_subdirectories,
        }
    }

    pub fn backup_directory(&self) -> &SharePath {
        &self.backup_directory
    }

    /// Directory the file lands in (before collision handling)
    pub fn directory_for(&self, inbound: &InboundFile) -> SharePath {
        if !self.date_subdirectories {
            return self.backup_directory.clone();
        }
        let day = inbound.received_at.format("%Y-%m-%d").to_string();
        self.backup_directory
            .join(&day)
            .unwrap_or_else(|_| self.backup_directory.clone())
    }

    /// Preferred file name, ignoring what already exists on the share
    ///
    /// An invalid original name is sanitized, not replaced.
    pub fn base_name(inbound: &InboundFile) -> FileName {
        if let Some(raw) = inbound.original_name.as_deref() {
            let trimmed = raw.trim();
            if let Ok(name) = FileName::new(trimmed.to_string()) {
                return name;
            }
            if let Some(name) = FileName::sanitize(trimmed) {
                return name;
            }
        }
        Self::synthesize(inbound)
    }

    fn synthesize(inbound: &InboundFile) -> FileName {
        let prefix = inbound.kind.name_prefix();
        let ext = inbound
            .mime_hint
            .as_deref()
            .and_then(extension_for_mime)
            .unwrap_or_else(|| inbound.kind.default_extension());
        let discriminator = match inbound.unique_id.as_deref().map(str::trim) {
            Some(uid) if !uid.is_empty() => uid.to_string(),
            _ => inbound.received_at.format("%Y%m%d_%H%M%S").to_string(),
        };

        FileName::sanitize(&format!("{prefix}_{discriminator}.{ext}"))
            .or_else(|| FileName::new(format!("{prefix}.{ext}")).ok())
            .unwrap_or_else(FileName::placeholder)
    }

    /// Computes a target path that `exists` reports as free
    ///
    /// `exists` is the only side effect; errors from it are returned as-is.
    pub async fn compute_target_path<F, Fut, E>(
        &self,
        inbound: &InboundFile,
        mut exists: F,
    ) -> Result<TargetPath, E>
    where
        F: FnMut(TargetPath) -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        let base = TargetPath::new(self.directory_for(inbound), Self::base_name(inbound));
        if !exists(base.clone()).await? {
            return Ok(base);
        }

        for i in 1..=MAX_NUMERIC_SUFFIX {
            let Ok(name) = base.file_name.with_suffix(&format!("_{i}")) else {
                break;
            };
            let candidate = base.with_file_name(name);
            if !exists(candidate.clone()).await? {
                return Ok(candidate);
            }
        }

        Ok(Self::random_variant(&base))
    }

    /// `<stem>_<uuid8><ext>` in the same directory
    pub fn random_variant(base: &TargetPath) -> TargetPath {
        let short = &Uuid::new_v4().simple().to_string()[..8];
        let name = base
            .file_name
            .with_suffix(&format!("_{short}"))
            .unwrap_or_else(|_| FileName::placeholder());
        base.with_file_name(name)
    }
}

/// Maps a MIME type to a file extension (without the dot)
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    let ext = match essence.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/heic" => "heic",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "video/x-matroska" => "mkv",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" => "ogg",
        "audio/mp4" | "audio/x-m4a" => "m4a",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/flac" => "flac",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/x-tgsticker" => "tgs",
        "application/json" => "json",
        "text/plain" => "txt",
        "text/csv" => "csv",
        _ => return None,
    };
    Some(ext)
}
