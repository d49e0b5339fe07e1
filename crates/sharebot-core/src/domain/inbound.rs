//! Inbound file events
//!
//! An [`InboundFile`] describes one attachment received from the messaging
//! layer. It is ephemeral: created per attachment, consumed by a single
//! pipeline execution and then dropped.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::SenderId;
use crate::ports::IFileSource;

// ============================================================================
// MediaKind
// ============================================================================

/// The kind of attachment a file arrived as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Document,
    Photo,
    Video,
    Audio,
    Voice,
    Sticker,
    Animation,
    VideoNote,
}

impl MediaKind {
    /// Prefix used when a file name has to be synthesized
    #[must_use]
    pub const fn name_prefix(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Voice => "voice",
            Self::Sticker => "sticker",
            Self::Animation => "animation",
            Self::VideoNote => "video_note",
        }
    }

    /// Extension (without dot) used when no MIME hint resolves one
    #[must_use]
    pub const fn default_extension(&self) -> &'static str {
        match self {
            Self::Document => "bin",
            Self::Photo => "jpg",
            Self::Video | Self::VideoNote => "mp4",
            Self::Audio => "mp3",
            Self::Voice => "ogg",
            Self::Sticker => "webp",
            Self::Animation => "gif",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name_prefix())
    }
}

// ============================================================================
// InboundFile
// ============================================================================

/// One file to relay onto the share
#[derive(Clone)]
pub struct InboundFile {
    /// Where the bytes come from
    pub source: Arc<dyn IFileSource>,
    /// Name supplied by the sender, if any
    pub original_name: Option<String>,
    /// Size announced by the platform, if any
    pub declared_size: Option<u64>,
    /// MIME type announced by the platform, if any
    pub mime_hint: Option<String>,
    pub kind: MediaKind,
    /// Platform-stable identifier, used for synthesized names
    pub unique_id: Option<String>,
    pub sender_id: SenderId,
    pub received_at: DateTime<Utc>,
}

impl InboundFile {
    /// Starts an inbound file with only the mandatory fields set
    pub fn new(source: Arc<dyn IFileSource>, kind: MediaKind, sender_id: SenderId) -> Self {
        Self {
            source,
            original_name: None,
            declared_size: None,
            mime_hint: None,
            kind,
            unique_id: None,
            sender_id,
            received_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    #[must_use]
    pub fn with_mime_hint(mut self, mime: impl Into<String>) -> Self {
        self.mime_hint = Some(mime.into());
        self
    }

    #[must_use]
    pub fn with_unique_id(mut self, id: impl Into<String>) -> Self {
        self.unique_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = at;
        self
    }

    /// Name to show the user before the target path is known
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.original_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => match &self.unique_id {
                Some(uid) => format!("{}_{uid}", self.kind.name_prefix()),
                None => self.kind.name_prefix().to_string(),
            },
        }
    }
}

impl fmt::Debug for InboundFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundFile")
            .field("source", &self.source.describe())
            .field("original_name", &self.original_name)
            .field("declared_size", &self.declared_size)
            .field("mime_hint", &self.mime_hint)
            .field("kind", &self.kind)
            .field("unique_id", &self.unique_id)
            .field("sender_id", &self.sender_id)
            .field("received_at", &self.received_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySource;

    fn source() -> Arc<dyn IFileSource> {
        Arc::new(MemorySource::new(b"abc".to_vec()))
    }

    #[test]
    fn media_kind_defaults() {
        assert_eq!(MediaKind::Photo.default_extension(), "jpg");
        assert_eq!(MediaKind::VideoNote.default_extension(), "mp4");
        assert_eq!(MediaKind::VideoNote.name_prefix(), "video_note");
        assert_eq!(MediaKind::Document.default_extension(), "bin");
    }

    #[test]
    fn builder_sets_optional_fields() {
        let file = InboundFile::new(source(), MediaKind::Document, SenderId::new(7))
            .with_original_name("report.pdf")
            .with_declared_size(3)
            .with_mime_hint("application/pdf");

        assert_eq!(file.original_name.as_deref(), Some("report.pdf"));
        assert_eq!(file.declared_size, Some(3));
        assert_eq!(file.mime_hint.as_deref(), Some("application/pdf"));
        assert_eq!(file.sender_id.value(), 7);
    }

    #[test]
    fn display_name_falls_back_to_kind() {
        let file = InboundFile::new(source(), MediaKind::Voice, SenderId::new(1));
        assert_eq!(file.display_name(), "voice");

        let file = file.with_unique_id("AbC");
        assert_eq!(file.display_name(), "voice_AbC");

        let file = file.with_original_name("  memo.ogg ");
        assert_eq!(file.display_name(), "memo.ogg");
    }

    #[test]
    fn debug_uses_source_description() {
        let file = InboundFile::new(source(), MediaKind::Photo, SenderId::new(1));
        let debug = format!("{file:?}");
        assert!(debug.contains("memory"));
    }
}
