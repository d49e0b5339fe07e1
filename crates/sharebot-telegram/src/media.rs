//! Attachment extraction
//!
//! A single Telegram message can carry several media fields at once (an
//! animation also arrives as a document, a forwarded album item has a
//! caption, ...). [`attachments_of`] flattens them into a list of
//! [`Attachment`]s, one per distinct file.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use sharebot_core::domain::{InboundFile, MediaKind, SenderId};

use crate::client::BotClient;
use crate::source::TelegramFileSource;
use crate::types::Message;

/// One downloadable file found in a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: MediaKind,
    pub file_id: String,
    pub file_unique_id: String,
    pub file_name: Option<String>,
    /// MIME type used to pick the extension of a synthesized name
    pub mime_hint: Option<String>,
    pub file_size: Option<u64>,
}

impl Attachment {
    fn new(kind: MediaKind, file_id: &str, file_unique_id: &str) -> Self {
        Self {
            kind,
            file_id: file_id.to_string(),
            file_unique_id: file_unique_id.to_string(),
            file_name: None,
            mime_hint: None,
            file_size: None,
        }
    }

    fn named(mut self, name: Option<&String>) -> Self {
        self.file_name = name.cloned();
        self
    }

    fn mime(mut self, mime: Option<impl Into<String>>) -> Self {
        self.mime_hint = mime.map(Into::into);
        self
    }

    fn sized(mut self, size: Option<u64>) -> Self {
        self.file_size = size;
        self
    }

    /// Builds the pipeline input for this attachment
    pub fn into_inbound(
        self,
        client: BotClient,
        sender: SenderId,
        received_at: DateTime<Utc>,
    ) -> InboundFile {
        let source = Arc::new(TelegramFileSource::new(client, self.file_id));
        let mut inbound = InboundFile::new(source, self.kind, sender)
            .with_unique_id(self.file_unique_id)
            .with_received_at(received_at);
        if let Some(name) = self.file_name {
            inbound = inbound.with_original_name(name);
        }
        if let Some(mime) = self.mime_hint {
            inbound = inbound.with_mime_hint(mime);
        }
        if let Some(size) = self.file_size {
            inbound = inbound.with_declared_size(size);
        }
        inbound
    }
}

/// Every distinct file carried by `message`, in a stable order
///
/// Photos contribute only their largest size. Files that appear under two
/// fields (animation + document) are reported once, under the more
/// specific kind.
pub fn attachments_of(message: &Message) -> Vec<Attachment> {
    let mut found = Vec::new();

    if let Some(animation) = &message.animation {
        found.push(
            Attachment::new(MediaKind::Animation, &animation.file_id, &animation.file_unique_id)
                .named(animation.file_name.as_ref())
                .sized(animation.file_size),
        );
    }
    if let Some(document) = &message.document {
        found.push(
            Attachment::new(MediaKind::Document, &document.file_id, &document.file_unique_id)
                .named(document.file_name.as_ref())
                .mime(document.mime_type.clone())
                .sized(document.file_size),
        );
    }
    if let Some(photo) = message.photo.as_ref().and_then(|sizes| largest(sizes)) {
        found.push(
            Attachment::new(MediaKind::Photo, &photo.file_id, &photo.file_unique_id)
                .sized(photo.file_size),
        );
    }
    if let Some(video) = &message.video {
        found.push(
            Attachment::new(MediaKind::Video, &video.file_id, &video.file_unique_id)
                .named(video.file_name.as_ref())
                .sized(video.file_size),
        );
    }
    if let Some(audio) = &message.audio {
        found.push(
            Attachment::new(MediaKind::Audio, &audio.file_id, &audio.file_unique_id)
                .named(audio.file_name.as_ref())
                .sized(audio.file_size),
        );
    }
    if let Some(voice) = &message.voice {
        found.push(
            Attachment::new(MediaKind::Voice, &voice.file_id, &voice.file_unique_id)
                .sized(voice.file_size),
        );
    }
    if let Some(sticker) = &message.sticker {
        let mime = if sticker.is_animated {
            "application/x-tgsticker"
        } else if sticker.is_video {
            "video/webm"
        } else {
            "image/webp"
        };
        found.push(
            Attachment::new(MediaKind::Sticker, &sticker.file_id, &sticker.file_unique_id)
                .mime(Some(mime))
                .sized(sticker.file_size),
        );
    }
    if let Some(note) = &message.video_note {
        found.push(
            Attachment::new(MediaKind::VideoNote, &note.file_id, &note.file_unique_id)
                .sized(note.file_size),
        );
    }

    let mut seen = HashSet::new();
    found.retain(|a| seen.insert(a.file_unique_id.clone()));
    found
}

fn largest(sizes: &[crate::types::PhotoSize]) -> Option<&crate::types::PhotoSize> {
    // Telegram lists sizes smallest first; pixel area breaks ties when it does not
    sizes
        .iter()
        .enumerate()
        .max_by_key(|(i, p)| (u64::from(p.width) * u64::from(p.height), *i))
        .map(|(_, p)| p)
}

/// Whether a message without files deserves the "no files found" reply
///
/// Plain text chat is ignored; captions and forwards suggest the user
/// expected something to be backed up.
pub fn expected_files(message: &Message) -> bool {
    message.caption.is_some() || message.is_forwarded()
}

/// Message timestamp as UTC, falling back to now for bogus values
pub fn message_time(message: &Message) -> DateTime<Utc> {
    Utc.timestamp_opt(message.date, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
