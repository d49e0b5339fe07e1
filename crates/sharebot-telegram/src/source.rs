//! Telegram file download as an [`IFileSource`]

use anyhow::Context;
use sharebot_core::ports::{ByteStream, IFileSource, SourceRejected};
use tracing::debug;

use crate::client::BotClient;
use crate::TelegramError;

/// Re-openable download of one Telegram file
///
/// Each `open` resolves a fresh download path with `getFile`; the paths
/// Telegram hands out expire after about an hour.
#[derive(Debug, Clone)]
pub struct TelegramFileSource {
    client: BotClient,
    file_id: String,
}

impl TelegramFileSource {
    pub fn new(client: BotClient, file_id: impl Into<String>) -> Self {
        Self {
            client,
            file_id: file_id.into(),
        }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }
}

#[async_trait::async_trait]
impl IFileSource for TelegramFileSource {
    async fn open(&self) -> anyhow::Result<ByteStream> {
        let file = self
            .client
            .get_file(&self.file_id)
            .await
            .map_err(into_source_error)
            .with_context(|| format!("getFile failed for {}", self.file_id))?;

        let path = file
            .file_path
            .with_context(|| format!("Telegram returned no download path for {}", self.file_id))?;
        debug!(file_id = %self.file_id, size = ?file.file_size, "Opening download");

        let stream = self
            .client
            .download_stream(&path)
            .await
            .map_err(into_source_error)
            .with_context(|| format!("download failed for {}", self.file_id))?;
        Ok(stream)
    }

    fn describe(&self) -> String {
        format!("telegram:{}", self.file_id)
    }
}

fn into_source_error(err: TelegramError) -> anyhow::Error {
    if err.is_rejection() {
        SourceRejected::new(err.to_string()).into()
    } else {
        err.into()
    }
}
