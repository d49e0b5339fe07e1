//! Chat reply texts
//!
//! Replies name failure categories in plain words. Raw error details go to
//! the log, never to the chat.

use sharebot_core::domain::TransferOutcome;
use sharebot_core::usecases::{ShareHealth, StatusReport};

pub const UNAUTHORIZED: &str = "Sorry, you are not authorized to use this bot.";

pub const HELP: &str = "I can help you back up files to your file share.\n\n\
    Just send me any file, document, photo, video, or forward a message \
    containing files, and I'll back them up automatically.\n\n\
    Available commands:\n\
    /start - Start the bot\n\
    /help - Show this help message\n\
    /status - Check the bot and file share status";

pub const NO_FILES: &str = "I didn't find any files to back up in this message. \
    Please send me a file directly or forward a message containing a file.";

pub const UNKNOWN_COMMAND: &str = "Unknown command. Use /help to see available commands.";

pub fn greeting(first_name: &str) -> String {
    format!("Hi {first_name}! I'm your backup bot. Use /help to see available commands.")
}

pub fn processing(name: &str) -> String {
    format!("Processing {name}...")
}

/// Final text for one attachment
pub fn outcome(name: &str, outcome: &TransferOutcome) -> String {
    let text = match outcome {
        TransferOutcome::Success {
            bytes_written,
            target_path,
            ..
        } => format!(
            "✅ Backed up {name} → {target_path} ({})",
            human_size(*bytes_written)
        ),
        TransferOutcome::Failure { error_kind, .. } => {
            format!("❌ Failed to back up {name}: {}", error_kind.describe())
        }
    };
    match outcome.leftover() {
        Some(path) => format!("{text}\n⚠️ A partial file could not be removed: {path}"),
        None => text,
    }
}

/// `/status` reply
pub fn status(report: &StatusReport) -> String {
    let mut lines = vec!["✅ Bot is operational".to_string()];

    match &report.share_status {
        ShareHealth::Healthy => lines.push("✅ File share connection successful".to_string()),
        ShareHealth::Degraded { .. } => {
            lines.push("⚠️ File share reachable, but the backup folder is not usable".to_string())
        }
        ShareHealth::Unreachable { .. } => {
            lines.push("❌ File share connection failed".to_string());
            lines.push("Please check your file share settings.".to_string());
        }
    }

    let share = &report.share;
    if !share.server.is_empty() {
        lines.push(format!("Server: {}", share.server));
    }
    if !share.share.is_empty() {
        lines.push(format!("Share: {}", share.share));
    }
    lines.push(format!("Backup directory: {}", share.backup_directory));

    lines.push(format!(
        "Transfers: {} succeeded, {} failed, {} in progress",
        report.transfers_succeeded, report.transfers_failed, report.transfers_in_flight
    ));

    if let Some(last) = &report.last_transfer_outcome {
        let when = last.finished_at.format("%Y-%m-%d %H:%M:%S UTC");
        let line = match &last.outcome {
            TransferOutcome::Success { target_path, .. } => {
                format!("Last transfer: ✅ {target_path} ({when})")
            }
            TransferOutcome::Failure { error_kind, .. } => {
                format!("Last transfer: ❌ {} ({when})", error_kind.describe())
            }
        };
        lines.push(line);
    }

    lines.join("\n")
}

/// Size in binary units with one decimal, e.g. `1.5 MB`
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use sharebot_core::domain::{TargetPath, TransferErrorKind};
    use sharebot_core::usecases::{RecordedOutcome, ShareSummary};

    use super::*;

    fn report(share_status: ShareHealth) -> StatusReport {
        StatusReport {
            bot_alive: true,
            share_status,
            last_transfer_outcome: None,
            transfers_succeeded: 3,
            transfers_failed: 1,
            transfers_in_flight: 0,
            share: ShareSummary {
                endpoint: "smb://nas:445/backup".into(),
                server: "nas".into(),
                share: "backup".into(),
                server_name: None,
                backup_directory: "/telegram".into(),
            },
            checked_at: Utc::now(),
        }
    }

    #[test]
    fn human_sizes() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn success_reply_names_target() {
        let text = outcome(
            "photo.jpg",
            &TransferOutcome::Success {
                bytes_written: 2048,
                target_path: TargetPath::parse("/backups/photo_1.jpg").unwrap(),
                duration: Duration::from_millis(10),
                leftover: None,
            },
        );
        assert_eq!(text, "✅ Backed up photo.jpg → /backups/photo_1.jpg (2.0 KB)");
    }

    #[test]
    fn failure_reply_uses_category_text_only() {
        let text = outcome(
            "a.bin",
            &TransferOutcome::failure(
                TransferErrorKind::ConnectionError,
                "connect: Connection refused (os error 111)",
            ),
        );
        assert_eq!(
            text,
            "❌ Failed to back up a.bin: the file share could not be reached"
        );
        assert!(!text.contains("os error"));
    }

    #[test]
    fn failure_reply_mentions_leftover() {
        let failure = TransferOutcome::Failure {
            error_kind: TransferErrorKind::PartialWrite,
            message: "short write".into(),
            retries_attempted: 2,
            leftover: Some(TargetPath::parse("/b/a.bin").unwrap()),
        };
        let text = outcome("a.bin", &failure);
        assert!(text.contains("/b/a.bin"));
        assert!(text.starts_with("❌ Failed to back up a.bin: the upload was interrupted"));
    }

    #[test]
    fn success_reply_warns_about_earlier_partial_file() {
        let text = outcome(
            "a.bin",
            &TransferOutcome::Success {
                bytes_written: 1000,
                target_path: TargetPath::parse("/b/a_1.bin").unwrap(),
                duration: Duration::from_millis(10),
                leftover: Some(TargetPath::parse("/b/a.bin").unwrap()),
            },
        );
        assert_eq!(
            text,
            "✅ Backed up a.bin → /b/a_1.bin (1000 B)\n⚠️ A partial file could not be removed: /b/a.bin"
        );
    }

    #[test]
    fn status_reply_for_healthy_share() {
        let mut r = report(ShareHealth::Healthy);
        r.last_transfer_outcome = Some(RecordedOutcome {
            outcome: TransferOutcome::failure(TransferErrorKind::SizeExceeded, "too big"),
            finished_at: Utc::now(),
        });
        let text = status(&r);
        assert!(text.starts_with("✅ Bot is operational\n✅ File share connection successful"));
        assert!(text.contains("Server: nas"));
        assert!(text.contains("Backup directory: /telegram"));
        assert!(text.contains("3 succeeded, 1 failed, 0 in progress"));
        assert!(text.contains("Last transfer: ❌ the file is larger"));
    }

    #[test]
    fn status_reply_for_unreachable_share() {
        let text = status(&report(ShareHealth::Unreachable {
            reason: "timeout".into(),
        }));
        assert!(text.contains("❌ File share connection failed"));
        assert!(!text.contains("timeout"));
    }
}
