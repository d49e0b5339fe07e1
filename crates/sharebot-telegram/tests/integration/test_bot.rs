//! Dispatcher behaviour end to end: mock Bot API in, temp directory out

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use sharebot_core::domain::{SenderId, SingleUserAuthorizer};
use sharebot_telegram::bot::{Bot, BotSettings};
use sharebot_telegram::client::BotClient;
use sharebot_telegram::replies;

use crate::common;

const OWNER: i64 = 42;

fn bot(client: BotClient, root: &std::path::Path) -> Bot {
    let (pipeline, reporter) = common::relay_stack(root);
    Bot::new(
        client,
        pipeline,
        reporter,
        Arc::new(SingleUserAuthorizer::new(Some(SenderId::new(OWNER)))),
        BotSettings {
            poll_timeout: Duration::from_secs(0),
            shutdown_grace: Duration::from_secs(5),
            error_backoff: Duration::from_millis(50),
        },
    )
}

async fn run_until<F, Fut>(bot: Bot, until: F)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let handle = tokio::spawn(async move { bot.run(token).await });
    until().await;
    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("bot did not stop")
        .expect("bot task panicked");
    result.expect("bot returned an error");
}

#[tokio::test]
async fn test_document_is_backed_up_and_reply_edited() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("backups")).unwrap();
    let (server, client) = common::setup_bot_api().await;
    common::mount_replies(&server).await;
    common::mount_file(&server, "doc-1", "documents/file_1.pdf", b"%PDF-1.7 test").await;
    common::mount_updates(
        &server,
        json!([common::message_update(1, OWNER, json!({
            "document": {"file_id": "doc-1", "file_unique_id": "u1",
                         "file_name": "report.pdf", "file_size": 13}
        }))]),
    )
    .await;

    let bot = bot(client, dir.path());
    let server_ref = &server;
    run_until(bot, || async move {
        common::wait_for(server_ref, "editMessageText", 1).await;
    })
    .await;

    let stored = std::fs::read(dir.path().join("backups/report.pdf")).unwrap();
    assert_eq!(stored, b"%PDF-1.7 test");

    let sent = common::bodies(&server, "sendMessage").await;
    assert_eq!(sent[0]["text"], "Processing report.pdf...");
    let edits = common::bodies(&server, "editMessageText").await;
    assert_eq!(edits[0]["message_id"], 500);
    assert_eq!(
        edits[0]["text"],
        "✅ Backed up report.pdf → /backups/report.pdf (13 B)"
    );
}

#[tokio::test]
async fn test_same_name_twice_gets_suffix() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("backups")).unwrap();
    std::fs::write(dir.path().join("backups/photo.jpg"), b"old").unwrap();
    let (server, client) = common::setup_bot_api().await;
    common::mount_replies(&server).await;
    common::mount_file(&server, "p", "documents/p.jpg", b"new").await;
    common::mount_updates(
        &server,
        json!([common::message_update(1, OWNER, json!({
            "document": {"file_id": "p", "file_unique_id": "up", "file_name": "photo.jpg"}
        }))]),
    )
    .await;

    let server_ref = &server;
    run_until(bot(client, dir.path()), || async move {
        common::wait_for(server_ref, "editMessageText", 1).await;
    })
    .await;

    assert_eq!(std::fs::read(dir.path().join("backups/photo.jpg")).unwrap(), b"old");
    assert_eq!(std::fs::read(dir.path().join("backups/photo_1.jpg")).unwrap(), b"new");
}

#[tokio::test]
async fn test_unauthorized_sender_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (server, client) = common::setup_bot_api().await;
    common::mount_replies(&server).await;
    common::mount_updates(
        &server,
        json!([common::message_update(1, 7, json!({
            "document": {"file_id": "x", "file_unique_id": "ux", "file_name": "x.txt"}
        }))]),
    )
    .await;

    let server_ref = &server;
    run_until(bot(client, dir.path()), || async move {
        common::wait_for(server_ref, "sendMessage", 1).await;
    })
    .await;

    let sent = common::bodies(&server, "sendMessage").await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["chat_id"], 7);
    assert_eq!(sent[0]["text"], replies::UNAUTHORIZED);
    assert!(common::bodies(&server, "getFile").await.is_empty());
    assert!(!dir.path().join("backups").exists());
}

#[tokio::test]
async fn test_start_greets_by_first_name() {
    let dir = tempfile::tempdir().unwrap();
    let (server, client) = common::setup_bot_api().await;
    common::mount_replies(&server).await;
    common::mount_updates(
        &server,
        json!([common::message_update(1, OWNER, json!({"text": "/start"}))]),
    )
    .await;

    let server_ref = &server;
    run_until(bot(client, dir.path()), || async move {
        common::wait_for(server_ref, "sendMessage", 1).await;
    })
    .await;

    let sent = common::bodies(&server, "sendMessage").await;
    assert_eq!(sent[0]["text"], replies::greeting("Ada"));
}

#[tokio::test]
async fn test_caption_without_file_gets_hint_and_text_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let (server, client) = common::setup_bot_api().await;
    common::mount_replies(&server).await;
    common::mount_updates(
        &server,
        json!([
            common::message_update(1, OWNER, json!({"text": "just chatting"})),
            common::message_update(2, OWNER, json!({"caption": "where did it go"}))
        ]),
    )
    .await;

    let server_ref = &server;
    run_until(bot(client, dir.path()), || async move {
        common::wait_for(server_ref, "sendMessage", 1).await;
    })
    .await;

    let sent = common::bodies(&server, "sendMessage").await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["text"], replies::NO_FILES);
}

#[tokio::test]
async fn test_status_reports_unreachable_share() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("not-mounted");
    let (server, client) = common::setup_bot_api().await;
    common::mount_replies(&server).await;
    common::mount_updates(
        &server,
        json!([common::message_update(1, OWNER, json!({"text": "/status"}))]),
    )
    .await;

    let server_ref = &server;
    run_until(bot(client, &missing), || async move {
        common::wait_for(server_ref, "sendMessage", 1).await;
    })
    .await;

    let sent = common::bodies(&server, "sendMessage").await;
    let text = sent[0]["text"].as_str().unwrap();
    assert!(text.starts_with("✅ Bot is operational"));
    assert!(text.contains("❌ File share connection failed"));
    assert!(text.contains("Backup directory: /backups"));
}

#[tokio::test]
async fn test_failed_download_reports_category() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("backups")).unwrap();
    let (server, client) = common::setup_bot_api().await;
    common::mount_replies(&server).await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path(common::api_path("getFile")))
        .respond_with(common::api_error(400, "Bad Request: file is too big", None))
        .mount(&server)
        .await;
    common::mount_updates(
        &server,
        json!([common::message_update(1, OWNER, json!({
            "video": {"file_id": "v", "file_unique_id": "uv"}
        }))]),
    )
    .await;

    let server_ref = &server;
    run_until(bot(client, dir.path()), || async move {
        common::wait_for(server_ref, "editMessageText", 1).await;
    })
    .await;

    let edits = common::bodies(&server, "editMessageText").await;
    assert_eq!(
        edits[0]["text"],
        "❌ Failed to back up video_uv.mp4: the file could not be downloaded"
    );
    assert_eq!(std::fs::read_dir(dir.path().join("backups")).unwrap().count(), 0);
}
