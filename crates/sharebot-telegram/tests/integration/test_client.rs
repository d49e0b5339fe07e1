//! Bot API client behaviour against a mock server

use futures_util::TryStreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use sharebot_core::ports::{IFileSource, SourceRejected};
use sharebot_telegram::source::TelegramFileSource;
use sharebot_telegram::TelegramError;

use crate::common::{self, api_error, api_path, ok};

#[tokio::test]
async fn test_get_me_returns_bot_user() {
    let (_server, client) = common::setup_bot_api().await;

    let me = client.get_me().await.expect("getMe failed");

    assert_eq!(me.id, 999);
    assert!(me.is_bot);
    assert_eq!(me.username.as_deref(), Some("share_test_bot"));
}

#[tokio::test]
async fn test_get_updates_sends_offset_and_timeout() {
    let (server, client) = common::setup_bot_api().await;
    Mock::given(method("POST"))
        .and(path(api_path("getUpdates")))
        .and(body_partial_json(json!({"offset": 11, "timeout": 0})))
        .respond_with(ok(json!([common::message_update(11, 42, json!({"text": "hi"}))])))
        .expect(1)
        .mount(&server)
        .await;

    let updates = client.get_updates(Some(11), 0).await.unwrap();

    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].update_id, 11);
    let message = updates[0].message.as_ref().unwrap();
    assert_eq!(message.text.as_deref(), Some("hi"));
}

#[tokio::test]
async fn test_send_message_posts_chat_and_text() {
    let (server, client) = common::setup_bot_api().await;
    common::mount_replies(&server).await;

    let sent = client.send_message(42, "hello", Some(7)).await.unwrap();
    assert_eq!(sent.message_id, 500);

    let bodies = common::bodies(&server, "sendMessage").await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["chat_id"], 42);
    assert_eq!(bodies[0]["text"], "hello");
    assert_eq!(bodies[0]["reply_to_message_id"], 7);
}

#[tokio::test]
async fn test_edit_message_accepts_bool_result() {
    let (server, client) = common::setup_bot_api().await;
    Mock::given(method("POST"))
        .and(path(api_path("editMessageText")))
        .respond_with(ok(json!(true)))
        .mount(&server)
        .await;

    client.edit_message_text(42, 500, "done").await.unwrap();
}

#[tokio::test]
async fn test_429_is_retried_after_retry_after() {
    let (server, client) = common::setup_bot_api().await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .respond_with(api_error(429, "Too Many Requests: retry after 0", Some(0)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    common::mount_replies(&server).await;

    let sent = client.send_message(42, "hello", None).await.unwrap();

    assert_eq!(sent.message_id, 500);
    assert_eq!(common::bodies(&server, "sendMessage").await.len(), 2);
}

#[tokio::test]
async fn test_429_gives_up_after_retry_limit() {
    let (server, client) = common::setup_bot_api().await;
    let client = client.with_max_retries(2);
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .respond_with(api_error(429, "Too Many Requests: retry after 0", Some(0)))
        .mount(&server)
        .await;

    let err = client.send_message(42, "hello", None).await.unwrap_err();

    assert!(matches!(err, TelegramError::TooManyRequests { .. }));
    assert_eq!(common::bodies(&server, "sendMessage").await.len(), 3);
}

#[tokio::test]
async fn test_rejected_token_is_unauthorized() {
    let server = wiremock::MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("getMe")))
        .respond_with(api_error(401, "Unauthorized", None))
        .mount(&server)
        .await;
    let client = sharebot_telegram::BotClient::with_base_url(common::TOKEN, server.uri());

    let err = client.get_me().await.unwrap_err();

    assert!(matches!(err, TelegramError::Unauthorized(_)));
    assert!(!err.to_string().contains(common::TOKEN));
}

#[tokio::test]
async fn test_non_json_body_is_invalid_response() {
    let (server, client) = common::setup_bot_api().await;
    Mock::given(method("POST"))
        .and(path(api_path("getFile")))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let err = client.get_file("abc").await.unwrap_err();
    assert!(matches!(err, TelegramError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_file_source_streams_download() {
    let (server, client) = common::setup_bot_api().await;
    let content: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    common::mount_file(&server, "doc-1", "documents/file_1.pdf", &content).await;

    let source = TelegramFileSource::new(client, "doc-1");
    let stream = source.open().await.expect("open failed");
    let chunks: Vec<bytes::Bytes> = stream.try_collect().await.unwrap();
    let downloaded: Vec<u8> = chunks.concat();

    assert_eq!(downloaded, content);
    assert_eq!(source.describe(), "telegram:doc-1");
}

#[tokio::test]
async fn test_file_source_fails_when_get_file_fails() {
    let (server, client) = common::setup_bot_api().await;
    Mock::given(method("POST"))
        .and(path(api_path("getFile")))
        .respond_with(api_error(400, "Bad Request: file is too big", None))
        .mount(&server)
        .await;

    let source = TelegramFileSource::new(client, "huge");
    let err = source.open().await.err().expect("open should fail");
    assert!(format!("{err:#}").contains("file is too big"));
    assert!(SourceRejected::is_in(&err));
}

#[tokio::test]
async fn test_file_source_server_error_is_not_a_rejection() {
    let (server, client) = common::setup_bot_api().await;
    Mock::given(method("POST"))
        .and(path(api_path("getFile")))
        .respond_with(api_error(502, "Bad Gateway", None))
        .mount(&server)
        .await;

    let source = TelegramFileSource::new(client, "doc-1");
    let err = source.open().await.err().expect("open should fail");
    assert!(!SourceRejected::is_in(&err));
}

#[tokio::test]
async fn test_download_not_found() {
    let (server, client) = common::setup_bot_api().await;
    Mock::given(method("GET"))
        .and(path(format!("/file/bot{}/gone.jpg", common::TOKEN)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.download_stream("gone.jpg").await.err().unwrap();
    assert!(matches!(err, TelegramError::NotFound(_)));
}
