//! Shared test helpers for Bot API integration tests
//!
//! Mounts mock Bot API endpoints and builds a relay stack that writes into
//! a temporary directory through the mounted-share adapter.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use sharebot_core::domain::{FileNamer, RetryPolicy, SharePath};
use sharebot_core::usecases::{
    OutcomeTracker, RemoteShareClient, ShareSummary, StatusReporter, TransferPipeline,
    TransferSettings,
};
use sharebot_share::MountedShareConnector;
use sharebot_telegram::client::BotClient;

pub const TOKEN: &str = "123:test-token";

pub fn api_path(method_name: &str) -> String {
    format!("/bot{TOKEN}/{method_name}")
}

pub fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": result}))
}

pub fn api_error(status: u16, description: &str, retry_after: Option<u64>) -> ResponseTemplate {
    let mut body = json!({"ok": false, "error_code": status, "description": description});
    if let Some(secs) = retry_after {
        body["parameters"] = json!({"retry_after": secs});
    }
    ResponseTemplate::new(status).set_body_json(body)
}

/// Starts a mock server answering `getMe` and returns a client for it
pub async fn setup_bot_api() -> (MockServer, BotClient) {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(api_path("getMe")))
        .respond_with(ok(json!({
            "id": 999,
            "is_bot": true,
            "first_name": "ShareBot",
            "username": "share_test_bot"
        })))
        .mount(&server)
        .await;

    let client = BotClient::with_base_url(TOKEN, server.uri());
    (server, client)
}

/// Mounts `getFile` + download for one file
pub async fn mount_file(server: &MockServer, file_id: &str, file_path: &str, content: &[u8]) {
    Mock::given(method("POST"))
        .and(path(api_path("getFile")))
        .and(wiremock::matchers::body_partial_json(json!({"file_id": file_id})))
        .respond_with(ok(json!({
            "file_id": file_id,
            "file_unique_id": format!("u-{file_id}"),
            "file_size": content.len(),
            "file_path": file_path
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/file/bot{TOKEN}/{file_path}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(server)
        .await;
}

/// Mounts `sendMessage` / `editMessageText` answering with a sent message
pub async fn mount_replies(server: &MockServer) {
    let sent = json!({
        "message_id": 500,
        "chat": {"id": 42, "type": "private"},
        "date": 1_700_000_000,
        "text": "ok"
    });
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .respond_with(ok(sent.clone()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("editMessageText")))
        .respond_with(ok(sent))
        .mount(server)
        .await;
}

/// Serves `updates` once, then empty long polls
pub async fn mount_updates(server: &MockServer, updates: Value) {
    Mock::given(method("POST"))
        .and(path(api_path("getUpdates")))
        .respond_with(ok(updates))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("getUpdates")))
        .respond_with(ok(json!([])).set_delay(Duration::from_millis(50)))
        .mount(server)
        .await;
}

pub fn message_update(update_id: i64, from_id: i64, fields: Value) -> Value {
    let mut message = json!({
        "message_id": update_id * 10,
        "from": {"id": from_id, "is_bot": false, "first_name": "Ada"},
        "chat": {"id": from_id, "type": "private"},
        "date": 1_700_000_000
    });
    if let (Some(obj), Some(extra)) = (message.as_object_mut(), fields.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
    json!({"update_id": update_id, "message": message})
}

/// Pipeline and reporter writing under `root` with backups in `/backups`
pub fn relay_stack(root: &Path) -> (Arc<TransferPipeline>, Arc<StatusReporter>) {
    let backups = SharePath::new("/backups".to_string()).unwrap();
    let share = Arc::new(RemoteShareClient::new(
        Arc::new(MountedShareConnector::new(root.to_path_buf())),
        RetryPolicy::none(),
        backups.clone(),
    ));
    let tracker = Arc::new(OutcomeTracker::new());
    let pipeline = Arc::new(TransferPipeline::new(
        Arc::clone(&share),
        FileNamer::new(backups, false),
        TransferSettings {
            backoff: RetryPolicy::none(),
            ..TransferSettings::default()
        },
        Arc::clone(&tracker),
    ));
    let summary = ShareSummary {
        endpoint: share.endpoint(),
        backup_directory: "/backups".to_string(),
        ..ShareSummary::default()
    };
    let reporter = Arc::new(StatusReporter::new(share, tracker, summary));
    (pipeline, reporter)
}

/// JSON bodies of every request received on `method_name`
pub async fn bodies(server: &MockServer, method_name: &str) -> Vec<Value> {
    let wanted = api_path(method_name);
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r: &&Request| r.url.path() == wanted)
        .filter_map(|r| serde_json::from_slice(&r.body).ok())
        .collect()
}

/// Polls until `count` requests hit `method_name`, or panics after 5 s
pub async fn wait_for(server: &MockServer, method_name: &str, count: usize) -> Vec<Value> {
    for _ in 0..250 {
        let seen = bodies(server, method_name).await;
        if seen.len() >= count {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {count} {method_name} call(s)");
}
