use crate::fixtures::{seed::SeededUser, test_app::TestApp};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(app: &TestApp, user: &SeededUser, consultation_id: &str) -> Socket {
    let url = app.ws_url(&format!(
        "/ws/consultation/{}?token={}",
        consultation_id, user.access_token
    ));
    let (mut socket, _) = connect_async(url).await.expect("WebSocket connect failed");

    let connected = next_json(&mut socket).await;
    assert_eq!(connected["type"], "connected");
    assert_eq!(connected["data"]["consultation_id"], consultation_id);
    socket
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Socket closed")
            .expect("Socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Reads frames until one of `kind` satisfies `pred`.
async fn wait_for(socket: &mut Socket, kind: &str, pred: impl Fn(&Value) -> bool) -> Value {
    loop {
        let msg = next_json(socket).await;
        if msg["type"] == kind && pred(&msg["data"]) {
            return msg;
        }
    }
}

async fn send(socket: &mut Socket, value: Value) {
    socket
        .send(Message::text(value.to_string()))
        .await
        .expect("Failed to send frame");
}

fn transport(role: &str, kind: &str, text: &str) -> Value {
    serde_json::json!({
        "type": "transcript",
        "role": role,
        "transcriptType": kind,
        "transcript": text,
    })
}

fn finalized_len(data: &Value) -> usize {
    data["finalized_messages"].as_array().map_or(0, |m| m.len())
}

#[tokio::test]
async fn streamed_call_is_reconciled_and_persisted() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_live", "Uma");
    let created = app.create_consultation(&user, "Live call").await;
    let id = created["id"].as_str().unwrap();

    let mut socket = connect(&app, &user, id).await;
    let initial = wait_for(&mut socket, "transcript:update", |_| true).await;
    assert_eq!(finalized_len(&initial["data"]), 0);
    assert!(initial["data"]["pending"].is_null());

    let resp = app
        .auth_get(&format!("/api/consultation/{}", id), &user.access_token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "in-progress");

    send(&mut socket, transport("assistant", "partial", "Hello, how")).await;
    let update = wait_for(&mut socket, "transcript:update", |d| !d["pending"].is_null()).await;
    assert_eq!(update["data"]["pending"]["speaker"], "agent");
    assert_eq!(update["data"]["pending"]["text"], "Hello, how");

    send(&mut socket, transport("assistant", "final", "Hello, how can I help?")).await;
    let update = wait_for(&mut socket, "transcript:update", |d| finalized_len(d) == 1).await;
    assert!(update["data"]["pending"].is_null());
    assert_eq!(update["data"]["finalized_messages"][0]["text"], "Hello, how can I help?");

    // Status updates and non-JSON frames are ignored.
    send(&mut socket, serde_json::json!({ "type": "status-update", "status": "in-progress" })).await;
    socket.send(Message::text("not json")).await.unwrap();

    send(&mut socket, transport("user", "partial", "I want to")).await;
    send(&mut socket, transport("user", "final", "I want to retire early")).await;
    let update = wait_for(&mut socket, "transcript:update", |d| finalized_len(d) == 2).await;
    assert_eq!(update["data"]["finalized_messages"][1]["speaker"], "user");

    send(&mut socket, serde_json::json!({ "type": "call-end" })).await;
    let ended = wait_for(&mut socket, "call-ended", |_| true).await;
    assert_eq!(ended["data"]["message_count"], 2);

    let resp = app
        .auth_get(&format!("/api/consultation/{}/transcript", id), &user.access_token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "completed");
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["speaker"], "agent");
    assert_eq!(messages[0]["text"], "Hello, how can I help?");
    assert_eq!(messages[1]["speaker"], "user");
    assert_eq!(messages[1]["text"], "I want to retire early");
}

#[tokio::test]
async fn quiet_period_finalizes_stalled_stream() {
    let app = TestApp::spawn_with_settings(|s| s.transcript.quiet_period_ms = 150).await;
    let user = app.seed_user("user_quiet", "Vic");
    let created = app.create_consultation(&user, "Quiet").await;
    let id = created["id"].as_str().unwrap();

    let mut socket = connect(&app, &user, id).await;
    send(&mut socket, transport("assistant", "partial", "Let me think")).await;
    wait_for(&mut socket, "transcript:update", |d| !d["pending"].is_null()).await;

    let update = wait_for(&mut socket, "transcript:update", |d| finalized_len(d) == 1).await;
    assert!(update["data"]["pending"].is_null());
    assert_eq!(update["data"]["finalized_messages"][0]["text"], "Let me think");
}

#[tokio::test]
async fn call_end_finalizes_pending_stream() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_end_pending", "Wes");
    let created = app.create_consultation(&user, "Cut off").await;
    let id = created["id"].as_str().unwrap();

    let mut socket = connect(&app, &user, id).await;
    send(&mut socket, transport("user", "partial", "One last question")).await;
    wait_for(&mut socket, "transcript:update", |d| !d["pending"].is_null()).await;

    send(&mut socket, serde_json::json!({ "type": "call-end" })).await;
    let update = wait_for(&mut socket, "transcript:update", |d| finalized_len(d) == 1).await;
    assert!(update["data"]["pending"].is_null());
    let ended = wait_for(&mut socket, "call-ended", |_| true).await;
    assert_eq!(ended["data"]["message_count"], 1);
}

#[tokio::test]
async fn disconnect_keeps_session_for_other_viewers() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_viewers", "Xan");
    let created = app.create_consultation(&user, "Shared").await;
    let id = created["id"].as_str().unwrap();

    let mut first = connect(&app, &user, id).await;
    let mut second = connect(&app, &user, id).await;

    send(&mut first, transport("assistant", "final", "Welcome back")).await;
    wait_for(&mut second, "transcript:update", |d| finalized_len(d) == 1).await;

    first.close(None).await.unwrap();
    drop(first);

    send(&mut second, transport("user", "final", "Thanks")).await;
    wait_for(&mut second, "transcript:update", |d| finalized_len(d) == 2).await;

    // A later viewer sees the log so far.
    let mut third = connect(&app, &user, id).await;
    wait_for(&mut third, "transcript:update", |d| finalized_len(d) == 2).await;

    let resp = app
        .auth_post(&format!("/api/consultation/{}/end", id), &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["transcript_length"], 2);

    // The ended session rejects further events.
    send(&mut second, transport("user", "final", "Hello?")).await;
    wait_for(&mut second, "error", |_| true).await;
}

/// Polls the stored transcript until the consultation reports `status`.
async fn wait_for_status(app: &TestApp, user: &SeededUser, id: &str, status: &str) -> Value {
    for _ in 0..50 {
        let resp = app
            .auth_get(&format!("/api/consultation/{}/transcript", id), &user.access_token)
            .send()
            .await
            .unwrap();
        let json: Value = resp.json().await.unwrap();
        if json["status"] == status {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("Consultation {id} never reached status {status}");
}

#[tokio::test]
async fn last_viewer_leaving_ends_and_saves_call() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_last_leaves", "Ada");
    let created = app.create_consultation(&user, "Walked away").await;
    let id = created["id"].as_str().unwrap();

    let mut first = connect(&app, &user, id).await;
    let mut second = connect(&app, &user, id).await;
    send(&mut first, transport("assistant", "final", "Welcome")).await;
    send(&mut first, transport("user", "partial", "I was wondering")).await;
    wait_for(&mut second, "transcript:update", |d| !d["pending"].is_null()).await;

    first.close(None).await.unwrap();
    drop(first);
    second.close(None).await.unwrap();
    drop(second);

    let json = wait_for_status(&app, &user, id, "completed").await;
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["text"], "Welcome");
    assert_eq!(messages[1]["text"], "I was wondering");

    let health: Value = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["live_sessions"], 0);

    // Rejoining starts a fresh call rather than reviving the old log.
    let mut again = connect(&app, &user, id).await;
    let initial = wait_for(&mut again, "transcript:update", |_| true).await;
    assert_eq!(finalized_len(&initial["data"]), 0);

    // Leaving a silent call keeps the saved transcript.
    again.close(None).await.unwrap();
    drop(again);
    let saved = wait_for_status(&app, &user, id, "completed").await;
    assert_eq!(saved["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn end_without_live_session_only_completes() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_no_session", "Yara");
    let created = app.create_consultation(&user, "Never started").await;
    let id = created["id"].as_str().unwrap();

    let resp = app
        .auth_post(&format!("/api/consultation/{}/end", id), &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["transcript_length"], 0);
}

#[tokio::test]
async fn ping_gets_pong() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_ping", "Zed");
    let created = app.create_consultation(&user, "Ping").await;
    let id = created["id"].as_str().unwrap();

    let mut socket = connect(&app, &user, id).await;
    send(&mut socket, serde_json::json!({ "type": "ping" })).await;
    wait_for(&mut socket, "pong", |_| true).await;
}
