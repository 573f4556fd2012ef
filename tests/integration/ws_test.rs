//! Integration tests for the WebSocket progress stream.

mod helpers;

use std::time::Duration;

use futures::StreamExt;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use helpers::progress;

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(addr: std::net::SocketAddr, user: i64) -> Socket {
    let mut request = format!("ws://{addr}/ws/progress")
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("x-user-id", user.to_string().parse().unwrap());
    let (socket, _) = connect_async(request).await.expect("WebSocket handshake");
    socket
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("message should arrive")
            .expect("stream open")
            .expect("frame");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn wait_for_connections(app: &helpers::TestApp, expected: usize) {
    for _ in 0..200 {
        if app.realtime.connections.connection_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {expected} open connections");
}

async fn wait_for_subscriber(app: &helpers::TestApp, group: &str) {
    for _ in 0..200 {
        if app.realtime.bus.subscriber_count(group).await > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("nobody joined {group}");
}

#[tokio::test]
async fn test_upgrade_without_identity_is_refused() {
    let app = helpers::TestApp::new().await;
    let addr = app.spawn().await;

    let result = connect_async(format!("ws://{addr}/ws/progress")).await;
    assert!(result.is_err(), "handshake should fail without x-user-id");
}

#[tokio::test]
async fn test_late_joiner_gets_replay_then_live_updates() {
    let app = helpers::TestApp::new().await;
    app.add_member(7, 1).await;
    let addr = app.spawn().await;

    app.request(
        "POST",
        "/api/progress/1",
        Some(json!([progress("algorithm", "g", "u1", "started", Some(30))])),
        None,
    )
    .await;

    let mut socket = connect(addr, 7).await;
    let replayed = next_json(&mut socket).await;
    assert_eq!(replayed["uid"], "u1");
    assert_eq!(replayed["progress"], 30);

    wait_for_subscriber(&app, "algorithm_1").await;

    app.request(
        "POST",
        "/api/progress/1",
        Some(json!([progress("algorithm", "g", "u1", "started", Some(60))])),
        None,
    )
    .await;
    let live = next_json(&mut socket).await;
    assert_eq!(live["uid"], "u1");
    assert_eq!(live["progress"], 60);
}

#[tokio::test]
async fn test_other_projects_are_not_streamed() {
    let app = helpers::TestApp::new().await;
    app.add_member(7, 1).await;
    let addr = app.spawn().await;

    let mut socket = connect(addr, 7).await;
    wait_for_subscriber(&app, "upload_1").await;

    app.request(
        "POST",
        "/api/progress/2",
        Some(json!([progress("upload", "g", "elsewhere", "started", Some(5))])),
        None,
    )
    .await;
    app.request(
        "POST",
        "/api/progress/1",
        Some(json!([progress("upload", "g", "mine", "started", Some(5))])),
        None,
    )
    .await;

    let first = next_json(&mut socket).await;
    assert_eq!(first["uid"], "mine");
    assert_eq!(first["project_id"], 1);
}

#[tokio::test]
async fn test_closing_socket_unsubscribes() {
    let app = helpers::TestApp::new().await;
    app.add_member(9, 4).await;
    let addr = app.spawn().await;

    let mut socket = connect(addr, 9).await;
    wait_for_connections(&app, 1).await;

    socket.close(None).await.unwrap();
    wait_for_connections(&app, 0).await;

    for _ in 0..200 {
        if app.realtime.bus.group_count().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("groups should be pruned after the last subscriber leaves");
}
