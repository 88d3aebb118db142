//! End-to-end session tests against scripted loopback servers.
//!
//! Each test binds a local listener, accepts the client's socket, plays the
//! server side of the handshake, and then follows a per-test script.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use hasslink_client::config::ClientConfig;
use hasslink_client::Client;
use hasslink_core::protocol::command::CommandFrame;
use hasslink_core::HassLinkError;

type ServerWs = WebSocketStream<TcpStream>;

const TOKEN: &str = "secret-token";
const VERSION: &str = "2025.7.1";

async fn bind() -> (TcpListener, ClientConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, ClientConfig::new(format!("http://{addr}"), TOKEN))
}

async fn accept(listener: &TcpListener) -> ServerWs {
    let (stream, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .unwrap()
        .unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

async fn send_json(ws: &mut ServerWs, v: Value) {
    ws.send(Message::Text(v.to_string().into())).await.unwrap();
}

async fn recv_json(ws: &mut ServerWs) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a client frame")
            .unwrap()
            .unwrap();
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(p) => ws.send(Message::Pong(p)).await.unwrap(),
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn serve_handshake(ws: &mut ServerWs) {
    send_json(ws, json!({"type": "auth_required", "ha_version": VERSION})).await;
    let auth = recv_json(ws).await;
    assert_eq!(auth["type"], "auth");
    assert_eq!(auth["access_token"], TOKEN);
    assert!(auth.get("id").is_none(), "credential must not carry an id");
    send_json(ws, json!({"type": "auth_ok", "ha_version": VERSION})).await;
}

#[tokio::test]
async fn session_establishment_records_version() {
    let (listener, cfg) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        serve_handshake(&mut ws).await;
        ws
    });

    let client = Client::connect(cfg).await.unwrap();
    assert_eq!(client.server_version(), Some(VERSION));
    let _ws = server.await.unwrap();
}

#[tokio::test]
async fn rejected_credential_fails_establishment_and_goes_quiet() {
    let (listener, cfg) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        send_json(&mut ws, json!({"type": "auth_required", "ha_version": VERSION})).await;
        let auth = recv_json(&mut ws).await;
        assert_eq!(auth["type"], "auth");
        send_json(
            &mut ws,
            json!({"type": "auth_invalid", "message": "Invalid password"}),
        )
        .await;

        // nothing but a close may follow
        match timeout(Duration::from_secs(1), ws.next()).await {
            Err(_) | Ok(None) | Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) => {}
            Ok(Some(Ok(other))) => panic!("client sent traffic after rejection: {other:?}"),
        }
    });

    let err = Client::connect(cfg).await.unwrap_err();
    let HassLinkError::AuthRejected { message } = err else {
        panic!("expected auth rejection, got {err}");
    };
    assert_eq!(message.as_deref(), Some("Invalid password"));
    server.await.unwrap();
}

#[tokio::test]
async fn concurrent_commands_correlate_through_interleaved_results() {
    let (listener, cfg) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        serve_handshake(&mut ws).await;

        let first = recv_json(&mut ws).await;
        let second = recv_json(&mut ws).await;
        let mut ids = [first["id"].as_u64().unwrap(), second["id"].as_u64().unwrap()];
        ids.sort_unstable();
        assert_eq!(ids, [1, 2]);

        let id_of = |kind: &str| {
            if first["type"] == kind {
                first["id"].as_u64().unwrap()
            } else {
                assert_eq!(second["type"], kind);
                second["id"].as_u64().unwrap()
            }
        };
        let cfg_id = id_of("get_config");
        let states_id = id_of("get_states");

        // noise for an id nobody is waiting on, then answers out of order
        send_json(
            &mut ws,
            json!({"id": 999, "type": "result", "success": true, "result": null}),
        )
        .await;
        send_json(
            &mut ws,
            json!({"id": states_id, "type": "result", "success": true, "result": {"states": []}}),
        )
        .await;
        send_json(
            &mut ws,
            json!({"id": cfg_id, "type": "result", "success": true, "result": {"cfg": true}}),
        )
        .await;

        // a later command continues the same id sequence
        let third = recv_json(&mut ws).await;
        assert_eq!(third["id"], 3);
        send_json(
            &mut ws,
            json!({"id": 3, "type": "result", "success": true, "result": null}),
        )
        .await;
        ws
    });

    let client = Client::connect(cfg).await.unwrap();
    let (config_res, states_res) = tokio::join!(
        client.send_and_await(CommandFrame::new("get_config")),
        client.send_and_await(CommandFrame::new("get_states")),
    );
    assert!(config_res.unwrap().unwrap().get().contains("\"cfg\""));
    assert!(states_res.unwrap().unwrap().get().contains("\"states\""));

    client.ping().await.unwrap();
    let _ws = server.await.unwrap();
}

#[tokio::test]
async fn failed_command_surfaces_the_error_payload() {
    let (listener, cfg) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        serve_handshake(&mut ws).await;
        let cmd = recv_json(&mut ws).await;
        send_json(
            &mut ws,
            json!({
                "id": cmd["id"], "type": "result", "success": false,
                "error": {"code": "not_found", "message": "Service not found."}
            }),
        )
        .await;
        ws
    });

    let client = Client::connect(cfg).await.unwrap();
    let err = client
        .call_service("light", "does_not_exist", None, None)
        .await
        .unwrap_err();
    let HassLinkError::CommandFailed { error } = err else {
        panic!("expected command failure, got {err}");
    };
    assert!(error.contains("not_found"));
    let _ws = server.await.unwrap();
}

#[tokio::test]
async fn malformed_frames_do_not_interrupt_valid_traffic() {
    let (listener, cfg) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        serve_handshake(&mut ws).await;
        let cmd = recv_json(&mut ws).await;

        ws.send(Message::Text("{this is not json".into()))
            .await
            .unwrap();
        send_json(&mut ws, json!({"type": "wobble", "id": 3})).await;
        send_json(
            &mut ws,
            json!({"id": cmd["id"], "type": "result", "success": true, "result": {"ok": 1}}),
        )
        .await;
        ws
    });

    let client = Client::connect(cfg).await.unwrap();
    let result = client.get_config().await.unwrap().unwrap();
    assert!(result.get().contains("\"ok\""));
    let _ws = server.await.unwrap();
}

#[tokio::test]
async fn ids_restart_at_one_after_reconnect() {
    let (listener, cfg) = bind().await;
    let server = tokio::spawn(async move {
        // first epoch: one command, then the connection dies
        let mut ws = accept(&listener).await;
        serve_handshake(&mut ws).await;
        let cmd = recv_json(&mut ws).await;
        assert_eq!(cmd["id"], 1);
        send_json(
            &mut ws,
            json!({"id": 1, "type": "result", "success": true, "result": null}),
        )
        .await;
        drop(ws);

        // second epoch: handshake again, ids start over
        let mut ws = accept(&listener).await;
        serve_handshake(&mut ws).await;
        let cmd = recv_json(&mut ws).await;
        assert_eq!(cmd["id"], 1, "id counter must reset with the new epoch");
        send_json(
            &mut ws,
            json!({"id": 1, "type": "result", "success": true, "result": null}),
        )
        .await;
        ws
    });

    let client = Client::connect(cfg).await.unwrap();
    client.ping().await.unwrap();

    // the reconnect window can still reset a first attempt or two
    loop {
        match client.ping().await {
            Ok(()) => break,
            Err(e) if e.is_retryable() => sleep(Duration::from_millis(50)).await,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    let _ws = server.await.unwrap();
}

#[tokio::test]
async fn pending_command_fails_when_its_epoch_ends() {
    let (listener, cfg) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        serve_handshake(&mut ws).await;
        let _cmd = recv_json(&mut ws).await;
        // never answer; kill the connection instead
        drop(ws);
    });

    let client = Client::connect(cfg).await.unwrap();
    let err = client.get_states().await.unwrap_err();
    assert!(
        matches!(err, HassLinkError::ConnectionReset),
        "expected a reset, got {err}"
    );
    server.await.unwrap();
}

#[tokio::test]
async fn event_stream_filters_by_subscription_id_and_unsubscribes() {
    let (listener, cfg) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        serve_handshake(&mut ws).await;

        let sub = recv_json(&mut ws).await;
        assert_eq!(sub["type"], "subscribe_events");
        assert_eq!(sub["event_type"], "state_changed");
        let sub_id = sub["id"].as_u64().unwrap();
        send_json(
            &mut ws,
            json!({"id": sub_id, "type": "result", "success": true, "result": null}),
        )
        .await;

        send_json(
            &mut ws,
            json!({"id": sub_id, "type": "event", "event": {"seq": 1}}),
        )
        .await;
        // an event for someone else's subscription
        send_json(
            &mut ws,
            json!({"id": sub_id + 8, "type": "event", "event": {"seq": 2}}),
        )
        .await;
        send_json(
            &mut ws,
            json!({"id": sub_id, "type": "event", "event": {"seq": 3}}),
        )
        .await;

        let unsub = recv_json(&mut ws).await;
        assert_eq!(unsub["type"], "unsubscribe_events");
        assert_eq!(unsub["subscription"], sub_id);
        assert!(unsub["id"].as_u64().unwrap() > sub_id);

        // exactly one unsubscribe
        match timeout(Duration::from_millis(300), ws.next()).await {
            Err(_) | Ok(None) | Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) => {}
            Ok(Some(Ok(other))) => panic!("unexpected traffic after unsubscribe: {other:?}"),
        }
        ws
    });

    let client = Client::connect(cfg).await.unwrap();
    let mut events = client.subscribe_events(Some("state_changed")).await.unwrap();
    assert_eq!(events.subscription_id(), 1);

    let first = events.next().await.unwrap();
    assert!(first.get().contains("\"seq\":1"));
    let second = events.next().await.unwrap();
    assert!(
        second.get().contains("\"seq\":3"),
        "foreign event must be filtered out"
    );

    events.close().await;
    let _ws = server.await.unwrap();
}

#[tokio::test]
async fn refused_subscription_fails_the_facade() {
    let (listener, cfg) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        serve_handshake(&mut ws).await;
        let sub = recv_json(&mut ws).await;
        send_json(
            &mut ws,
            json!({
                "id": sub["id"], "type": "result", "success": false,
                "error": {"code": "unauthorized", "message": "nope"}
            }),
        )
        .await;
        ws
    });

    let client = Client::connect(cfg).await.unwrap();
    let err = client.subscribe_events(None).await.unwrap_err();
    assert!(matches!(err, HassLinkError::CommandFailed { .. }));
    let _ws = server.await.unwrap();
}

#[tokio::test]
async fn event_stream_ends_with_its_epoch() {
    let (listener, cfg) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        serve_handshake(&mut ws).await;
        let sub = recv_json(&mut ws).await;
        let sub_id = sub["id"].as_u64().unwrap();
        send_json(
            &mut ws,
            json!({"id": sub_id, "type": "result", "success": true, "result": null}),
        )
        .await;
        send_json(
            &mut ws,
            json!({"id": sub_id, "type": "event", "event": {"seq": 1}}),
        )
        .await;
        drop(ws);
    });

    let client = Client::connect(cfg).await.unwrap();
    let mut events = client.subscribe_events(None).await.unwrap();
    assert!(events.next().await.is_some());
    // connection gone: the stream must terminate, not hang
    let next = timeout(Duration::from_secs(5), events.next()).await.unwrap();
    assert!(next.is_none());
    server.await.unwrap();
}
