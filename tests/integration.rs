//! End-to-end tests for the client against a stub automation server.
//!
//! Each test binds its own ephemeral loopback port.

use async_trait::async_trait;
use futures::future::join_all;
use repeat_client::{
    ActionRegistry, ActionResult, Activation, Client, ClientConfig, Controller, DispatchReply,
    InboundDispatcher, StubConnection, StubServer, TaskManager, UserAction, encode_frame,
};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};

const WAIT: Duration = Duration::from_secs(2);

/// Start a client against `server` and consume its identify frame.
async fn connect(server: &StubServer, server_timeout: Duration) -> (Client, StubConnection) {
    connect_with(server, server_timeout, None).await
}

async fn connect_with(
    server: &StubServer,
    server_timeout: Duration,
    dispatcher: Option<Arc<dyn InboundDispatcher>>,
) -> (Client, StubConnection) {
    let config = ClientConfig::new(server.port()).with_server_timeout(server_timeout);
    let mut client = Client::new(config);
    if let Some(dispatcher) = dispatcher {
        client = client.with_dispatcher(dispatcher);
    }
    client.start().await.expect("client should connect");

    let mut conn = server.accept().await;
    let identify = conn.recv(WAIT).await.expect("identify frame");
    assert_eq!(identify["action"], "identify");
    (client, conn)
}

/// Start a client whose inbound messages go to a [`TaskManager`].
async fn connect_tasks(server: &StubServer, registry: ActionRegistry) -> (Client, StubConnection) {
    let client = Client::new(ClientConfig::new(server.port()));
    let tasks = TaskManager::new(client.controller(), Arc::new(registry));
    let mut client = client.with_dispatcher(Arc::new(tasks));
    client.start().await.expect("client should connect");

    let mut conn = server.accept().await;
    conn.recv(WAIT).await.expect("identify frame");
    (client, conn)
}

async fn wait_until_stopped(client: &Client) {
    let deadline = Instant::now() + WAIT;
    while client.is_running() {
        assert!(Instant::now() < deadline, "client did not notice disconnect");
        sleep(Duration::from_millis(10)).await;
    }
}

struct Echo;

#[async_trait]
impl InboundDispatcher for Echo {
    async fn dispatch(&self, message: Value) -> DispatchReply {
        DispatchReply::success(message)
    }
}

#[tokio::test]
async fn test_identify_carries_name_and_local_port() {
    let server = StubServer::bind().await;
    let mut client = Client::new(ClientConfig::new(server.port()));
    client.start().await.expect("connect");

    let mut conn = server.accept().await;
    let identify = conn.recv(WAIT).await.expect("identify frame");
    assert_eq!(identify["type"], "system");
    assert_eq!(identify["device"], "system");
    assert_eq!(identify["params_string"], json!(["rust"]));

    let local_port = client.local_port().expect("local port");
    assert_eq!(identify["params_int"], json!([local_port]));

    client.stop().await;
}

#[tokio::test]
async fn test_request_returns_reply_body() {
    let server = StubServer::bind().await;
    let (mut client, mut conn) = connect(&server, Duration::from_secs(10)).await;
    let mem = client.controller().mem.instance("global");

    let (value, ()) = tokio::join!(mem.get("greeting"), async {
        let request = conn.recv_request(WAIT).await.expect("request");
        assert_eq!(request["type"], "action");
        assert_eq!(request["device"], "shared_memory");
        assert_eq!(request["action"], "get");
        assert_eq!(request["params_string"], json!(["global", "greeting"]));
        conn.reply(&request, json!({"status": "Success", "message": "hello"}))
            .await;
    });

    assert_eq!(value.as_deref(), Some("hello"));
    assert_eq!(client.pending_requests(), 0);
    client.stop().await;
}

#[tokio::test]
async fn test_keyboard_press_acknowledged() {
    let server = StubServer::bind().await;
    let (mut client, mut conn) = connect(&server, Duration::from_secs(10)).await;
    let controller = client.controller();

    let (pressed, ()) = tokio::join!(controller.key.press(65), async {
        let request = conn.recv_request(WAIT).await.expect("request");
        assert_eq!(request["device"], "keyboard");
        assert_eq!(request["action"], "press");
        assert_eq!(request["params_int"], json!([65]));
        conn.reply(&request, json!({"status": "Success", "message": ""}))
            .await;
    });

    assert!(pressed);
    client.stop().await;
}

#[tokio::test]
async fn test_unanswered_request_times_out() {
    let server = StubServer::bind().await;
    let (mut client, mut conn) = connect(&server, Duration::from_millis(250)).await;
    let mem = client.controller().mem.instance("global");

    let started = Instant::now();
    let value = mem.get("never").await;
    assert!(value.is_none());
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(client.pending_requests(), 0);

    // The request did reach the server.
    assert!(conn.recv_request(WAIT).await.is_some());
    client.stop().await;
}

#[tokio::test]
async fn test_late_reply_is_not_dispatched() {
    let server = StubServer::bind().await;
    let (mut client, mut conn) = connect_with(
        &server,
        Duration::from_millis(250),
        Some(Arc::new(Echo)),
    )
    .await;
    let controller = client.controller();

    assert!(!controller.key.release(1).await);
    let request = conn.recv_request(WAIT).await.expect("request");
    conn.reply(
        &request,
        json!({"status": "Success", "message": "", "is_reply_message": true}),
    )
    .await;

    // Echo would answer anything forwarded to it.
    let echoed = conn.recv_request(Duration::from_millis(300)).await;
    assert!(echoed.is_none(), "stale reply was dispatched: {echoed:?}");
    client.stop().await;
}

#[tokio::test]
async fn test_two_frames_in_one_packet_dispatched_in_order() {
    let server = StubServer::bind().await;
    let (mut client, mut conn) =
        connect_with(&server, Duration::from_secs(10), Some(Arc::new(Echo))).await;

    let mut packet = encode_frame(&json!({"task_action": "first"})).expect("encode");
    packet.extend(encode_frame(&json!({"task_action": "second"})).expect("encode"));
    conn.send_raw(&packet).await;

    let first = conn.recv_request(WAIT).await.expect("first reply");
    let second = conn.recv_request(WAIT).await.expect("second reply");
    assert_eq!(first["message"]["task_action"], "first");
    assert_eq!(second["message"]["task_action"], "second");
    assert_eq!(first["is_reply_message"], true);
    assert_eq!(first["status"], "Success");

    client.stop().await;
}

#[tokio::test]
async fn test_unknown_task_action_gets_failure_reply() {
    let server = StubServer::bind().await;
    let (mut client, mut conn) = connect_tasks(&server, ActionRegistry::new()).await;

    conn.send(&json!({"task_action": "explode", "parameters": []}))
        .await;
    let reply = conn.recv_request(WAIT).await.expect("reply");
    assert_eq!(
        reply,
        json!({
            "status": "Failure",
            "message": "Unknown action explode",
            "is_reply_message": true,
        })
    );

    client.stop().await;
}

#[tokio::test]
async fn test_idle_connection_sends_one_keep_alive() {
    let server = StubServer::bind().await;
    let (mut client, mut conn) = connect(&server, Duration::from_millis(500)).await;

    // Client timeout is 400ms; in 600ms exactly one keep-alive is due.
    let deadline = Instant::now() + Duration::from_millis(600);
    let mut keep_alives = 0;
    while let Some(frame) = conn
        .recv(deadline.saturating_duration_since(Instant::now()))
        .await
    {
        assert_eq!(frame["type"], "system");
        if frame["action"] == "keep_alive" {
            keep_alives += 1;
        }
    }
    assert_eq!(keep_alives, 1);

    client.stop().await;
}

#[tokio::test]
async fn test_restart_starts_with_empty_pending_table() {
    let server = StubServer::bind().await;
    let (mut client, _conn) = connect(&server, Duration::from_secs(10)).await;
    let controller = client.controller();

    let waiter = tokio::spawn(async move { controller.key.press(1).await });
    let deadline = Instant::now() + WAIT;
    while client.pending_requests() < 2 {
        assert!(Instant::now() < deadline, "request never registered");
        sleep(Duration::from_millis(5)).await;
    }

    client.stop().await;
    assert_eq!(client.pending_requests(), 0);
    assert!(!client.is_running());

    let pressed = timeout(WAIT, waiter)
        .await
        .expect("waiter should return once stopped")
        .expect("join");
    assert!(!pressed);

    client.start().await.expect("restart");
    let mut conn = server.accept().await;
    let identify = conn.recv(WAIT).await.expect("identify after restart");
    assert_eq!(identify["action"], "identify");
    assert!(client.is_running());
    assert_eq!(client.pending_requests(), 1);

    client.stop().await;
}

#[tokio::test]
async fn test_server_close_stops_client() {
    let server = StubServer::bind().await;
    let (client, conn) = connect(&server, Duration::from_secs(10)).await;
    assert!(client.is_running());

    conn.close().await;
    wait_until_stopped(&client).await;

    timeout(WAIT, client.terminated())
        .await
        .expect("terminated should resolve");
}

#[tokio::test]
async fn test_concurrent_requests_get_distinct_ids() {
    const COUNT: usize = 10;

    let server = StubServer::bind().await;
    let (mut client, mut conn) = connect(&server, Duration::from_secs(10)).await;
    let controller = client.controller();

    let presses = (0..COUNT).map(|i| {
        let controller = controller.clone();
        async move { controller.key.press(i64::try_from(i).expect("key")).await }
    });

    let (results, ids) = tokio::join!(join_all(presses), async {
        let mut ids = HashSet::new();
        for _ in 0..COUNT {
            let request = conn.recv_request(WAIT).await.expect("request");
            ids.insert(request["id"].as_u64().expect("id"));
            conn.reply(&request, json!({"status": "Success", "message": ""}))
                .await;
        }
        ids
    });

    assert_eq!(ids.len(), COUNT);
    assert!(results.into_iter().all(|pressed| pressed));
    client.stop().await;
}

/// Task that presses a key through the controller while it runs.
struct PressA;

#[async_trait]
impl UserAction for PressA {
    async fn run(&self, controller: &Controller, activation: &Activation) -> ActionResult {
        assert_eq!(activation.hotkeys, vec![17, 65]);
        if controller.key.press(65).await {
            Ok(())
        } else {
            Err("press was not acknowledged".into())
        }
    }
}

#[tokio::test]
async fn test_task_lifecycle_over_the_wire() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let path = dir.path().join("press_a.rs");
    std::fs::write(&path, "// press a").expect("write task");

    let server = StubServer::bind().await;
    let registry = ActionRegistry::new().register("press_a", Arc::new(PressA));
    let (mut client, mut conn) = connect_tasks(&server, registry).await;

    let file_name = path.display().to_string();
    conn.send(&json!({"task_action": "create_task", "parameters": [file_name]}))
        .await;
    let created = conn.recv_request(WAIT).await.expect("create reply");
    assert_eq!(created["status"], "Success");
    assert_eq!(created["message"]["file_name"], file_name);
    let task_id = created["message"]["id"]
        .as_str()
        .expect("task id")
        .to_string();

    conn.send(&json!({
        "task_action": "run_task",
        "parameters": [task_id, {"hotkey": [[{"key": 17}, {"key": 65}]]}],
    }))
    .await;

    // The task's own request arrives before the run reply.
    let press = conn.recv_request(WAIT).await.expect("press request");
    assert_eq!(press["device"], "keyboard");
    assert_eq!(press["params_int"], json!([65]));
    conn.reply(&press, json!({"status": "Success", "message": ""}))
        .await;

    let ran = conn.recv_request(WAIT).await.expect("run reply");
    assert_eq!(ran["status"], "Success", "{ran}");
    assert_eq!(ran["message"]["id"], task_id);

    conn.send(&json!({"task_action": "remove_task", "parameters": [task_id]}))
        .await;
    let removed = conn.recv_request(WAIT).await.expect("remove reply");
    assert_eq!(removed["status"], "Success");
    assert_eq!(removed["message"]["file_name"], file_name);

    conn.send(&json!({"task_action": "run_task", "parameters": [task_id, {}]}))
        .await;
    let missing = conn.recv_request(WAIT).await.expect("run reply");
    assert_eq!(missing["status"], "Failure");
    assert_eq!(
        missing["message"],
        format!("Unknown action with id {task_id}")
    );

    client.stop().await;
}
