mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{connection_for, dead_url, realtime_config, wait_until, MockHub};
use parking_lot::Mutex;
use serde_json::json;
use storefront::config::CredentialStore;
use storefront::realtime::{
    ConnectionState, HubConnection, RealtimeError, RealtimeHub, ReconnectPolicy,
    ReconnectSupervisor, SupervisorStatus,
};

const WAIT: Duration = Duration::from_secs(5);

fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl Fn(&storefront::realtime::HubEvent) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handler = move |event: &storefront::realtime::HubEvent| {
        if let Some(id) = event.argument::<u64>(0) {
            sink.lock().push(id);
        }
    };
    (seen, handler)
}

#[tokio::test]
async fn test_start_sends_token_captured_at_call_time() {
    let hub = MockHub::start().await;
    let credentials = CredentialStore::in_memory();
    credentials.set_token("first-token");
    let conn = connection_for(&hub, &credentials);

    conn.start().await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Connected);

    // Changing the token does not affect the live connection.
    credentials.set_token("second-token");
    conn.stop().await;
    conn.start().await.unwrap();

    let uris = hub.uris();
    assert_eq!(uris.len(), 2);
    assert_eq!(uris[0], "/hubs/store?access_token=first-token");
    assert_eq!(uris[1], "/hubs/store?access_token=second-token");
}

#[tokio::test]
async fn test_no_token_means_no_query() {
    let hub = MockHub::start().await;
    let conn = connection_for(&hub, &CredentialStore::in_memory());

    conn.start().await.unwrap();
    assert_eq!(hub.uris(), vec!["/hubs/store".to_string()]);
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    let hub = MockHub::start().await;
    let conn = connection_for(&hub, &CredentialStore::in_memory());

    conn.stop().await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);

    conn.start().await.unwrap();
    conn.start().await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Connected);
    assert_eq!(hub.accepted(), 1);

    conn.stop().await;
    conn.stop().await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(wait_until(WAIT, || hub.active() == 0).await);
    assert_eq!(hub.accepted(), 1);
}

#[tokio::test]
async fn test_same_event_delivered_in_order() {
    let hub = MockHub::start().await;
    let conn = connection_for(&hub, &CredentialStore::in_memory());
    let (seen, handler) = recorder();
    conn.subscribe("OrderUpdated", handler);

    conn.start().await.unwrap();
    for id in 0..20u64 {
        hub.invoke("OrderUpdated", json!([id]));
    }
    // Several frames in one WebSocket message.
    hub.send_raw(concat!(
        r#"{"type":1,"target":"OrderUpdated","arguments":[20]}"#, "\u{1e}",
        r#"{"type":6}"#, "\u{1e}",
        r#"{"type":1,"target":"OrderUpdated","arguments":[21]}"#, "\u{1e}",
    ));

    assert!(wait_until(WAIT, || seen.lock().len() == 22).await);
    assert_eq!(*seen.lock(), (0..22).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_multiple_handlers_and_case_insensitive_names() {
    let hub = MockHub::start().await;
    let conn = connection_for(&hub, &CredentialStore::in_memory());
    let (first, first_handler) = recorder();
    let (second, second_handler) = recorder();
    conn.subscribe("ProductUpdated", first_handler);
    conn.subscribe("productupdated", second_handler);
    let mut all = conn.events();

    conn.start().await.unwrap();
    hub.invoke("ProductUpdated", json!([7]));

    assert!(wait_until(WAIT, || first.lock().len() == 1 && second.lock().len() == 1).await);
    let event = tokio::time::timeout(WAIT, all.recv()).await.unwrap().unwrap();
    assert_eq!(event.name, "ProductUpdated");
    assert_eq!(event.argument::<u64>(0), Some(7));
}

#[tokio::test]
async fn test_handlers_survive_stop_and_start() {
    let hub = MockHub::start().await;
    let conn = connection_for(&hub, &CredentialStore::in_memory());
    let (seen, handler) = recorder();
    let id = conn.subscribe("OrderUpdated", handler);

    conn.start().await.unwrap();
    conn.stop().await;
    conn.start().await.unwrap();

    hub.invoke("OrderUpdated", json!([1]));
    assert!(wait_until(WAIT, || seen.lock().len() == 1).await);

    assert!(conn.unsubscribe(id));
    hub.invoke("OrderUpdated", json!([2]));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*seen.lock(), vec![1]);
}

#[tokio::test]
async fn test_server_close_reports_error() {
    let hub = MockHub::start().await;
    let conn = connection_for(&hub, &CredentialStore::in_memory());
    let reasons = Arc::new(Mutex::new(Vec::new()));
    let sink = reasons.clone();
    conn.on_closed(move |event| sink.lock().push(event.error.clone()));
    let mut closed = conn.closed_events();

    conn.start().await.unwrap();
    hub.close(Some("Server is shutting down"));

    let event = tokio::time::timeout(WAIT, closed.recv()).await.unwrap().unwrap();
    assert_eq!(event.error.as_deref(), Some("Server is shutting down"));
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert_eq!(
        *reasons.lock(),
        vec![Some("Server is shutting down".to_string())]
    );
    // Still wanted: only an explicit stop clears that.
    assert!(conn.wants_connection());
}

#[tokio::test]
async fn test_dropped_socket_reports_close() {
    let hub = MockHub::start().await;
    let conn = connection_for(&hub, &CredentialStore::in_memory());
    let mut closed = conn.closed_events();

    conn.start().await.unwrap();
    hub.drop_connections();

    assert!(tokio::time::timeout(WAIT, closed.recv()).await.unwrap().is_ok());
    assert!(!conn.is_connected());
}

#[tokio::test]
async fn test_explicit_stop_does_not_fire_closed() {
    let hub = MockHub::start().await;
    let conn = connection_for(&hub, &CredentialStore::in_memory());
    let fired = Arc::new(Mutex::new(0));
    let counter = fired.clone();
    conn.on_closed(move |_| *counter.lock() += 1);

    conn.start().await.unwrap();
    conn.stop().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(*fired.lock(), 0);
    assert!(!conn.wants_connection());
    assert!(wait_until(WAIT, || hub.received().iter().any(|f| f["type"] == 7)).await);
}

#[tokio::test]
async fn test_send_requires_connection() {
    let hub = MockHub::start().await;
    let conn = connection_for(&hub, &CredentialStore::in_memory());

    conn.send("SendMessage", vec![json!(5), json!("dropped")]);

    conn.start().await.unwrap();
    conn.send("SendMessage", vec![json!(5), json!("hello")]);

    assert!(wait_until(WAIT, || !hub.received().is_empty()).await);
    let frames = hub.received();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], 1);
    assert_eq!(frames[0]["target"], "SendMessage");
    assert_eq!(frames[0]["arguments"], json!([5, "hello"]));
}

#[tokio::test]
async fn test_start_failure_is_reported() {
    let conn = HubConnection::new(
        &realtime_config(&dead_url("http")),
        CredentialStore::in_memory(),
    );
    let err = conn.start().await.unwrap_err();
    assert!(matches!(err, RealtimeError::Connect(_)));
    assert_eq!(conn.state(), ConnectionState::Disconnected);

    let hub = MockHub::start().await;
    hub.reject_handshakes(true);
    let conn = connection_for(&hub, &CredentialStore::in_memory());
    let err = conn.start().await.unwrap_err();
    assert_eq!(err, RealtimeError::Handshake("Handshake rejected".to_string()));
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_secure_hub_urls_reach_the_network() {
    let conn = HubConnection::new(
        &realtime_config(&dead_url("https")),
        CredentialStore::in_memory(),
    );
    match conn.start().await {
        Err(RealtimeError::Connect(reason)) => {
            assert!(!reason.contains("TLS support not compiled in"), "{}", reason);
        }
        other => panic!("expected a connect failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_panicking_handler_does_not_stop_delivery() {
    let hub = MockHub::start().await;
    let conn = connection_for(&hub, &CredentialStore::in_memory());
    let (seen, handler) = recorder();
    conn.subscribe("Broken", |_| panic!("handler failure"));
    conn.subscribe("OrderUpdated", handler);

    conn.start().await.unwrap();
    hub.invoke("Broken", json!([1]));
    hub.invoke("OrderUpdated", json!([2]));

    assert!(wait_until(WAIT, || seen.lock().len() == 1).await);
    assert_eq!(*seen.lock(), vec![2]);
    assert_eq!(conn.state(), ConnectionState::Connected);
}

#[test]
fn test_concurrent_first_access_yields_one_connection() {
    let hub = RealtimeHub::new(
        realtime_config("http://127.0.0.1:1/hubs/store"),
        CredentialStore::in_memory(),
    );

    let handles: Vec<HubConnection> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| hub.connection().clone()))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    for handle in &handles {
        assert!(handle.ptr_eq(&handles[0]));
        assert!(handle.ptr_eq(hub.connection()));
    }
}

fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
    }
}

#[tokio::test]
async fn test_supervisor_reconnects_after_drop() {
    let hub = MockHub::start().await;
    let conn = connection_for(&hub, &CredentialStore::in_memory());
    let supervisor = ReconnectSupervisor::spawn(conn.clone(), fast_policy(3));

    conn.start().await.unwrap();
    hub.drop_connections();

    assert!(wait_until(WAIT, || hub.accepted() == 2 && conn.is_connected()).await);
    assert!(wait_until(WAIT, || supervisor.status() == SupervisorStatus::Idle).await);
}

#[tokio::test]
async fn test_supervisor_ignores_explicit_stop() {
    let hub = MockHub::start().await;
    let conn = connection_for(&hub, &CredentialStore::in_memory());
    let _supervisor = ReconnectSupervisor::spawn(conn.clone(), fast_policy(3));

    conn.start().await.unwrap();
    conn.stop().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(hub.accepted(), 1);
    assert!(!conn.is_connected());
}

#[tokio::test]
async fn test_supervisor_gives_up() {
    let hub = MockHub::start().await;
    let conn = connection_for(&hub, &CredentialStore::in_memory());
    let supervisor = ReconnectSupervisor::spawn(conn.clone(), fast_policy(2));

    conn.start().await.unwrap();
    drop(hub);

    assert!(wait_until(WAIT, || supervisor.status() == SupervisorStatus::GaveUp).await);
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}
