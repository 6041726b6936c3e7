//! Integration tests for `ConnectionManager` against in-memory transports.
//!
//! Every server is backed by `FakeConnector`, which counts transports
//! built and still open so connection ownership can be asserted directly.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use toolgate_core::testing::{FakeConnector, FakeServer, tool};
use toolgate_core::{
    AppEventEmitter, ConnectError, ConnectionEvent, ConnectionStatus, EventBroadcaster,
    EventReceiver, InvokeError, McpConnector, NoopEmitter, ServerConfig, TransportKind,
};
use toolgate_mcp::ConnectionManager;

// ── Helpers ────────────────────────────────────────────────────────

fn manager(connector: &Arc<FakeConnector>, emitter: Arc<dyn AppEventEmitter>) -> ConnectionManager {
    ConnectionManager::new(Arc::clone(connector) as Arc<dyn McpConnector>, emitter, 4)
}

fn stdio(id: &str) -> ServerConfig {
    ServerConfig::stdio(id, format!("Server {id}"), format!("{id}-mcp"), vec![])
}

fn drain(rx: &mut EventReceiver) -> Vec<ConnectionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ── Connection ownership ───────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connects_build_one_transport() {
    let connector = Arc::new(FakeConnector::new());
    connector
        .add_server("a", FakeServer::default().connect_delay(Duration::from_millis(50)))
        .await;
    let manager = Arc::new(manager(&connector, Arc::new(NoopEmitter::new())));

    let mut config = stdio("a");
    config.enabled = false;
    manager.register_server(config).await.unwrap();
    manager.set_enabled("a", true).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.connect("a").await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(connector.connect_calls(), 1);
    assert_eq!(connector.live_clients(), 1);
    assert!(manager.is_connected("a").await);
}

#[tokio::test]
async fn test_disconnect_all_survives_close_errors() {
    let connector = Arc::new(FakeConnector::new());
    connector.add_server("a", FakeServer::default().fail_close()).await;
    connector.add_server("b", FakeServer::default()).await;
    let manager = manager(&connector, Arc::new(NoopEmitter::new()));

    manager.register_server(stdio("a")).await.unwrap();
    manager.register_server(stdio("b")).await.unwrap();
    assert_eq!(connector.live_clients(), 2);

    manager.disconnect(None).await.unwrap();

    assert_eq!(connector.live_clients(), 0);
    assert!(!manager.is_connected("a").await);
    assert!(!manager.is_connected("b").await);
    let statuses = manager.get_status().await;
    assert!(
        statuses
            .values()
            .all(|status| *status == ConnectionStatus::Disconnected)
    );
    // Configs survive a disconnect.
    assert_eq!(manager.get_configs().await.len(), 2);
}

#[tokio::test]
async fn test_invoke_unknown_server_never_connects() {
    let connector = Arc::new(FakeConnector::new());
    let manager = manager(&connector, Arc::new(NoopEmitter::new()));

    let result = manager.invoke("nowhere", "search", json!({})).await;

    assert!(matches!(result, Err(InvokeError::NotConnected(id)) if id == "nowhere"));
    assert_eq!(connector.connect_calls(), 0);
}

#[tokio::test]
async fn test_invoke_forwards_to_connected_server() {
    let connector = Arc::new(FakeConnector::new());
    connector.add_server("a", FakeServer::default()).await;
    let manager = manager(&connector, Arc::new(NoopEmitter::new()));
    manager.register_server(stdio("a")).await.unwrap();

    let result = manager
        .invoke("a", "search", json!({"q": "rust"}))
        .await
        .unwrap();

    assert_eq!(result.to_model_text(), "search ok");
    let calls = connector.calls().await;
    assert_eq!(calls[0].arguments, json!({"q": "rust"}));
    assert_eq!(calls[0].server_id, "a");
}

// ── Registration failures ──────────────────────────────────────────

#[tokio::test]
async fn test_failed_connect_rolls_back_registration() {
    let connector = Arc::new(FakeConnector::new());
    connector
        .add_server("bad", FakeServer::failing_connect("exit status 1"))
        .await;
    let events = EventBroadcaster::new();
    let mut rx = events.subscribe();
    let manager = manager(&connector, Arc::new(events.clone()));

    let result = manager.register_server(stdio("bad")).await;

    assert!(matches!(
        result,
        Err(ConnectError::Transport { server_id, .. }) if server_id == "bad"
    ));
    assert!(manager.get_configs().await.is_empty());
    assert!(manager.status("bad").await.is_none());
    assert_eq!(connector.live_clients(), 0);

    let events = drain(&mut rx);
    assert!(matches!(events.last(), Some(ConnectionEvent::ServerRemoved { server_id }) if server_id == "bad"));
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::ConnectFailed { .. })));
}

#[tokio::test]
async fn test_sandboxed_host_rejects_stdio() {
    let connector = Arc::new(FakeConnector::sandboxed());
    connector.add_server("local", FakeServer::default()).await;
    connector.add_server("remote", FakeServer::default()).await;
    let manager = manager(&connector, Arc::new(NoopEmitter::new()));

    let result = manager.register_server(stdio("local")).await;
    assert!(matches!(
        result,
        Err(ConnectError::UnsupportedTransport {
            transport: TransportKind::Stdio,
            ..
        })
    ));
    assert_eq!(connector.connect_calls(), 0);

    manager
        .register_server(ServerConfig::streamable_http(
            "remote",
            "Remote",
            "https://mcp.example.com/mcp",
        ))
        .await
        .unwrap();
    assert!(manager.is_connected("remote").await);
}

#[tokio::test]
async fn test_failed_reconnect_records_reason() {
    let connector = Arc::new(FakeConnector::new());
    connector.add_server("a", FakeServer::default()).await;
    let manager = manager(&connector, Arc::new(NoopEmitter::new()));
    manager.register_server(stdio("a")).await.unwrap();
    manager.disconnect(Some("a")).await.unwrap();

    connector
        .add_server("a", FakeServer::failing_connect("port in use"))
        .await;
    assert!(manager.connect("a").await.is_err());

    match manager.status("a").await {
        Some(ConnectionStatus::Failed { reason }) => assert!(reason.contains("port in use")),
        other => panic!("expected Failed status, got {other:?}"),
    }
    // A failed reconnect of a registered server keeps its config.
    assert_eq!(manager.get_configs().await.len(), 1);
}

// ── Aggregate listing ──────────────────────────────────────────────

#[tokio::test]
async fn test_listing_failure_is_isolated_per_server() {
    let connector = Arc::new(FakeConnector::new());
    connector
        .add_server("a", FakeServer::with_tools(vec![tool("search"), tool("fetch")]))
        .await;
    connector
        .add_server("b", FakeServer::with_tools(vec![tool("query")]).fail_list())
        .await;
    connector
        .add_server("c", FakeServer::with_tools(vec![tool("shell")]))
        .await;
    let manager = manager(&connector, Arc::new(NoopEmitter::new()));
    for id in ["a", "b", "c"] {
        manager.register_server(stdio(id)).await.unwrap();
    }

    let listings = manager.list_capabilities(None).await;

    let ids: Vec<_> = listings.iter().map(|l| l.server_id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    assert_eq!(listings[0].tools.len(), 2);
    assert!(listings[1].is_empty());
    assert_eq!(listings[2].tools[0].name, "shell");

    let only_c = manager.list_capabilities(Some("c")).await;
    assert_eq!(only_c.len(), 1);
}

#[tokio::test]
async fn test_listing_skips_disconnected_servers() {
    let connector = Arc::new(FakeConnector::new());
    connector
        .add_server("a", FakeServer::with_tools(vec![tool("search")]))
        .await;
    let manager = manager(&connector, Arc::new(NoopEmitter::new()));
    manager.register_server(stdio("a")).await.unwrap();
    manager.disconnect(Some("a")).await.unwrap();

    assert!(manager.list_capabilities(None).await.is_empty());
}

// ── Events ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_events_follow_status_mutations() {
    let connector = Arc::new(FakeConnector::new());
    connector.add_server("a", FakeServer::default()).await;
    let events = EventBroadcaster::new();
    let mut rx = events.subscribe();
    let manager = manager(&connector, Arc::new(events));

    manager.register_server(stdio("a")).await.unwrap();
    manager.disconnect(Some("a")).await.unwrap();

    let received = drain(&mut rx);
    assert_eq!(
        received,
        vec![
            ConnectionEvent::server_registered("a", "Server a", TransportKind::Stdio),
            ConnectionEvent::status_changed("a", ConnectionStatus::Connecting),
            ConnectionEvent::status_changed("a", ConnectionStatus::Connected),
            ConnectionEvent::connected("a", "Server a", TransportKind::Stdio),
            ConnectionEvent::status_changed("a", ConnectionStatus::Disconnected),
            ConnectionEvent::disconnected("a", "Server a"),
        ]
    );
}

#[tokio::test]
async fn test_unread_events_are_never_dropped() {
    let connector = Arc::new(FakeConnector::new());
    let events = EventBroadcaster::new();
    let mut rx = events.subscribe();
    let manager = manager(&connector, Arc::new(events));

    for i in 0..20 {
        let id = format!("s{i}");
        connector.add_server(&id, FakeServer::default()).await;
        manager.register_server(stdio(&id)).await.unwrap();
    }

    let received = drain(&mut rx);
    assert_eq!(received.len(), 20 * 4);
    for i in 0..20 {
        let id = format!("s{i}");
        let per_server: Vec<_> = received
            .iter()
            .filter(|e| e.server_id() == Some(id.as_str()))
            .cloned()
            .collect();
        assert_eq!(
            per_server,
            vec![
                ConnectionEvent::server_registered(&id, format!("Server {id}"), TransportKind::Stdio),
                ConnectionEvent::status_changed(&id, ConnectionStatus::Connecting),
                ConnectionEvent::status_changed(&id, ConnectionStatus::Connected),
                ConnectionEvent::connected(&id, format!("Server {id}"), TransportKind::Stdio),
            ]
        );
    }
}

#[tokio::test]
async fn test_connect_all_reports_each_server() {
    let connector = Arc::new(FakeConnector::new());
    connector.add_server("a", FakeServer::default()).await;
    connector
        .add_server("b", FakeServer::failing_connect("refused"))
        .await;
    let manager = manager(&connector, Arc::new(NoopEmitter::new()));
    for id in ["a", "b"] {
        let mut config = stdio(id);
        config.enabled = false;
        manager.register_server(config).await.unwrap();
        manager.set_enabled(id, true).await.unwrap();
    }

    let results = manager.connect_all().await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "a");
    assert!(results[0].1.is_ok());
    assert!(results[1].1.is_err());
    assert!(manager.is_connected("a").await);
    assert!(!manager.is_connected("b").await);

    manager.shutdown().await;
    assert_eq!(connector.live_clients(), 0);
}
