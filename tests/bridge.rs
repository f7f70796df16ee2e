//! Client and server talking over a real socket.

mod common;

use std::sync::Arc;

use common::{client_for, start_server, Project, RecordingOpener, WAIT};
use flow_studio::{BridgeError, FileOpener};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

fn order_project() -> Project {
    let project = Project::new(&json!({"processes": {"order": "./procs/order"}}));
    project.write("procs/order/diagrams/order.bpmn", "<bpmn/>");
    project
}

fn remote_message(err: &flow_studio::Error) -> &str {
    match err.as_bridge() {
        Some(BridgeError::Remote(message)) => message,
        other => panic!("Expected a remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn fetches_diagram_for_process_key() {
    let project = order_project();
    let (server, port) = start_server(None).await;
    let client = client_for(port);
    client.connect().await.unwrap();

    let reply = client.get_bpmn_file(project.config(), "order").await.unwrap();

    assert_eq!(reply.bpmn_content, "<bpmn/>");
    assert!(reply.file_path.ends_with("order.bpmn"));
    assert!(reply.file_path.contains("diagrams"));
    assert_eq!(client.pending_count().await, 0);
    server.shutdown().await;
}

#[tokio::test]
async fn get_config_returns_document() {
    let project = Project::new(&json!({"processes": {"order": "./procs/order"}, "name": "demo"}));
    let (server, port) = start_server(None).await;
    let client = client_for(port);
    client.connect().await.unwrap();

    let reply = client.get_config(project.config()).await.unwrap();
    assert_eq!(reply.config["name"], "demo");
    assert_eq!(reply.config["processes"]["order"], "./procs/order");
    server.shutdown().await;
}

#[tokio::test]
async fn get_config_reports_missing_and_invalid_files() {
    let project = Project::new(&json!({}));
    let broken = project.write("broken.json", "{ not json");
    let missing = project.root().join("nowhere.json");
    let (server, port) = start_server(None).await;
    let client = client_for(port);
    client.connect().await.unwrap();

    let err = client
        .get_config(missing.to_str().unwrap())
        .await
        .unwrap_err();
    assert_eq!(
        remote_message(&err),
        format!("Config file not found: {}", missing.display())
    );

    let err = client.get_config(broken.to_str().unwrap()).await.unwrap_err();
    assert!(remote_message(&err).starts_with("Error reading config: "));
    server.shutdown().await;
}

#[tokio::test]
async fn unknown_key_and_missing_diagram_are_errors() {
    let project = Project::new(&json!({"processes": {"order": "./procs/order"}}));
    let (server, port) = start_server(None).await;
    let client = client_for(port);
    client.connect().await.unwrap();

    let err = client
        .get_bpmn_file(project.config(), "invoice")
        .await
        .unwrap_err();
    assert_eq!(remote_message(&err), "Process not found: invoice");

    // Mapped, but the diagram was never written.
    let err = client
        .get_bpmn_file(project.config(), "order")
        .await
        .unwrap_err();
    assert!(remote_message(&err).starts_with("BPMN file not found: "));
    assert!(remote_message(&err).ends_with("order.bpmn"));
    server.shutdown().await;
}

#[tokio::test]
async fn open_hands_diagram_to_host() {
    let project = order_project();
    let opener = Arc::new(RecordingOpener::default());
    let (server, port) = start_server(Some(opener.clone() as Arc<dyn FileOpener>)).await;
    let client = client_for(port);
    client.connect().await.unwrap();

    let reply = client
        .open_bpmn_file(project.config(), "order")
        .await
        .unwrap();

    assert!(reply.success);
    assert_eq!(reply.message, "Opened order in new tab");
    let opened = opener.opened.lock().unwrap().clone();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].to_str().unwrap(), reply.file_path);
    server.shutdown().await;
}

#[tokio::test]
async fn open_without_host_fails() {
    let project = order_project();
    let (server, port) = start_server(None).await;
    let client = client_for(port);
    client.connect().await.unwrap();

    let err = client
        .open_bpmn_file(project.config(), "order")
        .await
        .unwrap_err();
    assert_eq!(remote_message(&err), "Host application not available");
    server.shutdown().await;
}

#[tokio::test]
async fn concurrent_requests_each_get_their_own_reply() {
    let project = order_project();
    project.write("procs/invoice/diagrams/invoice.bpmn", "<invoice/>");
    std::fs::write(
        &project.config_path,
        json!({"processes": {"order": "./procs/order", "invoice": "./procs/invoice"}}).to_string(),
    )
    .unwrap();
    let (server, port) = start_server(None).await;
    let client = client_for(port);
    client.connect().await.unwrap();

    let (order, invoice, missing) = tokio::join!(
        client.get_bpmn_file(project.config(), "order"),
        client.get_bpmn_file(project.config(), "invoice"),
        client.get_bpmn_file(project.config(), "shipping"),
    );

    assert_eq!(order.unwrap().bpmn_content, "<bpmn/>");
    assert_eq!(invoice.unwrap().bpmn_content, "<invoice/>");
    assert_eq!(
        remote_message(&missing.unwrap_err()),
        "Process not found: shipping"
    );
    assert_eq!(client.pending_count().await, 0);
    server.shutdown().await;
}

#[tokio::test]
async fn connecting_twice_reuses_socket() {
    let (server, port) = start_server(None).await;
    let client = client_for(port);

    let (first, second) = tokio::join!(client.connect(), client.connect());
    first.unwrap();
    second.unwrap();
    client.connect().await.unwrap();

    assert!(client.is_connected().await);
    assert_eq!(server.accepted_connections(), 1);
    server.shutdown().await;
}

async fn raw_exchange(port: u16, frame: &str) -> Value {
    let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .unwrap();
    ws.send(WsMessage::Text(frame.to_string().into()))
        .await
        .unwrap();
    loop {
        let reply = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("No reply")
            .expect("Socket closed")
            .unwrap();
        if let WsMessage::Text(text) = reply {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn wire_format_of_replies() {
    let project = order_project();
    let (server, port) = start_server(None).await;

    let request = json!({
        "type": "request",
        "ref": "bpmn-42",
        "operation": "getBpmnFile",
        "configPath": project.config(),
        "bpmnKey": "order",
    });
    let reply = raw_exchange(port, &request.to_string()).await;
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["ref"], "bpmn-42");
    assert_eq!(reply["data"]["bpmnContent"], "<bpmn/>");
    assert!(reply["data"]["filePath"].as_str().unwrap().ends_with("order.bpmn"));
    server.shutdown().await;
}

#[tokio::test]
async fn unknown_operation_is_answered_with_error() {
    let (server, port) = start_server(None).await;

    let request = json!({"type": "request", "ref": "x-1", "operation": "deleteEverything"});
    let reply = raw_exchange(port, &request.to_string()).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["ref"], "x-1");
    assert_eq!(
        reply["message"],
        "Unknown operation 'request:deleteEverything'"
    );

    let reply = raw_exchange(port, &json!({"ref": "x-2"}).to_string()).await;
    assert_eq!(reply["message"], "Unknown operation 'undefined:undefined'");
    server.shutdown().await;
}

#[tokio::test]
async fn missing_arguments_are_rejected() {
    let (server, port) = start_server(None).await;

    let request = json!({"type": "request", "ref": "bpmn-1", "operation": "getBpmnFile"});
    let reply = raw_exchange(port, &request.to_string()).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["ref"], "bpmn-1");
    assert_eq!(reply["message"], "configPath and bpmnKey are required");
    server.shutdown().await;
}
