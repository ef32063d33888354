//! Request/response integration tests for the WebSocket transport
//!
//! Covers unary calls end to end: success, typed decoding, server
//! errors, timeouts, and id-based correlation of concurrent requests.

mod common;

use std::sync::Mutex;
use std::time::Duration;

use common::{mock_error, mock_response, MockWsServer};
use serde_json::json;
use vane_client::{Client, ConnectionOptions, ConnectionState, WebsocketClient};
use vane_core::{envelope::request, ClientError};

async fn connect(server: &MockWsServer) -> WebsocketClient {
    let client = WebsocketClient::new(ConnectionOptions::new(server.address())).unwrap();
    client.open().await.unwrap();
    client
}

#[tokio::test]
async fn test_status_success() {
    let server = MockWsServer::with_handler(|env| {
        if env.event == request::STATUS {
            vec![mock_response(
                env.id,
                "response/status",
                json!({"status": "ok", "timestamp": "2024-05-01T12:00:00Z"}),
            )]
        } else {
            vec![]
        }
    })
    .await;

    let client = connect(&server).await;
    let status = client.status().await.unwrap();
    assert_eq!(status.status, "ok");
    assert_eq!(status.timestamp, "2024-05-01T12:00:00Z");

    client.close().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_version_success() {
    let server = MockWsServer::with_handler(|env| {
        if env.event == request::VERSION {
            vec![mock_response(
                env.id,
                "response/version",
                json!({"version": "3.1.0", "api_version": "v3"}),
            )]
        } else {
            vec![]
        }
    })
    .await;

    let client = connect(&server).await;
    let version = client.version().await.unwrap();
    assert_eq!(version.version, "3.1.0");
    assert_eq!(version.api_version, "v3");

    client.close().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_scan_sends_options() {
    let mut server = MockWsServer::with_handler(|env| {
        if env.event == request::SCAN {
            vec![mock_response(
                env.id,
                "response/device_summary",
                json!([{
                    "id": "dev-1",
                    "alias": "",
                    "info": "a thermometer",
                    "type": "temperature",
                    "plugin": "plug-1",
                    "tags": ["system/type:temperature"],
                }]),
            )]
        } else {
            vec![]
        }
    })
    .await;

    let client = connect(&server).await;
    let options = vane_core::ScanOptions {
        ns: "custom".to_string(),
        tags: vec!["foo/bar".to_string()],
        ..Default::default()
    };
    let devices = client.scan(options).await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, "dev-1");
    assert_eq!(devices[0].device_type, "temperature");

    // The request payload carries the options
    let env = server.wait_for_request().await.unwrap();
    assert_eq!(env.event, request::SCAN);
    assert_eq!(env.data["ns"], "custom");
    assert_eq!(env.data["tags"][0], "foo/bar");

    client.close().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_server_error_is_preserved() {
    let server = MockWsServer::with_handler(|env| {
        if env.event == request::INFO {
            vec![mock_error(env.id, 404, "device not found")]
        } else {
            vec![]
        }
    })
    .await;

    let client = connect(&server).await;
    let result = client.info("nope").await;
    match result {
        Err(ClientError::Server(api)) => {
            assert_eq!(api.http_code, 404);
            assert_eq!(api.description, "device not found");
        }
        other => panic!("expected Server error, got {:?}", other),
    }

    client.close().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frame_is_skipped() {
    // A garbage frame precedes the real response on the wire
    let server = MockWsServer::with_handler(|env| {
        if env.event == request::STATUS {
            vec![
                "{this is not an envelope".to_string(),
                mock_response(env.id, "response/status", json!({"status": "ok"})),
            ]
        } else {
            vec![]
        }
    })
    .await;

    let client = connect(&server).await;

    // The unparseable frame is skipped, not fatal: the call still
    // resolves and the connection stays up for further requests.
    let status = client.status().await.unwrap();
    assert_eq!(status.status, "ok");
    assert_eq!(client.state(), ConnectionState::Connected);

    let status = client.status().await.unwrap();
    assert_eq!(status.status, "ok");

    client.close().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_request_timeout() {
    // A server that never answers
    let server = MockWsServer::with_handler(|_| vec![]).await;

    let options = ConnectionOptions::new(server.address())
        .with_timeout(Duration::from_millis(100));
    let client = WebsocketClient::new(options).unwrap();
    client.open().await.unwrap();

    let result = client.status().await;
    assert!(matches!(result, Err(ClientError::Timeout)));

    // The connection survives a timed-out request
    client.close().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_out_of_order_responses_correlate_by_id() {
    // Hold back the first response until the second request arrives,
    // then answer both in reverse order.
    let held: Mutex<Option<String>> = Mutex::new(None);
    let server = MockWsServer::with_handler(move |env| {
        if env.event != request::INFO {
            return vec![];
        }
        let device = env.data["device"].as_str().unwrap_or_default().to_string();
        let response = mock_response(
            env.id,
            "response/device_info",
            json!({"id": device, "type": "temperature"}),
        );
        let mut held = held.lock().unwrap();
        match held.take() {
            None => {
                *held = Some(response);
                vec![]
            }
            Some(first) => vec![response, first],
        }
    })
    .await;

    let client = connect(&server).await;
    let (a, b) = tokio::join!(client.info("dev-a"), client.info("dev-b"));

    // Each caller gets its own device back regardless of arrival order
    assert_eq!(a.unwrap().id, "dev-a");
    assert_eq!(b.unwrap().id, "dev-b");

    client.close().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_write_round_trip() {
    let mut server = MockWsServer::with_handler(|env| {
        if env.event == request::WRITE_ASYNC {
            vec![mock_response(
                env.id,
                "response/transaction_info",
                json!([{
                    "id": "txn-1",
                    "device": "dev-1",
                    "status": "PENDING",
                    "context": {"action": "color", "data": "ff0000"},
                }]),
            )]
        } else {
            vec![]
        }
    })
    .await;

    let client = connect(&server).await;
    let data = vec![vane_core::WriteData::new("color").with_data(json!("ff0000"))];
    let transactions = client.write_async("dev-1", data).await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].id, "txn-1");
    assert_eq!(transactions[0].context.action, "color");

    let env = server.wait_for_request().await.unwrap();
    assert_eq!(env.data["device"], "dev-1");
    assert_eq!(env.data["payload"][0]["action"], "color");

    client.close().await.unwrap();
    server.shutdown().await;
}
