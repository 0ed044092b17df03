use colorlab::client::{ClientError, DeviceClient};
use colorlab::drivers::CleaningStationDriver;
use colorlab::server::CommandServer;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// A peer that answers the first request line with `reply` (or nothing) and then
/// either closes or stays silent.
async fn scripted_peer(reply: Option<&'static str>, close_after: bool) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        if let Some(reply) = reply {
            writer.write_all(reply.as_bytes()).await.unwrap();
        }
        if close_after {
            return;
        }
        tokio::time::sleep(Duration::from_secs(30)).await;
    });
    port
}

#[tokio::test]
async fn test_call_requires_open_connection() {
    let mut client = DeviceClient::localhost(5001);
    let err = client.call("clean", json!({"duration_sec": 1})).await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
    assert!(err.needs_reconnect());

    let err = client.call("clean", json!([1])).await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected), "{err:?}");
}

#[tokio::test]
async fn test_success_and_remote_error() {
    let server = CommandServer::bind("cleaning_station", "127.0.0.1:0", Arc::new(CleaningStationDriver::new(true)))
        .await
        .unwrap()
        .spawn();

    let mut client = DeviceClient::localhost(server.local_addr().port());
    client.open().await.unwrap();
    client.open().await.unwrap();

    assert_eq!(client.call("clean", json!({"duration_sec": 2})).await.unwrap(), json!(true));

    match client.call("launch", json!({})).await {
        Err(ClientError::Remote { function, message }) => {
            assert_eq!(function, "launch");
            assert_eq!(message, "Function not found");
        }
        other => panic!("unexpected {other:?}"),
    }

    // Remote errors leave the connection usable.
    assert!(client.is_open());
    assert_eq!(client.call("clean", json!({"duration_sec": 0})).await.unwrap(), json!(true));

    client.close().await;
    client.close().await;
    assert!(!client.is_open());
}

#[tokio::test]
async fn test_malformed_response() {
    let port = scripted_peer(Some("definitely not json\n"), false).await;
    let mut client = DeviceClient::localhost(port);
    client.open().await.unwrap();

    match client.call("analyze", json!({})).await {
        Err(ClientError::MalformedResponse { line, .. }) => assert_eq!(line, "definitely not json"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_response_drops_connection() {
    let port = scripted_peer(None, true).await;
    let mut client = DeviceClient::localhost(port);
    client.open().await.unwrap();

    let err = client.call("analyze", json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::EmptyResponse { .. }), "{err:?}");
    assert!(!client.is_open());
}

#[tokio::test]
async fn test_timeout_is_retryable_and_drops_connection() {
    let port = scripted_peer(None, false).await;
    let mut client = DeviceClient::with_timeout("127.0.0.1", port, Duration::from_millis(100));
    client.open().await.unwrap();

    let err = client.call("analyze", json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout { .. }), "{err:?}");
    assert!(err.is_retryable());
    assert!(!client.is_open());
}

#[tokio::test]
async fn test_connect_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut client = DeviceClient::with_timeout("127.0.0.1", port, Duration::from_secs(2));
    let err = client.open().await.unwrap_err();
    assert!(matches!(err, ClientError::Connect { .. }), "{err:?}");
}

#[tokio::test]
async fn test_non_object_params_rejected_locally() {
    let port = scripted_peer(Some("true\n"), false).await;
    let mut client = DeviceClient::localhost(port);
    client.open().await.unwrap();

    let err = client.call("clean", json!([1])).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidRequest(_)), "{err:?}");
    assert!(client.is_open());
}
