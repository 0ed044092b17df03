use colorlab::drivers::{CleaningStationDriver, RobotArmDriver};
use colorlab::protocol::{Response, FUNCTION_NOT_FOUND};
use colorlab::server::{process_line, CommandServer, ServerHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

async fn start_cleaning_station() -> ServerHandle {
    CommandServer::bind(
        "cleaning_station",
        "127.0.0.1:0",
        Arc::new(CleaningStationDriver::new(true)),
    )
    .await
    .unwrap()
    .spawn()
}

struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Peer {
    async fn connect(addr: SocketAddr) -> Self {
        let (reader, writer) = TcpStream::connect(addr).await.unwrap().into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn request(&mut self, line: &str) -> String {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        let mut response = String::new();
        tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut response))
            .await
            .unwrap()
            .unwrap();
        response
    }
}

#[tokio::test]
async fn test_valid_command_and_connection_reuse() {
    let server = start_cleaning_station().await;
    let mut peer = Peer::connect(server.local_addr()).await;

    let command = r#"{"function":"clean","params":{"duration_sec":1}}"#;
    assert_eq!(peer.request(command).await, "true\n");
    assert_eq!(peer.request(command).await, "true\n");
}

#[tokio::test]
async fn test_unknown_function_exact_error() {
    let server = start_cleaning_station().await;
    let mut peer = Peer::connect(server.local_addr()).await;

    let response = peer.request(r#"{"function":"self_destruct","params":{}}"#).await;
    assert_eq!(response, "{\"error\":\"Function not found\"}\n");
}

#[tokio::test]
async fn test_unknown_function_checked_before_params() {
    let server = start_cleaning_station().await;
    let mut peer = Peer::connect(server.local_addr()).await;

    let response = peer.request(r#"{"function":"self_destruct","params":[1,2]}"#).await;
    assert_eq!(response, "{\"error\":\"Function not found\"}\n");

    let known = peer.request(r#"{"function":"clean","params":[1,2]}"#).await;
    assert!(known.starts_with("{\"error\":\"Malformed command:"), "{known}");
}

#[tokio::test]
async fn test_out_of_range_duration_is_an_error_line() {
    let server = start_cleaning_station().await;
    let mut peer = Peer::connect(server.local_addr()).await;

    let response = peer.request(r#"{"function":"clean","params":{"duration_sec":1e20}}"#).await;
    assert!(response.starts_with("{\"error\":"), "{response}");
    assert!(response.contains("duration_sec"), "{response}");

    assert_eq!(
        peer.request(r#"{"function":"clean","params":{"duration_sec":0}}"#).await,
        "true\n"
    );
}

#[tokio::test]
async fn test_invalid_json_keeps_connection_usable() {
    let server = start_cleaning_station().await;
    let mut peer = Peer::connect(server.local_addr()).await;

    assert_eq!(peer.request("not json").await, "{\"error\":\"Invalid JSON received\"}\n");
    assert_eq!(peer.request("").await, "{\"error\":\"Invalid JSON received\"}\n");
    assert_eq!(
        peer.request(r#"{"function":"clean","params":{"duration_sec":0}}"#).await,
        "true\n"
    );
}

#[tokio::test]
async fn test_parameter_mismatch_is_reported() {
    let server = start_cleaning_station().await;
    let mut peer = Peer::connect(server.local_addr()).await;

    let extra = peer
        .request(r#"{"function":"clean","params":{"duration_sec":1,"speed":3}}"#)
        .await;
    assert!(extra.contains("unknown field `speed`"), "{extra}");

    let missing = peer.request(r#"{"function":"clean","params":{}}"#).await;
    assert!(missing.contains("missing field `duration_sec`"), "{missing}");

    let negative = peer.request(r#"{"function":"clean","params":{"duration_sec":-1}}"#).await;
    assert!(negative.starts_with("{\"error\":"), "{negative}");
}

#[tokio::test]
async fn test_malformed_command_shape() {
    let server = start_cleaning_station().await;
    let mut peer = Peer::connect(server.local_addr()).await;

    let response = peer.request(r#"{"function": 5}"#).await;
    assert!(response.starts_with("{\"error\":\"Malformed command:"), "{response}");
}

#[tokio::test]
async fn test_connections_are_served_concurrently() {
    let server = CommandServer::bind(
        "robot_arm",
        "127.0.0.1:0",
        Arc::new(RobotArmDriver::new(Duration::from_millis(200))),
    )
    .await
    .unwrap()
    .spawn();

    let addr = server.local_addr();
    let started = std::time::Instant::now();
    let calls = (0..4).map(|i| async move {
        let mut peer = Peer::connect(addr).await;
        let line = format!(r#"{{"function":"move","params":{{"from_location":"a{i}","to_location":"b"}}}}"#);
        peer.request(&line).await
    });
    let responses = futures_util::future::join_all(calls).await;

    assert!(responses.iter().all(|r| r == "true\n"), "{responses:?}");
    assert!(started.elapsed() < Duration::from_millis(750));
}

#[tokio::test]
async fn test_shutdown_stops_listener() {
    let server = start_cleaning_station().await;
    let addr = server.local_addr();
    server.shutdown().await;
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_process_line_dispatch() {
    let driver = RobotArmDriver::new(Duration::ZERO);

    let moved = process_line(&driver, br#"{"function":"move","params":{"from_location":"a","to_location":"b"}}"#).await;
    assert_eq!(moved, Response::Success(serde_json::Value::Bool(true)));

    let emptied = process_line(&driver, br#"{"function":"empty"}"#).await;
    assert_eq!(emptied, Response::Success(serde_json::Value::Bool(true)));

    let unknown = process_line(&driver, br#"{"function":"clean","params":{"duration_sec":1}}"#).await;
    assert_eq!(unknown, Response::error(FUNCTION_NOT_FOUND));

    let unknown_with_bad_params = process_line(&driver, br#"{"function":"self_destruct","params":[1,2]}"#).await;
    assert_eq!(unknown_with_bad_params, Response::error(FUNCTION_NOT_FOUND));
}
