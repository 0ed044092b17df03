//! Client side of the device command protocol.
//!
//! A [`DeviceClient`] keeps one TCP connection to a device server and issues
//! calls on it one at a time. Every failure mode has its own [`ClientError`]
//! variant so callers can tell a retryable timeout from a rejected payload
//! or a dead connection.

use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::{DEFAULT_CLIENT_TIMEOUT_SECS, DEFAULT_HOST};
use crate::protocol::{self, Command, ProtocolError, Response};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Connection is not open. Call open() first.")]
    NotConnected,
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },
    #[error("Transport error during {function}: {source}")]
    Transport {
        function: String,
        source: std::io::Error,
    },
    #[error("No response to {function} within {timeout:?}")]
    Timeout { function: String, timeout: Duration },
    #[error("No data received from the server for command: {function}")]
    EmptyResponse { function: String },
    #[error("Invalid JSON received from the server for command {function}: {line}")]
    MalformedResponse { function: String, line: String },
    #[error("Server error for command {function}: {message}")]
    Remote { function: String, message: String },
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ProtocolError),
}

impl ClientError {
    /// The call may succeed if simply issued again (after reopening).
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    /// The connection was dropped; `open()` must be called before the next call.
    pub fn needs_reconnect(&self) -> bool {
        matches!(
            self,
            ClientError::NotConnected
                | ClientError::Connect { .. }
                | ClientError::Transport { .. }
                | ClientError::Timeout { .. }
                | ClientError::EmptyResponse { .. }
        )
    }
}

#[derive(Debug)]
struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

#[derive(Debug)]
pub struct DeviceClient {
    addr: String,
    timeout: Duration,
    connection: Option<Connection>,
}

impl DeviceClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self::with_timeout(host, port, Duration::from_secs_f64(DEFAULT_CLIENT_TIMEOUT_SECS))
    }

    pub fn with_timeout(host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            timeout,
            connection: None,
        }
    }

    pub fn localhost(port: u16) -> Self {
        Self::new(DEFAULT_HOST, port)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Connect if not already connected.
    pub async fn open(&mut self) -> Result<(), ClientError> {
        if self.connection.is_some() {
            return Ok(());
        }
        let connect = TcpStream::connect(&self.addr);
        let stream = match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ClientError::Connect {
                    addr: self.addr.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ClientError::Connect {
                    addr: self.addr.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
                })
            }
        };
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();
        self.connection = Some(Connection {
            reader: BufReader::new(reader),
            writer,
        });
        info!("🔗 Connected to device at {}", self.addr);
        Ok(())
    }

    /// Close the connection. Safe to call when already closed.
    pub async fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            let _ = connection.writer.shutdown().await;
            debug!("Closed connection to {}", self.addr);
        }
    }

    /// Send one command and wait for its response.
    pub async fn call(&mut self, function: &str, params: Value) -> Result<Value, ClientError> {
        if self.connection.is_none() {
            return Err(ClientError::NotConnected);
        }
        let command = Command::from_value(function, params)?;
        let line = protocol::encode_command(&command)?;
        let connection = self.connection.as_mut().ok_or(ClientError::NotConnected)?;

        let exchange = async {
            connection.writer.write_all(line.as_bytes()).await?;
            connection.writer.flush().await?;
            let mut response = Vec::new();
            connection.reader.read_until(b'\n', &mut response).await?;
            Ok::<_, std::io::Error>(response)
        };

        let outcome = tokio::time::timeout(self.timeout, exchange).await;
        let raw = match outcome {
            Ok(Ok(raw)) => raw,
            Ok(Err(source)) => {
                self.connection = None;
                return Err(ClientError::Transport {
                    function: function.to_string(),
                    source,
                });
            }
            Err(_) => {
                // A late response would answer the wrong call; start over.
                self.connection = None;
                return Err(ClientError::Timeout {
                    function: function.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        if raw.is_empty() {
            self.connection = None;
            return Err(ClientError::EmptyResponse {
                function: function.to_string(),
            });
        }

        let text = String::from_utf8_lossy(&raw);
        match protocol::decode_response(&text) {
            Ok(Response::Success(value)) => Ok(value),
            Ok(Response::Error(message)) => Err(ClientError::Remote {
                function: function.to_string(),
                message,
            }),
            Err(_) => Err(ClientError::MalformedResponse {
                function: function.to_string(),
                line: text.trim_end().to_string(),
            }),
        }
    }
}
