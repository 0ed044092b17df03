//! Per-device TCP command server.
//!
//! Each connection is served by its own task: read one line, dispatch it to
//! the bound driver, write one line back, repeat until EOF. Failures while
//! decoding or running a command become `{"error": ...}` responses and the
//! connection stays usable; only socket errors end a connection.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::driver::Driver;
use crate::protocol::{self, Response, FUNCTION_NOT_FOUND};

/// Longest request line accepted before the connection is dropped.
pub const MAX_COMMAND_BYTES: usize = 1 << 20;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {name} on {addr}: {source}")]
    Bind {
        name: String,
        addr: String,
        source: std::io::Error,
    },
}

pub struct CommandServer {
    name: String,
    listener: TcpListener,
    local_addr: SocketAddr,
    driver: Arc<dyn Driver>,
}

impl CommandServer {
    pub async fn bind(
        name: impl Into<String>,
        addr: &str,
        driver: Arc<dyn Driver>,
    ) -> Result<Self, ServerError> {
        let name = name.into();
        let bind_error = |source| ServerError::Bind {
            name: name.clone(),
            addr: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        Ok(Self {
            name,
            listener,
            local_addr,
            driver,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections forever. Dropping this future cancels every open connection.
    pub async fn run(self) {
        info!("🌐 {} driver listening on {}", self.name, self.local_addr);
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        info!("🔗 {}: established connection by {}", self.name, addr);
                        let driver = Arc::clone(&self.driver);
                        let name = self.name.clone();
                        connections.spawn(async move {
                            if let Err(e) = handle_connection(stream, driver.as_ref()).await {
                                warn!("{}: client {} error: {}", name, addr, e);
                            }
                            info!("🔌 {}: closing connection from {}", name, addr);
                        });
                    }
                    Err(e) => {
                        error!("{}: failed to accept connection: {}", self.name, e);
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }
    }

    pub fn spawn(self) -> ServerHandle {
        let name = self.name.clone();
        let local_addr = self.local_addr;
        ServerHandle {
            name,
            local_addr,
            task: tokio::spawn(self.run()),
        }
    }
}

/// A running command server. Dropping the handle stops it.
#[derive(Debug)]
pub struct ServerHandle {
    name: String,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn shutdown(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
        debug!("{} on {} stopped", self.name, self.local_addr);
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Serve one connection until the peer closes it.
pub async fn handle_connection(stream: TcpStream, driver: &dyn Driver) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        let limit = (MAX_COMMAND_BYTES + 1) as u64;
        let n = (&mut reader).take(limit).read_until(b'\n', &mut line).await?;
        if n == 0 {
            break;
        }
        if line.len() > MAX_COMMAND_BYTES && line.last() != Some(&b'\n') {
            let response = Response::error(format!("Command exceeds {MAX_COMMAND_BYTES} bytes"));
            write_response(&mut writer, &response).await?;
            break;
        }

        let response = process_line(driver, &line).await;
        write_response(&mut writer, &response).await?;
    }

    // The peer may already be gone; nothing useful to report then.
    let _ = writer.shutdown().await;
    Ok(())
}

/// Decode and dispatch one request line.
pub async fn process_line(driver: &dyn Driver, line: &[u8]) -> Response {
    let request = match protocol::decode_request(line) {
        Ok(request) => request,
        Err(e) => return Response::error(e.to_string()),
    };

    if !driver.supports(&request.function) {
        debug!("{}: unknown function {:?}", driver.kind(), request.function);
        return Response::error(FUNCTION_NOT_FOUND);
    }

    let command = match request.into_command() {
        Ok(command) => command,
        Err(e) => return Response::error(e.to_string()),
    };

    debug!("📨 {}: {} {:?}", driver.kind(), command.function, command.params);
    match driver.invoke(&command.function, command.params).await {
        Ok(value) => Response::Success(value),
        Err(e) => {
            warn!("{}: {} failed: {}", driver.kind(), command.function, e);
            Response::error(e.to_string())
        }
    }
}

async fn write_response<W>(writer: &mut W, response: &Response) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = match protocol::encode_response(response) {
        Ok(line) => line,
        Err(e) => {
            error!("Failed to encode response: {}", e);
            protocol::encode_response(&Response::error(e.to_string()))
                .unwrap_or_else(|_| "{\"error\":\"Serialization failed\"}\n".to_string())
        }
    };
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}
