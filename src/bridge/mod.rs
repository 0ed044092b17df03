//! WebSocket gateway between device drivers and one simulation instance.
//!
//! A bridge accepts exactly one streaming client at a time. Drivers push
//! fire-and-forget control messages into an ordered outbound queue and can
//! issue one correlated request, [`Simulation::compute_average_color`],
//! which waits for the client to answer with an `averageColor` event.

pub mod correlation;
pub mod message;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, error, info, warn};

pub use correlation::{ColorCorrelator, ColorRequest};
pub use message::{EventError, Rgb, SimEvent, SimMessage};

use crate::config::DEFAULT_COMPUTE_TIMEOUT_SECS;

pub const ALREADY_CONNECTED_REASON: &str = "Server already has an active connection";

const REJECT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// What drivers need from a simulation.
#[async_trait]
pub trait Simulation: Send + Sync {
    /// Queue a control message for delivery in FIFO order.
    fn enqueue(&self, message: SimMessage);

    /// Ask the simulation for its average color. `None` means no answer within the timeout.
    async fn compute_average_color(&self) -> Option<Rgb>;

    fn update_config(&self, key: &str, value: Value) {
        self.enqueue(SimMessage::update_config(key, value));
    }

    fn clear(&self) {
        self.enqueue(SimMessage::Clear);
    }

    fn center_splat(&self) {
        self.enqueue(SimMessage::CenterSplat);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to bind simulation bridge on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub compute_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            compute_timeout: Duration::from_secs_f64(DEFAULT_COMPUTE_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug)]
pub struct SimulationBridge {
    port: u16,
    config: BridgeConfig,
    outbound_tx: mpsc::UnboundedSender<SimMessage>,
    outbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<SimMessage>>,
    pending: AtomicUsize,
    client: Mutex<Option<SocketAddr>>,
    color: ColorCorrelator,
    compute_gate: tokio::sync::Mutex<()>,
}

impl SimulationBridge {
    /// Create a bridge without a listener. `port` is only used for logging.
    pub fn new(port: u16, config: BridgeConfig) -> Arc<Self> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            port,
            config,
            outbound_tx,
            outbound_rx: tokio::sync::Mutex::new(outbound_rx),
            pending: AtomicUsize::new(0),
            client: Mutex::new(None),
            color: ColorCorrelator::new(),
            compute_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Bind a listener and start accepting simulation clients in the background.
    pub async fn start(addr: &str, config: BridgeConfig) -> Result<BridgeHandle, BridgeError> {
        let bind_error = |source| BridgeError::Bind {
            addr: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let bridge = Self::new(local_addr.port(), config);
        info!("🌊 Fluid simulation bridge listening on ws://{}", local_addr);
        let task = tokio::spawn(Arc::clone(&bridge).accept_loop(listener));

        Ok(BridgeHandle {
            bridge,
            local_addr,
            task,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_client_attached(&self) -> bool {
        self.client_slot().is_some()
    }

    /// Messages queued but not yet handed to a client.
    pub fn pending_messages(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn color_state(&self) -> ColorRequest {
        self.color.state()
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        let mut sessions = JoinSet::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        sessions.spawn(Arc::clone(&self).handle_connection(stream, addr));
                    }
                    Err(e) => {
                        error!("Bridge on port {} failed to accept connection: {}", self.port, e);
                    }
                },
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let mut ws = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake with {} failed: {}", addr, e);
                return;
            }
        };

        let Some(_attached) = self.try_attach(addr) else {
            warn!(
                "🚫 Rejecting simulation client {} on port {}: already attached",
                addr, self.port
            );
            reject(&mut ws).await;
            return;
        };

        info!("🔗 Fluid simulation on port {} connected from {}", self.port, addr);
        let (sink, source) = ws.split();
        tokio::select! {
            () = self.receive_loop(source) => {}
            () = self.send_loop(sink) => {}
        }
        info!("🔌 Fluid simulation on port {} disconnected", self.port);
    }

    fn try_attach(&self, addr: SocketAddr) -> Option<AttachGuard<'_>> {
        let mut slot = self.client_slot();
        if slot.is_some() {
            return None;
        }
        *slot = Some(addr);
        Some(AttachGuard { bridge: self })
    }

    async fn receive_loop(&self, mut source: WsSource) {
        while let Some(frame) = source.next().await {
            match frame {
                Ok(Message::Text(text)) => self.handle_event(&text),
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => self.handle_event(text),
                    Err(_) => warn!("Bridge on port {} received non-UTF-8 binary frame", self.port),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("Connection on port {} closed while receiving: {}", self.port, e);
                    break;
                }
            }
        }
    }

    fn handle_event(&self, text: &str) {
        match SimEvent::parse(text) {
            Ok(SimEvent::AverageColor(color)) => {
                if self.color.offer(color) {
                    debug!("Average color {:?} delivered on port {}", color, self.port);
                } else {
                    warn!("Dropping unsolicited average color {:?} on port {}", color, self.port);
                }
            }
            Ok(SimEvent::Other(kind)) => {
                info!("Received unknown message type: {}", kind);
            }
            Err(e) => {
                warn!("Bridge on port {} received invalid event: {}", self.port, e);
            }
        }
    }

    async fn send_loop(&self, mut sink: WsSink) {
        let mut outbound = self.outbound_rx.lock().await;
        while let Some(message) = outbound.recv().await {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode {} message: {}", message.type_name(), e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text)).await {
                warn!("Connection on port {} closed while sending: {}", self.port, e);
                break;
            }
        }
    }

    fn client_slot(&self) -> std::sync::MutexGuard<'_, Option<SocketAddr>> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Simulation for SimulationBridge {
    fn enqueue(&self, message: SimMessage) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.outbound_tx.send(message).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            error!("Outbound queue for port {} is closed", self.port);
        }
    }

    /// Compute requests are serialized per bridge; concurrent callers wait their turn.
    ///
    /// Without an attached client the request is not queued and the call
    /// just waits out the timeout. A queued request would otherwise be
    /// answered after later mix messages by a client that attaches later,
    /// and that stale color could fulfil the next request.
    async fn compute_average_color(&self) -> Option<Rgb> {
        let _turn = self.compute_gate.lock().await;
        let pending = self.color.begin();
        if self.is_client_attached() {
            self.enqueue(SimMessage::ComputeAverageColor);
        } else {
            debug!("No simulation client on port {}, compute request not sent", self.port);
        }
        let color = pending.wait(self.config.compute_timeout).await;
        if color.is_none() {
            warn!("Timeout waiting for average color response on port {}", self.port);
        }
        color
    }
}

struct AttachGuard<'a> {
    bridge: &'a SimulationBridge,
}

impl Drop for AttachGuard<'_> {
    fn drop(&mut self) {
        *self.bridge.client_slot() = None;
    }
}

async fn reject(ws: &mut WebSocketStream<TcpStream>) {
    let frame = CloseFrame {
        code: CloseCode::Policy,
        reason: Cow::Borrowed(ALREADY_CONNECTED_REASON),
    };
    if let Err(e) = ws.close(Some(frame)).await {
        debug!("Failed to send policy close: {}", e);
        return;
    }
    // Let the peer echo the close frame so the handshake finishes cleanly.
    let _ = tokio::time::timeout(REJECT_DRAIN_TIMEOUT, async {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;
}

/// A running bridge listener. Dropping the handle stops the listener and its sessions.
#[derive(Debug)]
pub struct BridgeHandle {
    bridge: Arc<SimulationBridge>,
    local_addr: SocketAddr,
    task: tokio::task::JoinHandle<()>,
}

impl BridgeHandle {
    pub fn bridge(&self) -> Arc<SimulationBridge> {
        Arc::clone(&self.bridge)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn shutdown(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
        info!("Fluid simulation bridge on {} stopped", self.local_addr);
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
