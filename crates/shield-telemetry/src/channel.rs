//! WebSocket telemetry channel.
//!
//! The connection is an explicit state machine:
//!
//! ```text
//! Disconnected --(retry_at reached)--> Connecting --ok--> Connected
//!      ^                                   |                  |
//!      +----------- fail, +backoff --------+---- send error --+
//! ```
//!
//! Reconnection is attempted lazily from [`TelemetrySink::send_metadata`], so
//! the owning loop never blocks longer than the configured timeout and a frame
//! is only sent after its metadata went out on the same connection.
//!
//! Incoming traffic is drained without waiting before each tick's metadata.
//! Reading is what makes tungstenite answer pings; a Close from the viewer is
//! handled as a lost connection.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::{FutureExt, SinkExt, StreamExt};
use metrics::{counter, gauge};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use shield_models::TelemetryMessage;

use crate::error::{TelemetryError, TelemetryResult};

const RECONNECTS_TOTAL: &str = "shield_telemetry_reconnects_total";
const MESSAGES_TOTAL: &str = "shield_telemetry_messages_total";
const CONNECTED: &str = "shield_telemetry_connected";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Per-tick telemetry output.
#[async_trait]
pub trait TelemetrySink: Send {
    /// Send the tick's metadata. May (re)connect first.
    async fn send_metadata(&mut self, message: &TelemetryMessage) -> TelemetryResult<()>;

    /// Send the tick's JPEG frame. Never connects.
    async fn send_frame(&mut self, jpeg: Vec<u8>) -> TelemetryResult<()>;

    /// Whether a frame sent now could be delivered.
    fn is_connected(&self) -> bool;
}

/// Configuration for the telemetry channel.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Viewer endpoint, e.g. `ws://host:8000/ws/push/cam1`
    pub url: String,
    /// Fixed delay between reconnect attempts
    pub backoff: Duration,
    /// Bound on a single connect or send
    pub timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws/push/cam1".to_string(),
            backoff: Duration::from_secs(3),
            timeout: Duration::from_secs(2),
        }
    }
}

impl TelemetryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("LIVESTREAM_URL")
                .unwrap_or_else(|_| "ws://localhost:8000/ws/push/cam1".to_string()),
            backoff: Duration::from_secs(
                std::env::var("TELEMETRY_BACKOFF_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
            ),
            timeout: Duration::from_millis(
                std::env::var("TELEMETRY_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
        }
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected { retry_at: Instant },
    Connecting,
    Connected,
}

enum ConnectionState {
    Disconnected { retry_at: Instant },
    Connecting,
    Connected(Box<WsStream>),
}

/// Persistent, self-healing connection to the viewer.
pub struct TelemetryChannel {
    config: TelemetryConfig,
    state: ConnectionState,
    connect_attempts: u64,
}

impl TelemetryChannel {
    /// Create a disconnected channel that will connect on first use.
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected {
                retry_at: Instant::now(),
            },
            connect_attempts: 0,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        match &self.state {
            ConnectionState::Disconnected { retry_at } => ConnectionStatus::Disconnected {
                retry_at: *retry_at,
            },
            ConnectionState::Connecting => ConnectionStatus::Connecting,
            ConnectionState::Connected(_) => ConnectionStatus::Connected,
        }
    }

    /// Number of connection attempts made so far.
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts
    }

    /// Connect if disconnected and the backoff has elapsed.
    pub async fn ensure_connected(&mut self) -> bool {
        match self.state {
            ConnectionState::Connected(_) => return true,
            ConnectionState::Disconnected { retry_at } if Instant::now() < retry_at => {
                return false
            }
            _ => {}
        }

        self.state = ConnectionState::Connecting;
        self.connect_attempts += 1;
        if self.connect_attempts > 1 {
            counter!(RECONNECTS_TOTAL).increment(1);
        }

        match self.connect().await {
            Ok(ws) => {
                info!("Connected to telemetry endpoint {}", self.config.url);
                gauge!(CONNECTED).set(1.0);
                self.state = ConnectionState::Connected(Box::new(ws));
                true
            }
            Err(e) => {
                warn!(
                    "Telemetry connect to {} failed, retrying in {:?}: {}",
                    self.config.url, self.config.backoff, e
                );
                self.back_off();
                false
            }
        }
    }

    async fn connect(&self) -> TelemetryResult<WsStream> {
        let (ws, _response) = tokio::time::timeout(self.config.timeout, connect_async(self.config.url.as_str()))
            .await
            .map_err(|_| TelemetryError::Timeout(self.config.timeout.as_millis() as u64))?
            .map_err(|e| TelemetryError::Connect(e.to_string()))?;
        Ok(ws)
    }

    /// Process whatever the viewer sent since the last tick.
    ///
    /// Pongs are queued by tungstenite while reading and flushed with the next
    /// write. Returns `false` if the connection turned out to be gone.
    fn drain_incoming(&mut self) -> bool {
        let ConnectionState::Connected(ws) = &mut self.state else {
            return false;
        };

        let lost = loop {
            match ws.next().now_or_never() {
                None => break None,
                Some(Some(Ok(Message::Close(frame)))) => {
                    break Some(format!("closed by viewer ({:?})", frame))
                }
                Some(Some(Ok(message))) => {
                    debug!(bytes = message.len(), "Ignoring inbound telemetry message");
                }
                Some(Some(Err(e))) => break Some(e.to_string()),
                Some(None) => break Some("stream ended".to_string()),
            }
        };

        match lost {
            None => true,
            Some(reason) => {
                warn!(
                    "Telemetry connection lost, reconnecting in {:?}: {}",
                    self.config.backoff, reason
                );
                self.back_off();
                false
            }
        }
    }

    fn back_off(&mut self) {
        gauge!(CONNECTED).set(0.0);
        self.state = ConnectionState::Disconnected {
            retry_at: Instant::now() + self.config.backoff,
        };
    }

    async fn send(&mut self, message: Message, kind: &'static str) -> TelemetryResult<()> {
        let ConnectionState::Connected(ws) = &mut self.state else {
            return Err(TelemetryError::Closed);
        };

        let outcome = match tokio::time::timeout(self.config.timeout, ws.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TelemetryError::Send(e.to_string())),
            Err(_) => Err(TelemetryError::Timeout(self.config.timeout.as_millis() as u64)),
        };

        match outcome {
            Ok(()) => {
                counter!(MESSAGES_TOTAL, "kind" => kind).increment(1);
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Telemetry connection lost, reconnecting in {:?}: {}",
                    self.config.backoff, e
                );
                self.back_off();
                Err(e)
            }
        }
    }
}

#[async_trait]
impl TelemetrySink for TelemetryChannel {
    async fn send_metadata(&mut self, message: &TelemetryMessage) -> TelemetryResult<()> {
        if self.is_connected() && !self.drain_incoming() {
            return Err(TelemetryError::Closed);
        }
        if !self.ensure_connected().await {
            return Err(TelemetryError::Closed);
        }
        let json = serde_json::to_string(message)?;
        debug!(bytes = json.len(), "Sending telemetry metadata");
        self.send(Message::Text(json), "metadata").await
    }

    async fn send_frame(&mut self, jpeg: Vec<u8>) -> TelemetryResult<()> {
        self.send(Message::Binary(jpeg), "frame").await
    }

    fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shield_models::{Detection, DetectorKind, DetectorResult, Event, EventType};
    use tokio::net::TcpListener;

    fn config(addr: std::net::SocketAddr, backoff: Duration) -> TelemetryConfig {
        TelemetryConfig {
            url: format!("ws://{}/ws/push/cam1", addr),
            backoff,
            timeout: Duration::from_secs(1),
        }
    }

    fn message() -> TelemetryMessage {
        let result = DetectorResult::new().with(
            DetectorKind::Fire,
            vec![Detection::new([0.0, 0.0, 1.0, 1.0], 0.6, 0, "fire")],
        );
        TelemetryMessage::detections(&result, Some(&Event::new(EventType::Fire, 0.6)))
    }

    #[tokio::test]
    async fn test_metadata_then_frame_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let first = ws.next().await.unwrap().unwrap();
            let second = ws.next().await.unwrap().unwrap();
            (first, second)
        });

        let mut channel = TelemetryChannel::new(config(addr, Duration::from_secs(3)));
        channel.send_metadata(&message()).await.unwrap();
        assert!(channel.is_connected());
        channel.send_frame(vec![0xFF, 0xD8, 0xFF]).await.unwrap();

        let (first, second) = server.await.unwrap();
        match first {
            Message::Text(text) => {
                let json: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(json["type"], "detections");
                assert_eq!(json["event_type"], "Fire");
            }
            other => panic!("expected text metadata, got {:?}", other),
        }
        assert_eq!(second, Message::Binary(vec![0xFF, 0xD8, 0xFF]));
    }

    #[tokio::test]
    async fn test_failed_connect_backs_off() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut channel = TelemetryChannel::new(config(addr, Duration::from_secs(3)));
        let err = channel.send_metadata(&message()).await.unwrap_err();
        assert!(err.is_closed());
        assert_eq!(channel.connect_attempts(), 1);

        match channel.status() {
            ConnectionStatus::Disconnected { retry_at } => {
                assert!(retry_at > Instant::now() + Duration::from_secs(2));
            }
            other => panic!("expected disconnected, got {:?}", other),
        }

        // Within the backoff window no new attempt is made.
        assert!(channel.send_metadata(&message()).await.is_err());
        assert_eq!(channel.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_frame_is_not_sent_while_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut channel = TelemetryChannel::new(config(addr, Duration::from_secs(3)));
        let err = channel.send_frame(vec![1, 2, 3]).await.unwrap_err();
        assert!(err.is_closed());
        assert_eq!(channel.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn test_viewer_pings_are_answered() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Ping(b"keepalive".to_vec())).await.unwrap();

            let mut seen = Vec::new();
            while let Ok(Some(Ok(message))) =
                tokio::time::timeout(Duration::from_secs(2), ws.next()).await
            {
                let kind = match message {
                    Message::Text(_) => "text",
                    Message::Binary(_) => "binary",
                    Message::Pong(ref payload) if payload.as_slice() == b"keepalive" => "pong",
                    _ => "other",
                };
                seen.push(kind);
                if kind == "pong" {
                    break;
                }
            }
            seen
        });

        let mut channel = TelemetryChannel::new(config(addr, Duration::from_secs(3)));
        for _ in 0..3 {
            channel.send_metadata(&message()).await.unwrap();
            channel.send_frame(vec![0xFF, 0xD8]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let seen = server.await.unwrap();
        assert_eq!(&seen[..2], &["text", "binary"]);
        assert!(seen.contains(&"pong"), "no pong in {:?}", seen);
        assert!(channel.is_connected());
        assert_eq!(channel.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_viewer_close_is_noticed_before_sending() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.next().await.unwrap().unwrap();
            ws.send(Message::Close(None)).await.unwrap();
            closed_tx.send(()).unwrap();
            // keep the socket open until the client replies
            let _ = tokio::time::timeout(Duration::from_secs(1), ws.next()).await;
        });

        let mut channel = TelemetryChannel::new(config(addr, Duration::from_secs(3)));
        channel.send_metadata(&message()).await.unwrap();

        closed_rx.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = channel.send_metadata(&message()).await.unwrap_err();
        assert!(err.is_closed());
        assert!(matches!(channel.status(), ConnectionStatus::Disconnected { .. }));
        assert!(channel.send_frame(vec![0xFF, 0xD8]).await.is_err());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_lost_session_backs_off_then_resumes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (dropped_tx, dropped_rx) = tokio::sync::oneshot::channel();

        let server = tokio::spawn(async move {
            // First session: read one message, then vanish without a Close.
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.next().await.unwrap().unwrap();
            drop(ws);
            dropped_tx.send(()).unwrap();

            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.next().await.unwrap().unwrap()
        });

        let backoff = Duration::from_millis(100);
        let mut channel = TelemetryChannel::new(config(addr, backoff));
        channel.send_metadata(&message()).await.unwrap();
        assert_eq!(channel.connect_attempts(), 1);

        dropped_rx.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut failed = false;
        for _ in 0..5 {
            let sent = match channel.send_metadata(&message()).await {
                Ok(()) => channel.send_frame(vec![0xFF, 0xD8]).await.is_ok(),
                Err(_) => false,
            };
            if !sent {
                failed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(failed, "sends kept succeeding on a dropped session");
        assert!(matches!(channel.status(), ConnectionStatus::Disconnected { .. }));

        // Still inside the backoff window.
        assert!(channel.send_metadata(&message()).await.is_err());
        assert_eq!(channel.connect_attempts(), 1);

        tokio::time::sleep(backoff + Duration::from_millis(50)).await;
        channel.send_metadata(&message()).await.unwrap();
        assert_eq!(channel.connect_attempts(), 2);
        assert_eq!(channel.status(), ConnectionStatus::Connected);
        assert!(matches!(server.await.unwrap(), Message::Text(_)));
    }

    #[tokio::test]
    async fn test_reconnects_after_backoff() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut channel = TelemetryChannel::new(config(addr, Duration::from_millis(50)));
        assert!(!channel.ensure_connected().await);

        let listener = TcpListener::bind(addr).await.unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.next().await.unwrap().unwrap()
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        channel.send_metadata(&message()).await.unwrap();

        assert_eq!(channel.connect_attempts(), 2);
        assert_eq!(channel.status(), ConnectionStatus::Connected);
        assert!(matches!(server.await.unwrap(), Message::Text(_)));
    }
}
