//! Socket lifecycle types and the `WebSocket` transport.
//!
//! The client never touches a socket directly. A [`Transport`] opens a
//! [`Socket`], which is just a pair of channels: outbound messages go
//! to a writer task, inbound [`SocketEvent`]s come from a reader task.
//! [`WsTransport`] backs this with `tokio-tungstenite`.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::error::GatewayResult;

/// Type alias for the `WebSocket` stream used by the transport.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the per-socket channels.
const SOCKET_CHANNEL_CAPACITY: usize = 64;

/// Close code reported when a socket ends without a close handshake.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Close code for a normal, locally requested close.
pub const CLOSE_NORMAL: u16 = 1000;

/// Lifecycle state of the gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket.
    Closed,
    /// A socket is being established.
    Connecting,
    /// The socket is open and Identify has been sent.
    Open,
    /// A local close was requested; waiting for the transport to finish.
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// Close details surfaced when a socket ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// `WebSocket` close code.
    pub code: u16,
    /// Close reason supplied by the closing side.
    pub reason: String,
    /// Whether the close handshake completed.
    pub clean: bool,
}

impl CloseInfo {
    /// A close that did not go through the close handshake.
    #[must_use]
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: CLOSE_ABNORMAL,
            reason: reason.into(),
            clean: false,
        }
    }
}

/// A message handed to the socket writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// A serialized gateway frame.
    Text(String),
    /// Send a close frame and stop writing.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Something that happened on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A text frame arrived.
    Text(String),
    /// The transport reported an error. A [`SocketEvent::Closed`]
    /// follows if the error ended the socket.
    Error(String),
    /// The socket is gone.
    Closed(CloseInfo),
}

/// An open socket, as seen by the client.
#[derive(Debug)]
pub struct Socket {
    /// Outbound messages for the writer.
    pub outbound: mpsc::Sender<OutboundMessage>,
    /// Events from the reader.
    pub inbound: mpsc::Receiver<SocketEvent>,
}

/// Opens sockets to the gateway.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Establish a socket to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket could not be opened.
    async fn open(&self, url: &str) -> GatewayResult<Socket>;
}

// ── WebSocket Transport ──────────────────────────────────────

/// [`Transport`] over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    /// Create a new transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> GatewayResult<Socket> {
        let (ws, _response) = connect_async(url).await?;
        let (writer, reader) = ws.split();

        let (outbound_tx, outbound_rx) = mpsc::channel(SOCKET_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(SOCKET_CHANNEL_CAPACITY);

        tokio::spawn(write_loop(writer, outbound_rx));
        tokio::spawn(read_loop(reader, inbound_tx));

        Ok(Socket {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// Drain outbound messages into the socket until the client drops the
/// sender or asks for a close.
async fn write_loop(
    mut writer: SplitSink<WsStream, Message>,
    mut outbound_rx: mpsc::Receiver<OutboundMessage>,
) {
    while let Some(message) = outbound_rx.recv().await {
        let result = match message {
            OutboundMessage::Text(text) => writer.send(Message::Text(text.into())).await,
            OutboundMessage::Close { code, reason } => {
                let frame = CloseFrame {
                    code: code.into(),
                    reason: reason.into(),
                };
                if let Err(e) = writer.send(Message::Close(Some(frame))).await {
                    debug!(error = %e, "Writer task: close failed");
                }
                return;
            },
        };
        if let Err(e) = result {
            debug!(error = %e, "Writer task: send failed");
            return;
        }
    }
}

/// Translate socket messages into [`SocketEvent`]s. Always ends with a
/// `Closed` event unless the client stopped listening first.
async fn read_loop(mut reader: SplitStream<WsStream>, inbound_tx: mpsc::Sender<SocketEvent>) {
    loop {
        let next = tokio::select! {
            () = inbound_tx.closed() => return,
            next = reader.next() => next,
        };

        let event = match next {
            Some(Ok(Message::Text(text))) => SocketEvent::Text(text.as_str().to_owned()),
            Some(Ok(Message::Close(frame))) => {
                let info = frame.map_or_else(
                    || CloseInfo {
                        code: CLOSE_NORMAL,
                        reason: String::new(),
                        clean: true,
                    },
                    |f| CloseInfo {
                        code: f.code.into(),
                        reason: f.reason.as_str().to_owned(),
                        clean: true,
                    },
                );
                let _ = inbound_tx.send(SocketEvent::Closed(info)).await;
                return;
            },
            Some(Ok(Message::Binary(bytes))) => {
                trace!(len = bytes.len(), "Skipping binary frame");
                continue;
            },
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
            Some(Err(e)) => {
                let message = e.to_string();
                let _ = inbound_tx.send(SocketEvent::Error(message.clone())).await;
                let _ = inbound_tx
                    .send(SocketEvent::Closed(CloseInfo::abnormal(message)))
                    .await;
                return;
            },
            None => {
                let _ = inbound_tx
                    .send(SocketEvent::Closed(CloseInfo::abnormal("stream ended")))
                    .await;
                return;
            },
        };

        if inbound_tx.send(event).await.is_err() {
            return;
        }
    }
}
