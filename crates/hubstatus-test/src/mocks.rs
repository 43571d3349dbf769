//! Mock transport for driving the gateway client without a network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use hubstatus_gateway::{
    CloseInfo, GatewayError, GatewayResult, OutboundMessage, Socket, SocketEvent, Transport,
};

/// Capacity of the mock socket channels.
const MOCK_CHANNEL_CAPACITY: usize = 64;

/// How long [`MockGateway::accept`] waits before giving up.
const ACCEPT_TIMEOUT: Duration = Duration::from_secs(30);

/// What the next open should do.
enum OpenScript {
    Refuse(String),
    Hold(oneshot::Receiver<()>),
}

/// Shared bookkeeping between the transport and the gateway side.
#[derive(Default)]
struct MockState {
    scripts: VecDeque<OpenScript>,
    urls: Vec<String>,
}

/// Mock implementation of [`Transport`].
///
/// Every successful open hands a [`MockPeer`] to the paired
/// [`MockGateway`]; the test plays the server through it.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    peers: mpsc::UnboundedSender<MockPeer>,
}

impl MockTransport {
    /// Create a transport and the gateway side that receives its sockets.
    #[must_use]
    pub fn pair() -> (Self, MockGateway) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let transport = Self {
            state: Arc::clone(&state),
            peers: peers_tx,
        };
        let gateway = MockGateway {
            state,
            peers: peers_rx,
        };
        (transport, gateway)
    }

    fn next_script(&self) -> Option<OpenScript> {
        self.state
            .lock()
            .ok()
            .and_then(|mut guard| guard.scripts.pop_front())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, url: &str) -> GatewayResult<Socket> {
        if let Ok(mut guard) = self.state.lock() {
            guard.urls.push(url.to_string());
        }

        match self.next_script() {
            Some(OpenScript::Refuse(reason)) => return Err(GatewayError::Connect(reason)),
            Some(OpenScript::Hold(release)) => {
                if release.await.is_err() {
                    return Err(GatewayError::Connect("held open was abandoned".into()));
                }
            },
            None => {},
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(MOCK_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(MOCK_CHANNEL_CAPACITY);

        let peer = MockPeer {
            outbound: outbound_rx,
            inbound: inbound_tx,
        };
        self.peers
            .send(peer)
            .map_err(|_| GatewayError::Connect("mock gateway dropped".into()))?;

        Ok(Socket {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// Server side of a [`MockTransport`].
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
    peers: mpsc::UnboundedReceiver<MockPeer>,
}

impl MockGateway {
    /// Make the next open fail.
    pub fn refuse_next(&self, reason: impl Into<String>) {
        if let Ok(mut guard) = self.state.lock() {
            guard.scripts.push_back(OpenScript::Refuse(reason.into()));
        }
    }

    /// Keep the next open pending until the returned sender fires.
    /// Dropping the sender makes the open fail.
    #[must_use]
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (release_tx, release_rx) = oneshot::channel();
        if let Ok(mut guard) = self.state.lock() {
            guard.scripts.push_back(OpenScript::Hold(release_rx));
        }
        release_tx
    }

    /// Number of open attempts so far, successful or not.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.state.lock().map(|guard| guard.urls.len()).unwrap_or(0)
    }

    /// URLs passed to each open attempt.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|guard| guard.urls.clone())
            .unwrap_or_default()
    }

    /// Wait for the next socket to open.
    ///
    /// # Panics
    ///
    /// Panics if no socket opens within 30 seconds (virtual time under a
    /// paused clock).
    pub async fn accept(&mut self) -> MockPeer {
        match tokio::time::timeout(ACCEPT_TIMEOUT, self.peers.recv()).await {
            Ok(Some(peer)) => peer,
            Ok(None) => panic!("mock transport dropped"),
            Err(_) => panic!("no socket opened within {ACCEPT_TIMEOUT:?}"),
        }
    }

    /// The next opened socket, if one is already waiting.
    pub fn try_accept(&mut self) -> Option<MockPeer> {
        self.peers.try_recv().ok()
    }
}

/// Something the client put on a mock socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Captured {
    /// A gateway frame, parsed as JSON.
    Frame(Value),
    /// A close request.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// The server end of one mock socket.
pub struct MockPeer {
    outbound: mpsc::Receiver<OutboundMessage>,
    inbound: mpsc::Sender<SocketEvent>,
}

impl MockPeer {
    /// Deliver a raw text frame to the client.
    pub async fn send_text(&self, text: impl Into<String>) {
        let _ = self.inbound.send(SocketEvent::Text(text.into())).await;
    }

    /// Deliver a JSON frame to the client.
    pub async fn send_json(&self, frame: &Value) {
        self.send_text(frame.to_string()).await;
    }

    /// Deliver Hello (`op=10`) with the given interval.
    pub async fn hello(&self, heartbeat_interval_ms: u64) {
        self.send_json(&crate::fixtures::hello_frame(heartbeat_interval_ms))
            .await;
    }

    /// Deliver a heartbeat request (`op=1`).
    pub async fn heartbeat_request(&self) {
        self.send_json(&crate::fixtures::heartbeat_request_frame())
            .await;
    }

    /// Deliver a dispatch (`op=0`) with sequence number `seq`.
    pub async fn dispatch(&self, seq: u64, event: &str) {
        self.send_json(&crate::fixtures::dispatch_frame(seq, event))
            .await;
    }

    /// Report a transport error without closing.
    pub async fn error(&self, message: impl Into<String>) {
        let _ = self.inbound.send(SocketEvent::Error(message.into())).await;
    }

    /// Close the socket cleanly from the server side.
    pub async fn close(&self, code: u16, reason: impl Into<String>) {
        let info = CloseInfo {
            code,
            reason: reason.into(),
            clean: true,
        };
        let _ = self.inbound.send(SocketEvent::Closed(info)).await;
    }

    /// Drop the socket without a close handshake. The writer side goes
    /// away with it, so later sends from the client fail.
    pub async fn drop_connection(self) {
        let _ = self
            .inbound
            .send(SocketEvent::Closed(CloseInfo::abnormal("connection reset")))
            .await;
    }

    /// Wait for the next outbound message.
    ///
    /// # Panics
    ///
    /// Panics if the client dropped the socket or sent a frame that is
    /// not valid JSON.
    pub async fn next_captured(&mut self) -> Captured {
        match self.outbound.recv().await {
            Some(message) => capture(message),
            None => panic!("client dropped the socket"),
        }
    }

    /// Wait for the next outbound gateway frame.
    ///
    /// # Panics
    ///
    /// Panics if the next message is a close instead of a frame.
    pub async fn next_frame(&mut self) -> Value {
        match self.next_captured().await {
            Captured::Frame(frame) => frame,
            Captured::Close { code, reason } => {
                panic!("expected a frame, got close {code} {reason:?}")
            },
        }
    }

    /// The next outbound message, if one is already queued.
    pub fn try_next(&mut self) -> Option<Captured> {
        self.outbound.try_recv().ok().map(capture)
    }

    /// Every outbound message queued so far.
    pub fn drain(&mut self) -> Vec<Captured> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Every outbound frame queued so far, skipping closes.
    pub fn drain_frames(&mut self) -> Vec<Value> {
        self.drain()
            .into_iter()
            .filter_map(|captured| match captured {
                Captured::Frame(frame) => Some(frame),
                Captured::Close { .. } => None,
            })
            .collect()
    }

    /// Whether the client has let go of this socket.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inbound.is_closed()
    }
}

fn capture(message: OutboundMessage) -> Captured {
    match message {
        OutboundMessage::Text(text) => match serde_json::from_str(&text) {
            Ok(frame) => Captured::Frame(frame),
            Err(e) => panic!("client sent invalid JSON ({e}): {text}"),
        },
        OutboundMessage::Close { code, reason } => Captured::Close { code, reason },
    }
}
