//! Gateway client actor.
//!
//! A single task owns the connection, the session, the presence intent
//! and both timers. Everything that can happen (a presence request, a
//! socket opening, an inbound frame, a heartbeat tick, a retry coming
//! due) arrives on a channel and is handled to completion before the
//! next event is looked at. No state is shared, so nothing is locked.
//!
//! # Lifecycle
//!
//! ```text
//! Closed --request--> Connecting --socket open / Identify--> Open
//!   ^                     |                                  |
//!   |                 open failed                       disconnect()
//!   |                     v                                  v
//!   +------------------ Closed <------ socket closed ---- Closing
//! ```
//!
//! Loss of an open socket always returns to `Closed` and discards the
//! session. There is no automatic reconnect; the next presence request
//! that needs the wire opens a fresh connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::connection::{
    CLOSE_NORMAL, CloseInfo, ConnectionState, OutboundMessage, Socket, SocketEvent, Transport,
};
use crate::credential::CredentialProvider;
use crate::error::{GatewayError, GatewayResult};
use crate::heartbeat::{HeartbeatScheduler, HeartbeatTick};
use crate::presence::{
    self, Action, DEFAULT_RETRY_DELAY, Decision, IgnoreReason, PresenceIntent, RetryFired,
    RetryTimer,
};
use crate::protocol::{
    self, ClientProperties, DEFAULT_GATEWAY_URL, GatewayPayload, HelloPayload, InboundFrame,
    PresenceProfile,
};

/// Capacity of the status broadcast channel.
const STATUS_CHANNEL_CAPACITY: usize = 32;

// ── Configuration ────────────────────────────────────────────

/// Configuration for the gateway client.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway endpoint, including version and encoding parameters.
    pub url: String,
    /// Delay before a request made mid-transition is re-evaluated.
    pub retry_delay: Duration,
    /// Client identification sent with Identify.
    pub properties: ClientProperties,
    /// Fixed activity metadata.
    pub profile: PresenceProfile,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GATEWAY_URL.to_string(),
            retry_delay: DEFAULT_RETRY_DELAY,
            properties: ClientProperties::default(),
            profile: PresenceProfile::default(),
        }
    }
}

// ── Status ───────────────────────────────────────────────────

/// Connection lifecycle notifications published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    /// A socket is being opened.
    Connecting,
    /// The socket opened and Identify was sent.
    Open,
    /// A local close was requested.
    Closing,
    /// The transport reported an error.
    TransportError(String),
    /// The socket is gone.
    Closed(CloseInfo),
}

// ── Handle ───────────────────────────────────────────────────

enum Command {
    RequestPresence(Option<String>),
    Disconnect,
    Shutdown,
}

/// Cloneable handle to a running [`GatewayClient`].
#[derive(Clone)]
pub struct GatewayHandle {
    commands: mpsc::UnboundedSender<Command>,
    status_tx: broadcast::Sender<GatewayStatus>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl GatewayHandle {
    /// Ask for `status` to be advertised. `None` clears the activity.
    ///
    /// Never fails: the outcome is reported through logs and
    /// [`subscribe`](Self::subscribe). A request made after the client
    /// stopped is logged and dropped.
    pub fn request_presence(&self, status: Option<String>) {
        if self
            .commands
            .send(Command::RequestPresence(status))
            .is_err()
        {
            debug!("Gateway client stopped; presence request dropped");
        }
    }

    /// Close the current connection, if open.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Stopped`] if the client task has ended.
    pub fn disconnect(&self) -> GatewayResult<()> {
        self.commands
            .send(Command::Disconnect)
            .map_err(|_| GatewayError::Stopped)
    }

    /// Stop the client: cancel timers, close the socket, end the task.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Stopped`] if the client task has already
    /// ended.
    pub fn shutdown(&self) -> GatewayResult<()> {
        self.commands
            .send(Command::Shutdown)
            .map_err(|_| GatewayError::Stopped)
    }

    /// Subscribe to lifecycle notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayStatus> {
        self.status_tx.subscribe()
    }

    /// Current connection state as last published by the client.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Whether the client task is still accepting commands.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

// ── Client State ─────────────────────────────────────────────

/// Per-connection protocol state. Reset whenever the socket closes.
#[derive(Debug, Default)]
struct Session {
    /// Most recent `s` seen on an inbound frame.
    last_sequence: Option<u64>,
    /// Cadence announced by Hello.
    heartbeat_interval: Option<Duration>,
}

/// The live socket.
struct Link {
    outbound: mpsc::Sender<OutboundMessage>,
    inbound: mpsc::Receiver<SocketEvent>,
}

/// A socket open in flight.
struct PendingConnect {
    generation: u64,
    /// Status that Identify will carry.
    status: Option<String>,
    task: JoinHandle<()>,
}

/// Result of a connect task.
struct ConnectOutcome {
    generation: u64,
    result: GatewayResult<Socket>,
}

// ── Client ───────────────────────────────────────────────────

/// The gateway connection actor.
///
/// Created with [`GatewayClient::new`] and driven by [`run`](Self::run),
/// usually through [`GatewayClient::spawn`].
pub struct GatewayClient {
    config: GatewayConfig,
    transport: Arc<dyn Transport>,
    credentials: Box<dyn CredentialProvider>,

    state: ConnectionState,
    intent: PresenceIntent,
    session: Session,
    link: Option<Link>,
    connecting: Option<PendingConnect>,
    generation: u64,

    retry: RetryTimer,
    heartbeat: HeartbeatScheduler,

    commands_rx: mpsc::UnboundedReceiver<Command>,
    connect_tx: mpsc::UnboundedSender<ConnectOutcome>,
    connect_rx: mpsc::UnboundedReceiver<ConnectOutcome>,
    retry_tx: mpsc::UnboundedSender<RetryFired>,
    retry_rx: mpsc::UnboundedReceiver<RetryFired>,
    tick_tx: mpsc::UnboundedSender<HeartbeatTick>,
    tick_rx: mpsc::UnboundedReceiver<HeartbeatTick>,
    status_tx: broadcast::Sender<GatewayStatus>,
    state_tx: watch::Sender<ConnectionState>,
}

impl GatewayClient {
    /// Create a client and its handle. Nothing connects until a
    /// presence request needs the wire.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        transport: Arc<dyn Transport>,
        credentials: Box<dyn CredentialProvider>,
    ) -> (Self, GatewayHandle) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (connect_tx, connect_rx) = mpsc::unbounded_channel();
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Closed);

        let handle = GatewayHandle {
            commands: commands_tx,
            status_tx: status_tx.clone(),
            state_rx,
        };

        let client = Self {
            config,
            transport,
            credentials,
            state: ConnectionState::Closed,
            intent: PresenceIntent::new(),
            session: Session::default(),
            link: None,
            connecting: None,
            generation: 0,
            retry: RetryTimer::new(),
            heartbeat: HeartbeatScheduler::new(),
            commands_rx,
            connect_tx,
            connect_rx,
            retry_tx,
            retry_rx,
            tick_tx,
            tick_rx,
            status_tx,
            state_tx,
        };

        (client, handle)
    }

    /// Create a client and run it on a new task.
    #[must_use]
    pub fn spawn(
        config: GatewayConfig,
        transport: Arc<dyn Transport>,
        credentials: Box<dyn CredentialProvider>,
    ) -> (GatewayHandle, JoinHandle<()>) {
        let (client, handle) = Self::new(config, transport, credentials);
        let task = tokio::spawn(client.run());
        (handle, task)
    }

    /// Run the event loop until shutdown is requested or every handle
    /// is dropped.
    pub async fn run(mut self) {
        info!(url = %self.config.url, "Gateway client started");

        loop {
            tokio::select! {
                biased;

                // Socket state first, so a request never acts on a socket
                // whose close is already queued.
                event = next_socket_event(&mut self.link) => self.on_socket_event(event).await,

                command = self.commands_rx.recv() => match command {
                    Some(Command::RequestPresence(status)) => self.handle_request(status).await,
                    Some(Command::Disconnect) => self.disconnect().await,
                    Some(Command::Shutdown) => {
                        info!("Gateway client received shutdown request");
                        break;
                    },
                    None => {
                        debug!("All gateway handles dropped");
                        break;
                    },
                },

                Some(outcome) = self.connect_rx.recv() => self.on_connect_outcome(outcome).await,

                Some(fired) = self.retry_rx.recv() => self.on_retry(fired).await,

                Some(tick) = self.tick_rx.recv() => self.on_heartbeat_tick(tick).await,
            }
        }

        self.shutdown();
        info!("Gateway client stopped");
    }

    // ── Presence ─────────────────────────────────────────────

    async fn handle_request(&mut self, status: Option<String>) {
        // A newer request always supersedes a pending retry.
        self.retry.cancel();
        let has_credential = self.credentials.credential().is_some();
        match presence::decide(&self.intent, status.as_deref(), has_credential, self.state) {
            Decision::Ignore(IgnoreReason::AlreadyTransmitted) => {
                trace!(status = ?status, "Presence already transmitted");
            },
            Decision::Ignore(IgnoreReason::CredentialUnavailable) => {
                debug!(status = ?status, "No credential available; presence request dropped");
            },
            Decision::Act(action) => {
                self.intent.record_desired(status.clone());
                match action {
                    Action::SendNow => self.send_presence_update(status).await,
                    Action::ScheduleRetry => {
                        debug!(
                            state = %self.state,
                            delay_ms = self.config.retry_delay.as_millis(),
                            "Connection in transition; presence request deferred"
                        );
                        self.retry
                            .schedule(self.config.retry_delay, status, self.retry_tx.clone());
                    },
                    Action::Connect => self.open_connection(status),
                }
            },
        }
    }

    async fn on_retry(&mut self, fired: RetryFired) {
        if !self.retry.take_if_current(&fired) {
            trace!(ticket = fired.ticket, "Stale presence retry ignored");
            return;
        }
        self.handle_request(fired.status).await;
    }

    async fn send_presence_update(&mut self, status: Option<String>) {
        let frame = protocol::build_presence_update(&self.config.profile, status.as_deref());
        if self.send(&frame).await {
            info!(status = ?status, "Presence updated");
            self.intent.mark_transmitted(status);
        }
    }

    // ── Connection Lifecycle ─────────────────────────────────

    fn open_connection(&mut self, status: Option<String>) {
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let transport = Arc::clone(&self.transport);
        let url = self.config.url.clone();
        let outcomes = self.connect_tx.clone();

        info!(url = %url, generation, "Connecting to gateway");
        let task = tokio::spawn(async move {
            let result = transport.open(&url).await;
            let _ = outcomes.send(ConnectOutcome { generation, result });
        });

        self.connecting = Some(PendingConnect {
            generation,
            status,
            task,
        });
        self.set_state(ConnectionState::Connecting);
        self.publish(GatewayStatus::Connecting);
    }

    async fn on_connect_outcome(&mut self, outcome: ConnectOutcome) {
        let pending = match self.connecting.take() {
            Some(pending) if pending.generation == outcome.generation => pending,
            other => {
                self.connecting = other;
                trace!(
                    generation = outcome.generation,
                    "Stale connect outcome ignored"
                );
                return;
            },
        };

        match outcome.result {
            Ok(socket) => self.on_socket_open(socket, pending.status).await,
            Err(e) => {
                warn!(error = %e, generation = pending.generation, "Gateway socket failed to open");
                self.publish(GatewayStatus::TransportError(e.to_string()));
                self.on_socket_close(CloseInfo::abnormal(e.to_string()));
            },
        }
    }

    async fn on_socket_open(&mut self, socket: Socket, status: Option<String>) {
        let Socket { outbound, inbound } = socket;
        self.link = Some(Link { outbound, inbound });

        let Some(token) = self.credentials.credential() else {
            warn!("Credential unavailable at socket open; closing");
            self.begin_close("credential unavailable").await;
            return;
        };

        self.set_state(ConnectionState::Open);
        self.publish(GatewayStatus::Open);
        info!(status = ?status, "Gateway socket open; identifying");

        let identify = protocol::build_identify(
            &token,
            &self.config.properties,
            &self.config.profile,
            status.as_deref(),
        );
        if self.send(&identify).await {
            self.intent.mark_transmitted(status);
        }
    }

    async fn disconnect(&mut self) {
        match self.state {
            ConnectionState::Open => {
                info!("Disconnecting from gateway");
                self.begin_close("").await;
            },
            ConnectionState::Connecting => {
                if let Some(pending) = self.connecting.take() {
                    pending.task.abort();
                    debug!(generation = pending.generation, "Pending connect abandoned");
                }
                self.on_socket_close(CloseInfo {
                    code: CLOSE_NORMAL,
                    reason: "disconnected before open".to_string(),
                    clean: true,
                });
            },
            ConnectionState::Closed | ConnectionState::Closing => {
                debug!(state = %self.state, "Disconnect ignored");
            },
        }
    }

    /// Send a normal close and wait in `Closing` for the transport to
    /// confirm it.
    async fn begin_close(&mut self, reason: &str) {
        self.heartbeat.cancel();
        self.set_state(ConnectionState::Closing);
        self.publish(GatewayStatus::Closing);

        if let Some(link) = &self.link {
            let close = OutboundMessage::Close {
                code: CLOSE_NORMAL,
                reason: reason.to_string(),
            };
            if link.outbound.send(close).await.is_err() {
                debug!("Socket writer gone before close was sent");
            }
        }
    }

    fn on_socket_close(&mut self, info: CloseInfo) {
        self.heartbeat.cancel();
        self.link = None;
        self.session = Session::default();
        self.set_state(ConnectionState::Closed);

        if info.clean {
            info!(
                code = info.code,
                reason = %info.reason,
                clean = info.clean,
                "Gateway connection closed"
            );
        } else {
            warn!(
                code = info.code,
                reason = %info.reason,
                clean = info.clean,
                "Gateway connection lost"
            );
        }
        self.publish(GatewayStatus::Closed(info));
    }

    fn shutdown(&mut self) {
        if self.retry.is_pending() {
            debug!(desired = ?self.intent.desired(), "Pending presence retry discarded");
        }
        self.retry.cancel();
        self.heartbeat.cancel();

        if let Some(pending) = self.connecting.take() {
            pending.task.abort();
        }

        if let Some(link) = self.link.take() {
            let close = OutboundMessage::Close {
                code: CLOSE_NORMAL,
                reason: "client shutdown".to_string(),
            };
            if link.outbound.try_send(close).is_err() {
                debug!("Could not queue close frame during shutdown");
            }
        }

        self.session = Session::default();
        self.set_state(ConnectionState::Closed);
    }

    // ── Socket Events ────────────────────────────────────────

    async fn on_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Text(text) => self.handle_text(&text).await,
            SocketEvent::Error(message) => {
                warn!(error = %message, "Gateway socket error");
                self.publish(GatewayStatus::TransportError(message));
            },
            SocketEvent::Closed(info) => self.on_socket_close(info),
        }
    }

    async fn handle_text(&mut self, text: &str) {
        let payload = match protocol::decode(text) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to parse Gateway payload");
                return;
            },
        };

        self.session.last_sequence = payload.s;

        match payload.classify() {
            Ok(InboundFrame::Hello(hello)) => self.on_hello(hello).await,
            Ok(InboundFrame::HeartbeatRequest) => {
                debug!("Server requested heartbeat (op=1)");
                self.send_heartbeat().await;
            },
            Ok(InboundFrame::HeartbeatAck) => trace!("Heartbeat acknowledged"),
            Ok(InboundFrame::Dispatch { event }) => {
                trace!(
                    event = event.as_deref().unwrap_or(""),
                    seq = ?payload.s,
                    "Ignoring Gateway dispatch"
                );
            },
            Ok(InboundFrame::Reconnect) => debug!("Server requested reconnect (op=7); ignored"),
            Ok(InboundFrame::InvalidSession { resumable }) => {
                debug!(resumable, "Invalid session (op=9); ignored");
            },
            Err(GatewayError::UnknownOpcode(op)) => debug!(op, "Unknown Gateway opcode"),
            Err(e) => warn!(error = %e, op = payload.op, "Malformed Gateway payload"),
        }
    }

    async fn on_hello(&mut self, hello: HelloPayload) {
        let interval = Duration::from_millis(hello.heartbeat_interval);
        info!(
            interval_ms = hello.heartbeat_interval,
            "Received Hello, starting heartbeat"
        );
        self.session.heartbeat_interval = Some(interval);
        self.heartbeat.start(interval, self.tick_tx.clone());

        if !self.intent.has_transmitted() {
            let desired = self.intent.desired().map(str::to_owned);
            self.send_presence_update(desired).await;
        }
    }

    async fn on_heartbeat_tick(&mut self, tick: HeartbeatTick) {
        if !self.heartbeat.is_current(tick) {
            trace!(
                epoch = tick.epoch,
                running = ?self.heartbeat.interval(),
                "Stale heartbeat tick ignored"
            );
            return;
        }
        if self.state != ConnectionState::Open {
            trace!(state = %self.state, "Heartbeat tick outside open state ignored");
            return;
        }
        self.send_heartbeat().await;
    }

    async fn send_heartbeat(&mut self) {
        let seq = self.session.last_sequence;
        let frame = protocol::build_heartbeat(seq);
        if self.send(&frame).await {
            trace!(
                seq = ?seq,
                interval_ms = ?self.session.heartbeat_interval.map(|i| i.as_millis()),
                "Heartbeat sent"
            );
        }
    }

    // ── Plumbing ─────────────────────────────────────────────

    /// Serialize and queue a frame. Returns whether it reached the
    /// socket writer.
    async fn send(&self, payload: &GatewayPayload) -> bool {
        let Some(link) = &self.link else {
            debug!(op = payload.op, "No socket; frame dropped");
            return false;
        };

        let text = match serde_json::to_string(payload) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, op = payload.op, "Failed to serialize Gateway payload");
                return false;
            },
        };

        if link.outbound.send(OutboundMessage::Text(text)).await.is_err() {
            debug!(op = payload.op, "Socket writer gone; frame dropped");
            return false;
        }
        trace!(op = payload.op, "Frame queued");
        true
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            trace!(from = %self.state, to = %state, "Connection state changed");
        }
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn publish(&self, status: GatewayStatus) {
        // No subscribers is fine.
        let _ = self.status_tx.send(status);
    }
}

/// Next event from the live socket. Pends forever when there is none.
async fn next_socket_event(link: &mut Option<Link>) -> SocketEvent {
    match link {
        Some(link) => link
            .inbound
            .recv()
            .await
            .unwrap_or_else(|| SocketEvent::Closed(CloseInfo::abnormal("socket reader dropped"))),
        None => std::future::pending().await,
    }
}
