//! Error types for the gateway client.

/// Errors produced while talking to the gateway.
///
/// None of these ever reach a caller of
/// [`GatewayHandle::request_presence`](crate::GatewayHandle::request_presence);
/// inside the client they are logged and published on the status channel.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// `WebSocket` transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A frame parsed but its payload had the wrong shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A frame carried an opcode this client does not know.
    #[error("Unknown Gateway opcode: {0}")]
    UnknownOpcode(u8),

    /// The transport could not establish a socket.
    #[error("Failed to open Gateway socket: {0}")]
    Connect(String),

    /// The client task has already shut down.
    #[error("Gateway client has stopped")]
    Stopped,
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
