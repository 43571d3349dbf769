//! Hubstatus Gateway - presence client for the Discord real-time gateway.
//!
//! Keeps a user's advertised activity in sync with what they are doing.
//! Callers push the desired status through a [`GatewayHandle`]; the client
//! decides whether that needs a new connection, a Presence-Update on the
//! open socket, a deferred retry, or nothing at all.
//!
//! # Architecture
//!
//! ```text
//! hubstatus-gateway
//! ├── client      GatewayClient actor + GatewayHandle
//! │   ├── presence    request policy + retry timer
//! │   ├── heartbeat   Hello-driven heartbeat ticker
//! │   └── protocol    frame codec (Identify, Presence-Update, Heartbeat)
//! ├── connection  Transport seam + tokio-tungstenite socket
//! ├── credential  read-only token access
//! └── activity    open-resource tracking -> desired status
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hubstatus_gateway::{GatewayClient, GatewayConfig, WsTransport};
//!
//! let (handle, task) = GatewayClient::spawn(
//!     GatewayConfig::default(),
//!     Arc::new(WsTransport::new()),
//!     Box::new(Some("token".to_string())),
//! );
//! handle.request_presence(Some("Hubs by Mozilla".into()));
//! handle.shutdown()?;
//! task.await?;
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod activity;
pub mod client;
pub mod connection;
pub mod credential;
pub mod error;
mod heartbeat;
pub mod presence;
pub mod protocol;

pub use activity::{ActivityObserver, PresenceSink, TrackedHosts};
pub use client::{GatewayClient, GatewayConfig, GatewayHandle, GatewayStatus};
pub use connection::{
    CloseInfo, ConnectionState, OutboundMessage, Socket, SocketEvent, Transport, WsTransport,
};
pub use credential::{CredentialProvider, parse_stored_token};
pub use error::{GatewayError, GatewayResult};
pub use protocol::{ClientProperties, PresenceProfile};
