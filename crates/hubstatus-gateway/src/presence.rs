//! Presence reconciliation policy.
//!
//! Compares a requested status with what was last put on the wire and
//! with the connection state, and decides what the client does next.
//! The decision is a pure function; the client loop carries it out.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::connection::ConnectionState;

/// Delay before a request made mid-transition is re-evaluated.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// What has been transmitted so far.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Transmitted {
    /// Nothing has ever been sent.
    #[default]
    Unset,
    /// The last status sent via Identify or Presence-Update.
    Sent(Option<String>),
}

/// Desired and last-transmitted presence.
#[derive(Debug, Clone, Default)]
pub struct PresenceIntent {
    desired: Option<String>,
    last_transmitted: Transmitted,
}

impl PresenceIntent {
    /// Fresh intent: no activity desired, nothing transmitted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `status` is what the peer already has.
    ///
    /// Before anything is sent, the peer is treated as showing no
    /// activity, so requesting "no activity" is a no-op.
    #[must_use]
    pub fn is_transmitted(&self, status: Option<&str>) -> bool {
        match &self.last_transmitted {
            Transmitted::Unset => status.is_none(),
            Transmitted::Sent(sent) => sent.as_deref() == status,
        }
    }

    /// Whether any presence frame has been sent.
    #[must_use]
    pub fn has_transmitted(&self) -> bool {
        matches!(self.last_transmitted, Transmitted::Sent(_))
    }

    /// The most recently requested status.
    #[must_use]
    pub fn desired(&self) -> Option<&str> {
        self.desired.as_deref()
    }

    /// The last transmitted status.
    #[must_use]
    pub fn last_transmitted(&self) -> &Transmitted {
        &self.last_transmitted
    }

    /// Record a request that passed the idempotence and credential checks.
    pub fn record_desired(&mut self, status: Option<String>) {
        self.desired = status;
    }

    /// Record a successful transmission.
    pub fn mark_transmitted(&mut self, status: Option<String>) {
        self.last_transmitted = Transmitted::Sent(status);
    }
}

/// Why a request was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The requested status is already on the wire.
    AlreadyTransmitted,
    /// No credential is available.
    CredentialUnavailable,
}

/// What to do with a request that was not dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Send a Presence-Update on the open socket.
    SendNow,
    /// Re-evaluate the request after the retry delay.
    ScheduleRetry,
    /// Open a new connection; Identify carries the status.
    Connect,
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Drop the request.
    Ignore(IgnoreReason),
    /// Act on the request.
    Act(Action),
}

/// Decide how to handle a presence request.
#[must_use]
pub fn decide(
    intent: &PresenceIntent,
    status: Option<&str>,
    has_credential: bool,
    state: ConnectionState,
) -> Decision {
    if intent.is_transmitted(status) {
        return Decision::Ignore(IgnoreReason::AlreadyTransmitted);
    }
    if !has_credential {
        return Decision::Ignore(IgnoreReason::CredentialUnavailable);
    }
    match state {
        ConnectionState::Open => Decision::Act(Action::SendNow),
        ConnectionState::Connecting | ConnectionState::Closing => {
            Decision::Act(Action::ScheduleRetry)
        },
        ConnectionState::Closed => Decision::Act(Action::Connect),
    }
}

// ── Retry Timer ──────────────────────────────────────────────

/// A retry that came due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RetryFired {
    pub(crate) ticket: u64,
    pub(crate) status: Option<String>,
}

/// At most one pending re-evaluation of a presence request.
pub(crate) struct RetryTimer {
    pending: Option<(u64, JoinHandle<()>)>,
    next_ticket: u64,
}

impl RetryTimer {
    pub(crate) fn new() -> Self {
        Self {
            pending: None,
            next_ticket: 0,
        }
    }

    /// Schedule `status` to be re-requested after `delay`, replacing any
    /// pending retry.
    pub(crate) fn schedule(
        &mut self,
        delay: Duration,
        status: Option<String>,
        fired: mpsc::UnboundedSender<RetryFired>,
    ) {
        self.cancel();
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fired.send(RetryFired { ticket, status });
        });
        self.pending = Some((ticket, task));
    }

    pub(crate) fn cancel(&mut self) {
        if let Some((ticket, task)) = self.pending.take() {
            task.abort();
            trace!(ticket, "Pending presence retry cancelled");
        }
    }

    /// Consume the pending retry if `fired` belongs to it.
    pub(crate) fn take_if_current(&mut self, fired: &RetryFired) -> bool {
        match &self.pending {
            Some((ticket, _)) if *ticket == fired.ticket => {
                self.pending = None;
                true
            },
            _ => false,
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
