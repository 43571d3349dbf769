//! Activity observation.
//!
//! [`TrackedHosts`] keeps the set of open resources (tabs, windows,
//! anything with a URL) and derives the desired status from them.
//! [`ActivityObserver`] forwards the derived status to a
//! [`PresenceSink`] whenever it changes.

use std::collections::HashMap;

use tracing::debug;

use crate::client::GatewayHandle;

/// Receives desired-status changes.
pub trait PresenceSink {
    /// Ask for `status` to be advertised. `None` means no activity.
    fn request_presence(&self, status: Option<String>);
}

impl PresenceSink for GatewayHandle {
    fn request_presence(&self, status: Option<String>) {
        GatewayHandle::request_presence(self, status);
    }
}

/// Open resources and the hosts that count as "doing the activity".
#[derive(Debug, Clone)]
pub struct TrackedHosts {
    label: String,
    hosts: Vec<String>,
    open: HashMap<String, Option<String>>,
}

impl TrackedHosts {
    /// Track `hosts`; while any is open the status is `label`.
    #[must_use]
    pub fn new(label: impl Into<String>, hosts: Vec<String>) -> Self {
        Self {
            label: label.into(),
            hosts: hosts
                .into_iter()
                .map(|host| host.to_ascii_lowercase())
                .collect(),
            open: HashMap::new(),
        }
    }

    /// Record that resource `id` now shows `url`.
    pub fn open(&mut self, id: impl Into<String>, url: &str) {
        self.open.insert(id.into(), host_of(url));
    }

    /// Forget resource `id`. Returns `false` if it was not tracked.
    pub fn close(&mut self, id: &str) -> bool {
        self.open.remove(id).is_some()
    }

    /// Number of tracked resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.open.len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Whether any open resource is on a tracked host.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.open
            .values()
            .flatten()
            .any(|host| self.hosts.iter().any(|tracked| tracked == host))
    }

    /// Status derived from the open resources.
    #[must_use]
    pub fn desired(&self) -> Option<String> {
        self.is_active().then(|| self.label.clone())
    }
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
}

/// Derives the desired status and reports changes to a sink.
pub struct ActivityObserver<S> {
    tracked: TrackedHosts,
    manual: Option<String>,
    reported: Option<Option<String>>,
    sink: S,
}

impl<S: PresenceSink> ActivityObserver<S> {
    /// Create an observer. Nothing is reported until the first change.
    pub fn new(tracked: TrackedHosts, sink: S) -> Self {
        Self {
            tracked,
            manual: None,
            reported: None,
            sink,
        }
    }

    /// A resource was created or navigated.
    pub fn opened(&mut self, id: impl Into<String>, url: &str) {
        self.tracked.open(id, url);
        self.refresh();
    }

    /// A resource went away.
    pub fn closed(&mut self, id: &str) {
        if self.tracked.close(id) {
            self.refresh();
        }
    }

    /// Resource `old` was replaced by `new` showing `url`.
    pub fn replaced(&mut self, old: &str, new: impl Into<String>, url: &str) {
        self.tracked.close(old);
        self.tracked.open(new, url);
        self.refresh();
    }

    /// Force a status regardless of open resources; `None` returns to
    /// the derived status.
    pub fn set_manual(&mut self, status: Option<String>) {
        self.manual = status;
        self.refresh();
    }

    /// Status the observer currently wants.
    #[must_use]
    pub fn desired(&self) -> Option<String> {
        self.manual.clone().or_else(|| self.tracked.desired())
    }

    /// Tracked resources.
    #[must_use]
    pub fn tracked(&self) -> &TrackedHosts {
        &self.tracked
    }

    /// Report the current status, even if unchanged.
    pub fn report(&mut self) {
        let desired = self.desired();
        self.sink.request_presence(desired.clone());
        self.reported = Some(desired);
    }

    fn refresh(&mut self) {
        let desired = self.desired();
        if self.reported.as_ref() == Some(&desired) {
            return;
        }
        debug!(status = ?desired, "Desired activity changed");
        self.sink.request_presence(desired.clone());
        self.reported = Some(desired);
    }
}
