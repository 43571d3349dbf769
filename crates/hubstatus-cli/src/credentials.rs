//! Token file refresh.
//!
//! The client reads its credential from a watch channel; this module keeps
//! that channel in step with a token file on disk.

use std::path::PathBuf;
use std::time::Duration;

use hubstatus_gateway::parse_stored_token;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Periodically re-reads a token file into a watch channel.
#[derive(Debug, Clone)]
pub(crate) struct CredentialRefresher {
    path: PathBuf,
    interval: Duration,
}

impl CredentialRefresher {
    pub(crate) fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
        }
    }

    /// Read the token file once. Missing, unreadable or blank files give
    /// `None`.
    pub(crate) async fn read(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let token = parse_stored_token(&raw);
                if token.is_none() {
                    debug!(path = %self.path.display(), "Token file holds no token");
                }
                token
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Token file not found");
                None
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read token file");
                None
            },
        }
    }

    /// Read now and then once per interval, publishing changes to `tx`.
    /// The task ends when every receiver is gone.
    pub(crate) fn spawn(self, tx: watch::Sender<Option<String>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {},
                    () = tx.closed() => break,
                }

                let token = self.read().await;
                let present = token.is_some();
                let changed = tx.send_if_modified(|current| {
                    if *current == token {
                        false
                    } else {
                        *current = token;
                        true
                    }
                });
                if changed {
                    info!(path = %self.path.display(), present, "Credential changed");
                }
            }

            debug!("Credential refresher stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn read_accepts_json_literal_and_bare_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        let refresher = CredentialRefresher::new(&path, Duration::from_secs(1));

        assert_eq!(refresher.read().await, None);

        std::fs::write(&path, "\"tok123\"\n").unwrap();
        assert_eq!(refresher.read().await.as_deref(), Some("tok123"));

        std::fs::write(&path, "bare-token").unwrap();
        assert_eq!(refresher.read().await.as_deref(), Some("bare-token"));

        std::fs::write(&path, "   \n").unwrap();
        assert_eq!(refresher.read().await, None);
    }

    #[tokio::test]
    async fn spawn_publishes_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "first").unwrap();

        let (tx, mut rx) = watch::channel(None);
        let task = CredentialRefresher::new(&path, Duration::from_millis(10)).spawn(tx);

        tokio::time::timeout(WAIT, rx.changed()).await.unwrap().unwrap();
        assert_eq!(rx.borrow_and_update().as_deref(), Some("first"));

        std::fs::write(&path, "second").unwrap();
        tokio::time::timeout(WAIT, rx.changed()).await.unwrap().unwrap();
        assert_eq!(rx.borrow_and_update().as_deref(), Some("second"));

        std::fs::remove_file(&path).unwrap();
        tokio::time::timeout(WAIT, rx.changed()).await.unwrap().unwrap();
        assert_eq!(*rx.borrow_and_update(), None);

        drop(rx);
        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    }
}
