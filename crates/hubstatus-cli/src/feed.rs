//! Line-driven activity feed.
//!
//! Each line on stdin is one event:
//!
//! ```text
//! open <id> <url>          resource <id> now shows <url>
//! close <id>               resource <id> went away
//! replace <old> <new> <url>
//! set <label...>           force a status
//! clear                    back to the status derived from open resources
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::io::BufRead;

use hubstatus_gateway::{ActivityObserver, PresenceSink};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lines buffered between the stdin thread and the feed.
const LINE_BUFFER: usize = 64;

/// A malformed feed line.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum FeedError {
    /// The first word is not a known command.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    /// The command is missing arguments or has extra ones.
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// One parsed feed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FeedCommand {
    Open { id: String, url: String },
    Close { id: String },
    Replace { old: String, new: String, url: String },
    Set(String),
    Clear,
}

impl FeedCommand {
    /// Parse a line. `Ok(None)` for blank lines and comments.
    pub(crate) fn parse(line: &str) -> Result<Option<Self>, FeedError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match (word, args.as_slice()) {
            ("open", [id, url]) => Self::Open {
                id: (*id).to_owned(),
                url: (*url).to_owned(),
            },
            ("open", _) => return Err(FeedError::Usage("open <id> <url>")),
            ("close", [id]) => Self::Close {
                id: (*id).to_owned(),
            },
            ("close", _) => return Err(FeedError::Usage("close <id>")),
            ("replace", [old, new, url]) => Self::Replace {
                old: (*old).to_owned(),
                new: (*new).to_owned(),
                url: (*url).to_owned(),
            },
            ("replace", _) => return Err(FeedError::Usage("replace <old> <new> <url>")),
            ("set", []) => return Err(FeedError::Usage("set <label...>")),
            ("set", _) => Self::Set(rest.trim().to_owned()),
            ("clear", []) => Self::Clear,
            ("clear", _) => return Err(FeedError::Usage("clear")),
            (other, _) => return Err(FeedError::UnknownCommand(other.to_owned())),
        };

        Ok(Some(command))
    }

    pub(crate) fn apply<S: PresenceSink>(self, observer: &mut ActivityObserver<S>) {
        match self {
            Self::Open { id, url } => observer.opened(id, &url),
            Self::Close { id } => observer.closed(&id),
            Self::Replace { old, new, url } => observer.replaced(&old, new, &url),
            Self::Set(label) => observer.set_manual(Some(label)),
            Self::Clear => observer.set_manual(None),
        }
    }
}

/// Read stdin on a dedicated thread.
///
/// A blocking stdin read cannot be cancelled, so it must not sit on the
/// runtime's blocking pool where it would hold up shutdown.
pub(crate) fn spawn_stdin_reader() -> std::io::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    std::thread::Builder::new()
        .name("stdin-feed".to_owned())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            return;
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "Failed to read activity feed");
                        return;
                    },
                }
            }
        })?;
    Ok(rx)
}

/// Apply every line until the sender side closes.
pub(crate) async fn drive<S: PresenceSink>(
    mut lines: mpsc::Receiver<String>,
    observer: &mut ActivityObserver<S>,
) {
    while let Some(line) = lines.recv().await {
        match FeedCommand::parse(&line) {
            Ok(Some(command)) => {
                command.apply(observer);
                debug!(open = observer.tracked().len(), "Activity applied");
            },
            Ok(None) => {},
            Err(e) => warn!(error = %e, line = %line, "Ignoring activity line"),
        }
    }
    info!(idle = observer.tracked().is_empty(), "Activity feed closed");
}
