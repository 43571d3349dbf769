//! Credential access.
//!
//! The client only ever reads the credential. Whoever discovers or
//! refreshes it owns the write side (for example a
//! [`watch::Sender`](tokio::sync::watch::Sender) fed by a file watcher).

use tokio::sync::watch;

/// Read access to the current credential.
pub trait CredentialProvider: Send + Sync + 'static {
    /// The current token, or `None` when unavailable. Empty tokens count
    /// as unavailable.
    fn credential(&self) -> Option<String>;
}

impl CredentialProvider for Option<String> {
    fn credential(&self) -> Option<String> {
        self.clone().filter(|token| !token.is_empty())
    }
}

impl CredentialProvider for watch::Receiver<Option<String>> {
    fn credential(&self) -> Option<String> {
        self.borrow().clone().filter(|token| !token.is_empty())
    }
}

/// Parse a stored token.
///
/// Page storage keeps the token as a JSON string literal (with quotes);
/// a hand-written token file usually holds the bare value. Both are
/// accepted. Returns `None` for blank or unparseable input.
#[must_use]
pub fn parse_stored_token(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('"') {
        return serde_json::from_str::<String>(trimmed)
            .ok()
            .filter(|token| !token.is_empty());
    }
    Some(trimmed.to_string())
}
