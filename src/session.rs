//! Consent session tracking.
//!
//! Clients are tracked under two keys: an opaque session token carried
//! in a cookie (precise across browser sessions) and the source IP
//! (best-effort across cookie loss). Acceptance is monotonic: an entry
//! is only ever promoted towards `accepted`, never demoted, and nothing
//! is deleted while the process lives.

use std::collections::HashMap;
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

/// Who a request came from: the source IP plus, when the client sent
/// its `session_token` cookie, the opaque token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub ip: String,
    pub token: Option<String>,
}

impl ClientIdentity {
    pub fn new(ip: impl Into<String>, token: Option<String>) -> Self {
        Self {
            ip: ip.into(),
            token,
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum SessionKey {
    Token(String),
    Ip(String),
}

/// Per-identity consent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub accepted: bool,
    pub created_at: OffsetDateTime,
}

impl SessionEntry {
    fn pending() -> Self {
        Self {
            accepted: false,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Process-wide map from client identity to consent state.
///
/// Owned by the gateway server and shared with request handlers behind
/// an `Arc`; a restart resets all sessions, so every returning client
/// is shown the portal once more.
pub struct SessionStore {
    entries: Mutex<HashMap<SessionKey, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the entry for an identity, preferring the token key.
    pub fn lookup(&self, identity: &ClientIdentity) -> Option<SessionEntry> {
        let entries = self.lock();
        if let Some(token) = &identity.token {
            if let Some(entry) = entries.get(&SessionKey::Token(token.clone())) {
                return Some(entry.clone());
            }
        }
        entries.get(&SessionKey::Ip(identity.ip.clone())).cloned()
    }

    /// Return the entry for an identity, creating a pending one under a
    /// freshly generated token when none exists. The returned token is
    /// what the portal page hands back to the client as a cookie; the
    /// flag reports whether it was newly issued.
    pub fn ensure(&self, identity: &ClientIdentity) -> (SessionEntry, String, bool) {
        let mut entries = self.lock();

        if let Some(token) = &identity.token {
            if let Some(entry) = entries.get(&SessionKey::Token(token.clone())) {
                return (entry.clone(), token.clone(), false);
            }
        }

        let token = generate_token();
        let entry = SessionEntry::pending();
        entries.insert(SessionKey::Token(token.clone()), entry.clone());
        (entry, token, true)
    }

    /// Promote both the token-keyed and the IP-keyed entry for this
    /// identity to accepted, creating either if absent. Existing
    /// `created_at` values are preserved.
    pub fn mark_accepted(&self, identity: &ClientIdentity) {
        let mut entries = self.lock();

        let mut promote = |key: SessionKey| {
            entries
                .entry(key)
                .and_modify(|e| e.accepted = true)
                .or_insert_with(|| SessionEntry {
                    accepted: true,
                    created_at: OffsetDateTime::now_utc(),
                });
        };

        if let Some(token) = &identity.token {
            promote(SessionKey::Token(token.clone()));
        }
        promote(SessionKey::Ip(identity.ip.clone()));
    }

    /// True unless either key of this identity has accepted.
    pub fn is_portal_required(&self, identity: &ClientIdentity) -> bool {
        let entries = self.lock();

        if let Some(token) = &identity.token {
            if let Some(entry) = entries.get(&SessionKey::Token(token.clone())) {
                if entry.accepted {
                    return false;
                }
            }
        }
        match entries.get(&SessionKey::Ip(identity.ip.clone())) {
            Some(entry) => !entry.accepted,
            None => true,
        }
    }

    /// Number of tracked entries (token and IP keys counted separately).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionKey, SessionEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate an unguessable session token. Never derived from
/// client-supplied data.
fn generate_token() -> String {
    Uuid::new_v4().to_string()
}
