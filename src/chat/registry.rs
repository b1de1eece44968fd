// Registry of connected sessions
//
// One map from SessionKey to Session. A session is registered under its
// connection key until it authenticates, then `rekey` moves it under its
// username. No operation leaves a session under two keys.

use crate::chat::error::ChatError;
use crate::chat::session::{ConnectionId, Session, SessionKey};
use std::collections::HashMap;

/// Manages all connected sessions
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionKey, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. Fails if the key is already taken.
    pub fn register(&mut self, key: SessionKey, session: Session) -> Result<(), ChatError> {
        if self.sessions.contains_key(&key) {
            return Err(conflict(&key));
        }
        tracing::debug!("Registered {}", key);
        self.sessions.insert(key, session);
        Ok(())
    }

    /// Remove a session
    pub fn unregister(&mut self, key: &SessionKey) -> Option<Session> {
        let removed = self.sessions.remove(key);
        if removed.is_some() {
            tracing::debug!("Unregistered {}", key);
        }
        removed
    }

    /// Move a session from `old` to `new` in one step.
    ///
    /// If `new` is taken the session stays under `old`.
    pub fn rekey(&mut self, old: &SessionKey, new: SessionKey) -> Result<(), ChatError> {
        if self.sessions.contains_key(&new) {
            return Err(conflict(&new));
        }
        let session = self
            .sessions
            .remove(old)
            .ok_or_else(|| ChatError::UnknownSession(old.to_string()))?;
        tracing::debug!("Rekeyed {} to {}", old, new);
        self.sessions.insert(new, session);
        Ok(())
    }

    pub fn get(&self, key: &SessionKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    pub fn get_mut(&mut self, key: &SessionKey) -> Option<&mut Session> {
        self.sessions.get_mut(key)
    }

    /// Find the authenticated session holding `username`
    pub fn lookup_by_username(&self, username: &str) -> Option<&Session> {
        self.sessions
            .get(&SessionKey::User(username.to_string()))
            .filter(|s| s.is_authenticated())
    }

    pub fn is_username_online(&self, username: &str) -> bool {
        self.lookup_by_username(username).is_some()
    }

    /// Usernames of logged-in sessions, in registry order
    pub fn list_online_usernames(&self) -> Vec<String> {
        self.sessions
            .values()
            .filter_map(|s| s.username.clone())
            .collect()
    }

    /// The key currently valid for a connection
    pub fn key_for_connection(&self, id: ConnectionId) -> Option<SessionKey> {
        let by_connection = SessionKey::Connection(id);
        if self.sessions.contains_key(&by_connection) {
            return Some(by_connection);
        }
        self.sessions
            .iter()
            .find(|(_, s)| s.connection_id == id)
            .map(|(key, _)| key.clone())
    }

    /// All authenticated sessions
    pub fn authenticated(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values().filter(|s| s.is_authenticated())
    }

    /// Number of registered sessions, authenticated or not
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn conflict(key: &SessionKey) -> ChatError {
    match key {
        SessionKey::User(name) => ChatError::AlreadyOnline(name.clone()),
        SessionKey::Connection(id) => ChatError::AlreadyOnline(id.to_string()),
    }
}
