// Per-connection session state

use crate::chat::error::ChatError;
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque identity of one transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key a session is registered under: its connection before login, its
/// username after.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionKey {
    Connection(ConnectionId),
    User(String),
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKey::Connection(id) => write!(f, "connection {}", id),
            SessionKey::User(name) => write!(f, "user {}", name),
        }
    }
}

/// Handshake progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    AwaitingUsername,
    AwaitingPassword { username: String, registering: bool },
    Authenticated,
}

/// Where plain chat lines go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMode {
    Group,
    Whisper { target: String },
}

/// Something queued for a connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    /// Flush and close the connection
    Close,
}

/// Write side of a connection. Sends never block; a slow peer only grows its
/// own queue.
#[derive(Debug, Clone)]
pub struct SessionSink {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl SessionSink {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }

    /// Create a sink with its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Queue text for the connection
    pub fn send(&self, text: impl Into<String>) -> Result<(), ChatError> {
        self.tx
            .send(Outbound::Text(text.into()))
            .map_err(|_| ChatError::Transport("writer closed".to_string()))
    }

    /// Ask the writer to close the connection
    pub fn close(&self) -> Result<(), ChatError> {
        self.tx
            .send(Outbound::Close)
            .map_err(|_| ChatError::Transport("writer closed".to_string()))
    }
}

/// Server-side state for one connected client
#[derive(Debug)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub username: Option<String>,
    pub auth: AuthState,
    pub mode: ChatMode,
    sink: SessionSink,
}

impl Session {
    /// A fresh, unauthenticated session
    pub fn new(connection_id: ConnectionId, sink: SessionSink) -> Self {
        Self {
            connection_id,
            username: None,
            auth: AuthState::AwaitingUsername,
            mode: ChatMode::Group,
            sink,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth == AuthState::Authenticated
    }

    /// Username typed at the prompt while a password is awaited
    pub fn pending_username(&self) -> Option<&str> {
        match &self.auth {
            AuthState::AwaitingPassword { username, .. } => Some(username),
            _ => None,
        }
    }

    pub fn whisper_target(&self) -> Option<&str> {
        match &self.mode {
            ChatMode::Whisper { target } => Some(target),
            ChatMode::Group => None,
        }
    }

    /// Queue text for this session, logging instead of failing.
    ///
    /// A dead writer means the connection task is already on its way out and
    /// will report the disconnect itself.
    pub fn send(&self, text: impl Into<String>) {
        if let Err(e) = self.sink.send(text) {
            tracing::warn!(
                "Failed to send to {} ({}): {}",
                self.username.as_deref().unwrap_or("<anonymous>"),
                self.connection_id,
                e
            );
        }
    }

    /// Close the underlying connection
    pub fn close(&self) {
        if self.sink.close().is_err() {
            tracing::debug!("Connection {} already closed", self.connection_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_accessors() {
        let (sink, mut rx) = SessionSink::channel();
        let mut session = Session::new(ConnectionId::new(), sink);

        assert!(!session.is_authenticated());
        assert_eq!(session.pending_username(), None);

        session.auth = AuthState::AwaitingPassword {
            username: "alice".to_string(),
            registering: true,
        };
        assert_eq!(session.pending_username(), Some("alice"));

        session.mode = ChatMode::Whisper {
            target: "bob".to_string(),
        };
        assert_eq!(session.whisper_target(), Some("bob"));

        session.send("hi");
        session.close();
        assert_eq!(rx.try_recv().unwrap(), Outbound::Text("hi".to_string()));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
    }

    #[test]
    fn test_send_to_dropped_writer_is_logged() {
        let (sink, rx) = SessionSink::channel();
        drop(rx);
        assert!(sink.send("lost").is_err());

        let session = Session::new(ConnectionId::new(), sink);
        session.send("also lost");
    }
}
