// Connection lifecycle: open, inbound line, close

use crate::chat::commands::ChatCommand;
use crate::chat::error::{ChatError, ErrorKind};
use crate::chat::session::{AuthState, ChatMode, ConnectionId, Session, SessionKey, SessionSink};
use crate::chat::state::ChatState;

impl ChatState {
    /// Register a new unauthenticated session and greet it
    pub fn open_connection(&mut self, id: ConnectionId, sink: SessionSink) {
        let key = SessionKey::Connection(id);
        let greeting = format!("欢迎来到{}！\n请输入您的用户名: ", self.group_name());

        if let Err(e) = self.registry.register(key.clone(), Session::new(id, sink)) {
            tracing::error!("Connection {} registered twice: {}", id, e);
            return;
        }

        tracing::info!("新客户端连接: {}", id);
        self.send_to(&key, greeting);
    }

    /// Process one line from a connection
    pub fn handle_line(&mut self, id: ConnectionId, raw: &str) {
        let Some(key) = self.registry.key_for_connection(id) else {
            tracing::debug!("Line from unknown connection {}", id);
            return;
        };
        let line = raw.trim();

        let (auth, mode) = match self.registry.get(&key) {
            Some(session) => (session.auth.clone(), session.mode.clone()),
            None => return,
        };

        let result = match auth {
            AuthState::AwaitingUsername => self.submit_username(&key, line).map(|_| ()),
            AuthState::AwaitingPassword { .. } => self.submit_password(&key, line).map(|_| ()),
            AuthState::Authenticated => match ChatCommand::parse(line) {
                Some(command) => self.dispatch_command(&key, command),
                None => match mode {
                    ChatMode::Group => self.broadcast_group(&key, line).map(|_| ()),
                    ChatMode::Whisper { .. } => self.send_whisper(&key, line).map(|_| ()),
                },
            },
        };

        if let Err(e) = result {
            log_failure(&key, &e);
        }
    }

    /// Tear down a connection's session
    pub fn close_connection(&mut self, id: ConnectionId) {
        let Some(key) = self.registry.key_for_connection(id) else {
            tracing::debug!("Close for unknown connection {}", id);
            return;
        };

        let Some(session) = self.registry.unregister(&key) else {
            return;
        };

        let authenticated = session.is_authenticated();
        match session.username {
            Some(username) if authenticated => {
                tracing::info!("{} 离开了聊天室", username);
                if self.config.features.enable_join_leave_notifications {
                    let notice = format!("{} 离开了{}", username, self.group_name());
                    self.announce(&notice, Some(&username));
                }
                if self.config.features.enable_user_list {
                    self.broadcast_online_users();
                }
            }
            _ => tracing::info!("Connection {} closed before login", id),
        }
    }
}

/// Rejected input is routine; storage and transport failures are not
fn log_failure(key: &SessionKey, e: &ChatError) {
    match e.kind() {
        ErrorKind::Validation => tracing::debug!(code = e.error_code(), "{} rejected: {}", key, e),
        ErrorKind::AuthConflict => tracing::info!(code = e.error_code(), "{} rejected: {}", key, e),
        ErrorKind::Storage | ErrorKind::Transport => {
            tracing::warn!(code = e.error_code(), "{} failed: {}", key, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::chat::session::SessionKey;
    use crate::chat::state::test_support::Harness;

    #[test]
    fn test_open_sends_greeting() {
        let mut h = Harness::new();
        let mut client = h.connect();
        assert_eq!(client.drain(), "欢迎来到Nuoke聊天群！\n请输入您的用户名: ");
        assert!(h
            .state
            .registry()
            .get(&SessionKey::Connection(client.id))
            .is_some());
    }

    #[test]
    fn test_close_before_login_is_silent() {
        let mut h = Harness::new();
        let mut alice = h.login("alice", "secret");
        let anon = h.connect();

        h.state.close_connection(anon.id);

        assert_eq!(alice.drain(), "");
        assert_eq!(h.state.registry().len(), 1);
    }

    #[test]
    fn test_close_after_login_notifies_others() {
        let mut h = Harness::new();
        let mut alice = h.login("alice", "secret");
        let bob = h.login("bob", "secret");
        alice.drain();

        h.state.close_connection(bob.id);

        let out = alice.drain();
        assert!(out.contains("bob 离开了Nuoke聊天群\n"));
        assert!(out.contains("在线用户 (1): alice\n"));
        assert!(!h.state.registry().is_username_online("bob"));
    }

    #[test]
    fn test_close_respects_feature_toggles() {
        let mut config = crate::chat::config::ChatConfig::default();
        config.features.enable_join_leave_notifications = false;
        config.features.enable_user_list = false;
        let mut h = Harness::with_config(config);

        let mut alice = h.login("alice", "secret");
        let bob = h.login("bob", "secret");
        alice.drain();

        h.state.close_connection(bob.id);
        assert_eq!(alice.drain(), "");
    }

    #[test]
    fn test_unknown_connection_is_ignored() {
        let mut h = Harness::new();
        let ghost = crate::chat::session::ConnectionId::new();
        h.state.handle_line(ghost, "hello");
        h.state.close_connection(ghost);
        assert!(h.state.registry().is_empty());
    }
}
