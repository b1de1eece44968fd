// Message routing: group broadcast, whispers, notices and history replay

use crate::chat::error::ChatError;
use crate::chat::message::MessageRecord;
use crate::chat::session::{ChatMode, SessionKey};
use crate::chat::state::ChatState;

impl ChatState {
    /// Send a chat line to every authenticated session except the sender.
    ///
    /// Returns whether anything was sent; blank text is dropped.
    pub fn broadcast_group(&mut self, sender: &SessionKey, text: &str) -> Result<bool, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(false);
        }

        let username = self.authenticated_name(sender)?;
        let record = MessageRecord::group(&username, text);
        let line = record.render_group();

        let mut delivered = 0;
        for session in self.registry.authenticated() {
            if session.username.as_deref() == Some(username.as_str()) {
                continue;
            }
            session.send(line.clone());
            delivered += 1;
        }

        tracing::debug!("{}: {} (delivered to {})", username, text, delivered);
        self.store.append_message(record)?;
        Ok(true)
    }

    /// Send a chat line to the sender's whisper target.
    ///
    /// If the target has left, the sender is told and dropped back to group mode.
    pub fn send_whisper(&mut self, sender: &SessionKey, text: &str) -> Result<bool, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(false);
        }

        let username = self.authenticated_name(sender)?;
        let target = match self.session(sender)?.whisper_target() {
            Some(target) => target.to_string(),
            None => return self.broadcast_group(sender, text),
        };

        let Some(recipient) = self.registry.lookup_by_username(&target) else {
            self.session_mut(sender)?.mode = ChatMode::Group;
            self.send_to(sender, format!("用户 {} 已下线，自动返回群聊模式\n", target));
            tracing::info!("{} whispered to offline {}", username, target);
            return Err(ChatError::TargetOffline(target));
        };

        let record = MessageRecord::whisper(&username, &target, text);
        recipient.send(record.render_whisper_incoming());
        self.send_to(sender, record.render_whisper_echo());

        tracing::info!("[私聊] {} -> {}: {}", username, target, text);
        self.store.append_message(record)?;
        Ok(true)
    }

    /// Write the retained history to a newly authenticated session
    pub fn replay_history(&self, key: &SessionKey) {
        let Some(session) = self.registry.get(key) else {
            return;
        };

        for record in self.store.history().filter(|r| !r.is_blank()) {
            session.send(record.render_history());
        }
    }

    /// Send a notice line to every authenticated session, optionally skipping one user
    pub fn announce(&self, text: &str, exclude: Option<&str>) {
        let line = format!("{}\n", text);
        for session in self.registry.authenticated() {
            if exclude.is_some() && session.username.as_deref() == exclude {
                continue;
            }
            session.send(line.clone());
        }
    }

    /// The `/users` listing line
    pub fn online_users_line(&self) -> String {
        let names = self.registry.list_online_usernames();
        format!("在线用户 ({}): {}\n", names.len(), names.join(", "))
    }

    /// Push the online listing to everyone
    pub fn broadcast_online_users(&self) {
        let line = self.online_users_line();
        for session in self.registry.authenticated() {
            session.send(line.clone());
        }
    }

    fn authenticated_name(&self, key: &SessionKey) -> Result<String, ChatError> {
        let session = self.session(key)?;
        match (&session.username, session.is_authenticated()) {
            (Some(name), true) => Ok(name.clone()),
            _ => Err(ChatError::UnknownSession(key.to_string())),
        }
    }
}
