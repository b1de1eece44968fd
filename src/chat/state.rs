// The owned chat context: config, persisted store and live sessions
//
// Behaviour is split across modules as impl blocks on ChatState:
//   connection.rs  open / line / close
//   auth.rs        username and password handshake
//   commands.rs    slash commands
//   router.rs      group, whisper, notices, history replay

use crate::chat::config::ChatConfig;
use crate::chat::error::ChatError;
use crate::chat::registry::SessionRegistry;
use crate::chat::session::{Session, SessionKey};
use crate::chat::storage::Store;
use std::path::PathBuf;

/// All mutable server state. Owned by exactly one task at a time.
pub struct ChatState {
    pub(crate) config: ChatConfig,
    /// Where `/setname` saves, and the config as read from there (no CLI overrides)
    pub(crate) config_file: Option<(PathBuf, ChatConfig)>,
    pub(crate) store: Store,
    pub(crate) registry: SessionRegistry,
}

impl ChatState {
    pub fn new(config: ChatConfig, store: Store) -> Self {
        Self {
            config,
            config_file: None,
            store,
            registry: SessionRegistry::new(),
        }
    }

    /// Remember the config file so `/setname` can save it. `file_config` is
    /// its content before command-line overrides; only that is written back.
    pub fn with_config_file(mut self, path: PathBuf, file_config: ChatConfig) -> Self {
        self.config_file = Some((path, file_config));
        self
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn group_name(&self) -> &str {
        &self.config.chat.group_name
    }

    /// Queue text for one session
    pub(crate) fn send_to(&self, key: &SessionKey, text: impl Into<String>) {
        match self.registry.get(key) {
            Some(session) => session.send(text),
            None => tracing::debug!("Dropping output for missing {}", key),
        }
    }

    pub(crate) fn session(&self, key: &SessionKey) -> Result<&Session, ChatError> {
        self.registry
            .get(key)
            .ok_or_else(|| ChatError::UnknownSession(key.to_string()))
    }

    pub(crate) fn session_mut(&mut self, key: &SessionKey) -> Result<&mut Session, ChatError> {
        self.registry
            .get_mut(key)
            .ok_or_else(|| ChatError::UnknownSession(key.to_string()))
    }

    /// Rename the group, save the config and tell everyone
    pub fn set_group_name(&mut self, name: &str) -> Result<(), ChatError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::EmptyGroupName);
        }

        self.config.chat.group_name = name.to_string();

        if let Some((path, file_config)) = &mut self.config_file {
            file_config.chat.group_name = name.to_string();
            if let Err(e) = file_config.save(path) {
                tracing::error!("保存配置失败: {}", e);
            }
        }

        tracing::info!("群聊名称已修改为: {}", name);
        self.announce(&format!("群聊名称已修改为: {}", name), None);
        Ok(())
    }
}
