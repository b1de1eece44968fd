// Server configuration loaded from config.json

use crate::chat::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default group display name
pub const DEFAULT_GROUP_NAME: &str = "Nuoke聊天群";

/// Default listening port
pub const DEFAULT_PORT: u16 = 8888;

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub server: ServerSection,
    pub chat: ChatSection,
    pub features: FeatureToggles,
}

/// Network settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerSection {
    pub port: u16,
    /// Host clients are told to connect to; the server binds via `--bind`
    pub host: String,
    /// Close connections that send nothing for this many seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: "localhost".to_string(),
            idle_timeout_secs: None,
        }
    }
}

/// Chat room settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatSection {
    pub group_name: String,
    pub max_username_length: usize,
    pub min_username_length: usize,
    pub password_scheme: PasswordScheme,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            group_name: DEFAULT_GROUP_NAME.to_string(),
            max_username_length: 20,
            min_username_length: 2,
            password_scheme: PasswordScheme::default(),
        }
    }
}

/// How newly registered passwords are hashed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordScheme {
    /// Salted SHA-256
    #[default]
    Sha256,
    /// 32-bit rolling hash kept for old data files. Not suitable for credentials.
    Legacy,
}

/// Optional features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureToggles {
    pub enable_private_messages: bool,
    pub enable_user_list: bool,
    pub enable_join_leave_notifications: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            enable_private_messages: true,
            enable_user_list: true,
            enable_join_leave_notifications: true,
        }
    }
}

impl ChatConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: ChatConfig =
            serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load a config file, falling back to defaults when it is missing or unreadable.
    ///
    /// Invalid values are still an error: a server with `min > max` could never
    /// accept a username.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                tracing::info!("No config at {:?}, using defaults", path);
                Ok(Self::default())
            }
            Err(e @ (ConfigError::Read { .. } | ConfigError::Parse { .. })) => {
                tracing::warn!("无法加载配置文件，使用默认配置: {}", e);
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Check the ranges the chat engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let chat = &self.chat;
        if chat.min_username_length == 0 {
            return Err(ConfigError::Invalid(
                "minUsernameLength must be greater than 0".to_string(),
            ));
        }
        if chat.min_username_length > chat.max_username_length {
            return Err(ConfigError::Invalid(format!(
                "minUsernameLength ({}) exceeds maxUsernameLength ({})",
                chat.min_username_length, chat.max_username_length
            )));
        }
        if chat.group_name.trim().is_empty() {
            return Err(ConfigError::Invalid("groupName cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Write the config back to disk
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        std::fs::write(path, data).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
