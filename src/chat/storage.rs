// Persistent state: user credentials and bounded message history
//
// Both files are rewritten wholesale on every mutation. The in-memory tables
// are the source of truth; a failed write leaves them updated and is reported
// to the caller as a StorageError.

use crate::chat::error::StorageError;
use crate::chat::message::MessageRecord;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// Number of messages kept in the history log
pub const HISTORY_LIMIT: usize = 100;

const USERS_FILE: &str = "users.json";
const MESSAGES_FILE: &str = "messages.json";

/// A registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub username: String,
    /// Password hash, see `chat::password`
    pub password: String,
    pub created_at: String,
}

impl UserRecord {
    /// A record created now
    pub fn new(username: &str, password_hash: String) -> Self {
        Self {
            username: username.to_string(),
            password: password_hash,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: HashMap<String, UserRecord>,
}

/// State manager for users.json and messages.json
pub struct Store {
    data_dir: PathBuf,
    users: UsersFile,
    messages: VecDeque<MessageRecord>,
}

impl Store {
    /// Open the store in `data_dir`, loading whatever is already there.
    ///
    /// Missing or unreadable files start empty, as a fresh server would.
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir).map_err(|source| StorageError::CreateDir {
            path: data_dir.to_path_buf(),
            source,
        })?;

        let users: UsersFile = load_json(&data_dir.join(USERS_FILE)).unwrap_or_default();
        let mut messages: VecDeque<MessageRecord> =
            load_json(&data_dir.join(MESSAGES_FILE)).unwrap_or_default();

        while messages.len() > HISTORY_LIMIT {
            messages.pop_front();
        }

        tracing::info!(
            "Loaded {} users and {} messages from {:?}",
            users.users.len(),
            messages.len(),
            data_dir
        );

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            users,
            messages,
        })
    }

    /// A store that never touches disk until first saved
    #[cfg(test)]
    pub(crate) fn in_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            users: UsersFile::default(),
            messages: VecDeque::new(),
        }
    }

    // ========== Users ==========

    /// Look up a registered user
    pub fn user(&self, username: &str) -> Option<&UserRecord> {
        self.users.users.get(username)
    }

    /// Whether a username is registered
    pub fn has_user(&self, username: &str) -> bool {
        self.users.users.contains_key(username)
    }

    /// Number of registered users
    pub fn user_count(&self) -> usize {
        self.users.users.len()
    }

    /// Insert a user and rewrite users.json
    pub fn add_user(&mut self, record: UserRecord) -> Result<(), StorageError> {
        self.users.users.insert(record.username.clone(), record);
        self.save_users()
    }

    fn save_users(&self) -> Result<(), StorageError> {
        save_json(&self.data_dir.join(USERS_FILE), &self.users)
    }

    // ========== History ==========

    /// Append a message, drop the oldest beyond the limit, rewrite messages.json
    pub fn append_message(&mut self, record: MessageRecord) -> Result<(), StorageError> {
        self.messages.push_back(record);
        while self.messages.len() > HISTORY_LIMIT {
            self.messages.pop_front();
        }
        self.save_messages()
    }

    /// Retained messages, oldest first
    pub fn history(&self) -> impl Iterator<Item = &MessageRecord> {
        self.messages.iter()
    }

    /// Number of retained messages
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    fn save_messages(&self) -> Result<(), StorageError> {
        save_json(&self.data_dir.join(MESSAGES_FILE), &self.messages)
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!("Failed to read {:?}: {}", path, e);
            return None;
        }
    };

    match serde_json::from_str(&data) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring unreadable {:?}: {}", path, e);
            None
        }
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let data = serde_json::to_string_pretty(value).map_err(|source| StorageError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    // Write beside the target then rename so readers never see a half file
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data)
        .and_then(|_| std::fs::rename(&tmp, path))
        .map_err(|source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        })
}
