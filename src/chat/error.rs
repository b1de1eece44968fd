// Error taxonomy for the chat engine

use std::path::PathBuf;
use thiserror::Error;

/// Broad classes of chat errors, used to decide how an error is recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from a session; answered with a notice or a re-prompt
    Validation,
    /// Username already held by another authenticated session
    AuthConflict,
    /// Credential or history file could not be written
    Storage,
    /// The session's connection is gone
    Transport,
}

/// Errors raised while driving a session
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("username must be between {min} and {max} characters")]
    UsernameLength { min: usize, max: usize },

    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("wrong password for {0}")]
    WrongPassword(String),

    #[error("user {0} is already online")]
    AlreadyOnline(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing argument for {0}")]
    MissingArgument(&'static str),

    #[error("user {0} is not online")]
    TargetOffline(String),

    #[error("cannot whisper to yourself")]
    WhisperToSelf,

    #[error("feature disabled: {0}")]
    FeatureDisabled(&'static str),

    #[error("group name cannot be empty")]
    EmptyGroupName,

    #[error("no session for {0}")]
    UnknownSession(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("connection {0} is closed")]
    Transport(String),
}

impl ChatError {
    /// Which recovery class this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyOnline(_) => ErrorKind::AuthConflict,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Transport(_) | Self::UnknownSession(_) => ErrorKind::Transport,
            _ => ErrorKind::Validation,
        }
    }

    /// Static label for log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UsernameLength { .. } => "username_length",
            Self::PasswordTooShort(_) => "password_too_short",
            Self::WrongPassword(_) => "wrong_password",
            Self::AlreadyOnline(_) => "already_online",
            Self::UnknownCommand(_) => "unknown_command",
            Self::MissingArgument(_) => "missing_argument",
            Self::TargetOffline(_) => "target_offline",
            Self::WhisperToSelf => "whisper_to_self",
            Self::FeatureDisabled(_) => "feature_disabled",
            Self::EmptyGroupName => "empty_group_name",
            Self::UnknownSession(_) => "unknown_session",
            Self::Storage(_) => "storage",
            Self::Transport(_) => "transport",
        }
    }
}

/// Failures reading or rewriting the persisted JSON files
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create data directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures loading, validating or saving the server configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
