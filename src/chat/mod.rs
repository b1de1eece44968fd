// Chat server module
//
// A line-based TCP group chat: sessions authenticate with a username and
// password, then talk to the whole group or whisper to one online user.
// All state lives in one ChatState owned by the broker task.

pub mod auth;
pub mod broker;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod console;
pub mod error;
pub mod message;
pub mod password;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod state;
pub mod storage;

pub use auth::AuthOutcome;
pub use broker::{BrokerCommand, BrokerHandle, ChatBroker};
pub use cli::ServerCli;
pub use commands::ChatCommand;
pub use config::{ChatConfig, PasswordScheme};
pub use console::{run_console, ConsoleCommand};
pub use error::{ChatError, ConfigError, ErrorKind, StorageError};
pub use message::{MessageKind, MessageRecord};
pub use registry::SessionRegistry;
pub use server::ChatServer;
pub use session::{AuthState, ChatMode, ConnectionId, Session, SessionKey, SessionSink};
pub use state::ChatState;
pub use storage::{Store, UserRecord};
