//! nuoke - A line-based TCP group chat server
//!
//! This library provides the chat engine (authentication handshake, session
//! registry, group and whisper routing, slash commands, bounded history) and
//! the tokio transport that serves it over TCP.

pub mod chat;

pub use chat::{ChatConfig, ChatServer, ChatState, Store};
