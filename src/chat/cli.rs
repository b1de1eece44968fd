// Command-line arguments for the chat server

use crate::chat::config::ChatConfig;
use clap::Parser;
use std::path::PathBuf;

/// Chat server command line
#[derive(Debug, Parser)]
#[command(name = "nuoke-server")]
#[command(about = "Line-based TCP group chat server")]
pub struct ServerCli {
    /// Path to config.json
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Directory holding users.json and messages.json
    #[arg(short, long, default_value = ".")]
    pub data_dir: PathBuf,

    /// Address to bind
    #[arg(short, long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Group display name (overrides the config file)
    #[arg(short, long)]
    pub group_name: Option<String>,

    /// Do not read operator commands from stdin
    #[arg(long)]
    pub no_console: bool,
}

impl ServerCli {
    /// Apply command-line overrides on top of the loaded config
    pub fn apply_overrides(&self, config: &mut ChatConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(name) = &self.group_name {
            config.chat.group_name = name.clone();
        }
    }

    /// `host:port` to listen on
    pub fn listen_addr(&self, config: &ChatConfig) -> String {
        format!("{}:{}", self.bind, config.server.port)
    }
}
