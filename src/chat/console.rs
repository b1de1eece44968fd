// Operator console: server-side commands read from stdin

use crate::chat::broker::{BrokerCommand, BrokerHandle};
use tokio::io::{AsyncBufReadExt, BufReader};

/// A command typed at the server console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `/setname <name>`: rename the group
    SetName(String),
    Help,
}

impl ConsoleCommand {
    pub const HELP: &'static str = "服务器命令:\n  /setname 新名称 - 修改群聊名称\n  /help - 显示帮助";

    /// Parse a console line. Unrecognized input yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line == "/help" {
            return Some(Self::Help);
        }
        line.strip_prefix("/setname")
            .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
            .map(|name| Self::SetName(name.trim().to_string()))
    }
}

/// Read console commands from stdin until it closes
pub async fn run_console(broker: BrokerHandle) {
    println!("\n{}", ConsoleCommand::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(cmd) = ConsoleCommand::parse(&line) else {
                    if !line.trim().is_empty() {
                        tracing::debug!("Ignoring console input: {}", line);
                    }
                    continue;
                };
                if broker.send_command(BrokerCommand::Console(cmd)).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Console read error: {}", e);
                break;
            }
        }
    }

    tracing::debug!("Console closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_console() {
        assert_eq!(ConsoleCommand::parse("/help"), Some(ConsoleCommand::Help));
        assert_eq!(
            ConsoleCommand::parse("/setname  新名称 "),
            Some(ConsoleCommand::SetName("新名称".to_string()))
        );
        // Empty names reach the broker, which rejects them
        assert_eq!(
            ConsoleCommand::parse("/setname  "),
            Some(ConsoleCommand::SetName(String::new()))
        );
        assert_eq!(ConsoleCommand::parse("/setnamex"), None);
        assert_eq!(ConsoleCommand::parse("hello"), None);
    }
}
