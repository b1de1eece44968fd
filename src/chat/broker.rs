// Chat broker: the single task that owns and mutates ChatState

use crate::chat::console::ConsoleCommand;
use crate::chat::session::{ConnectionId, SessionSink};
use crate::chat::state::ChatState;
use anyhow::{anyhow, Context, Result};
use tokio::sync::{mpsc, oneshot};

/// Handle for communicating with the broker
#[derive(Clone)]
pub struct BrokerHandle {
    pub tx: mpsc::UnboundedSender<BrokerCommand>,
}

impl BrokerHandle {
    pub fn new(tx: mpsc::UnboundedSender<BrokerCommand>) -> Self {
        Self { tx }
    }

    /// Send a command to the broker
    pub fn send_command(&self, cmd: BrokerCommand) -> Result<()> {
        // SendError<BrokerCommand> is !Sync (queries hold FnOnce), so no .context here
        self.tx
            .send(cmd)
            .map_err(|_| anyhow!("Failed to send command to broker"))
    }

    /// Run a read-only query against the broker's state
    pub async fn query<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ChatState) -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(BrokerCommand::Query(Box::new(move |state: &ChatState| {
            let _ = reply_tx.send(f(state));
        })))?;
        reply_rx.await.context("Broker dropped query")
    }
}

/// Read-only access to the state, run inside the broker
pub type StateQuery = Box<dyn FnOnce(&ChatState) + Send>;

/// Commands that can be sent to the broker
pub enum BrokerCommand {
    /// A connection opened
    Connected {
        connection_id: ConnectionId,
        sink: SessionSink,
    },
    /// A connection sent a line
    Line {
        connection_id: ConnectionId,
        line: String,
    },
    /// A connection closed
    Disconnected { connection_id: ConnectionId },
    /// Operator console input
    Console(ConsoleCommand),
    Query(StateQuery),
    /// Shutdown the broker
    Shutdown,
}

impl std::fmt::Debug for BrokerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected { connection_id, .. } => {
                write!(f, "Connected({})", connection_id)
            }
            Self::Line { connection_id, .. } => write!(f, "Line({})", connection_id),
            Self::Disconnected { connection_id } => write!(f, "Disconnected({})", connection_id),
            Self::Console(cmd) => write!(f, "Console({:?})", cmd),
            Self::Query(_) => write!(f, "Query"),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Processes every state change one command at a time
pub struct ChatBroker {
    state: ChatState,
    rx: mpsc::UnboundedReceiver<BrokerCommand>,
}

impl ChatBroker {
    /// Create a new broker around the given state
    pub fn new(state: ChatState) -> (Self, BrokerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { state, rx }, BrokerHandle::new(tx))
    }

    /// Run the broker event loop, returning the state once stopped
    pub async fn run(mut self) -> ChatState {
        tracing::info!("Chat broker started");

        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                BrokerCommand::Connected {
                    connection_id,
                    sink,
                } => self.state.open_connection(connection_id, sink),
                BrokerCommand::Line {
                    connection_id,
                    line,
                } => self.state.handle_line(connection_id, &line),
                BrokerCommand::Disconnected { connection_id } => {
                    self.state.close_connection(connection_id)
                }
                BrokerCommand::Console(cmd) => self.handle_console(cmd),
                BrokerCommand::Query(query) => query(&self.state),
                BrokerCommand::Shutdown => {
                    tracing::info!("Broker shutting down");
                    break;
                }
            }
        }

        tracing::info!("Chat broker stopped");
        self.state
    }

    fn handle_console(&mut self, cmd: ConsoleCommand) {
        match cmd {
            ConsoleCommand::SetName(name) => {
                if let Err(e) = self.state.set_group_name(&name) {
                    tracing::warn!("群聊名称不能为空: {}", e);
                }
            }
            ConsoleCommand::Help => println!("{}", ConsoleCommand::HELP),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::config::ChatConfig;
    use crate::chat::session::Outbound;
    use crate::chat::storage::Store;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_broker_serializes_session_flow() {
        let dir = tempdir().unwrap();
        let state = ChatState::new(ChatConfig::default(), Store::open(dir.path()).unwrap());
        let (broker, handle) = ChatBroker::new(state);
        let task = tokio::spawn(broker.run());

        let connection_id = ConnectionId::new();
        let (sink, mut rx) = SessionSink::channel();
        handle
            .send_command(BrokerCommand::Connected { connection_id, sink })
            .unwrap();
        for line in ["alice", "secret"] {
            handle
                .send_command(BrokerCommand::Line {
                    connection_id,
                    line: line.to_string(),
                })
                .unwrap();
        }

        let online = handle
            .query(|state| state.registry().list_online_usernames())
            .await
            .unwrap();
        assert_eq!(online, vec!["alice".to_string()]);

        handle
            .send_command(BrokerCommand::Console(ConsoleCommand::SetName(
                "新群".to_string(),
            )))
            .unwrap();
        handle
            .send_command(BrokerCommand::Disconnected { connection_id })
            .unwrap();
        handle.send_command(BrokerCommand::Shutdown).unwrap();

        let state = task.await.unwrap();
        assert!(state.registry().is_empty());
        assert_eq!(state.group_name(), "新群");

        let mut texts = String::new();
        while let Ok(Outbound::Text(t)) = rx.try_recv() {
            texts.push_str(&t);
        }
        assert!(texts.contains("注册成功！欢迎 alice 加入Nuoke聊天群！"));
        assert!(texts.contains("群聊名称已修改为: 新群"));
    }

    #[tokio::test]
    async fn test_send_after_broker_stops_is_an_error() {
        let dir = tempdir().unwrap();
        let state = ChatState::new(ChatConfig::default(), Store::open(dir.path()).unwrap());
        let (broker, handle) = ChatBroker::new(state);
        drop(broker);

        let err = handle.send_command(BrokerCommand::Shutdown).unwrap_err();
        assert_eq!(err.to_string(), "Failed to send command to broker");
        assert!(handle
            .query(|state| state.group_name().to_string())
            .await
            .is_err());
    }
}
