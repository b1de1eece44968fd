// TCP chat server: listener, broker task and per-connection tasks

use crate::chat::broker::{BrokerCommand, BrokerHandle, ChatBroker};
use crate::chat::client::handle_client_stream;
use crate::chat::state::ChatState;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A running chat server
pub struct ChatServer {
    local_addr: SocketAddr,
    broker_handle: BrokerHandle,
    shutdown_tx: mpsc::UnboundedSender<()>,
    broker_task: JoinHandle<ChatState>,
}

impl ChatServer {
    /// Bind `addr` and start serving `state`
    pub async fn start(addr: &str, state: ChatState) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let local_addr = listener.local_addr().context("Failed to read local address")?;

        let idle_timeout = state
            .config()
            .server
            .idle_timeout_secs
            .map(Duration::from_secs);
        let group_name = state.group_name().to_string();

        let (broker, broker_handle) = ChatBroker::new(state);
        let broker_task = tokio::spawn(broker.run());

        let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();
        let accept_handle = broker_handle.clone();
        tokio::spawn(async move {
            Self::run_listener(listener, accept_handle, idle_timeout, &mut shutdown_rx).await;
        });

        tracing::info!("{}服务器已启动，监听 {}", group_name, local_addr);

        Ok(Self {
            local_addr,
            broker_handle,
            shutdown_tx,
            broker_task,
        })
    }

    /// Accept connections until told to stop
    async fn run_listener(
        listener: TcpListener,
        broker_handle: BrokerHandle,
        idle_timeout: Option<Duration>,
        shutdown_rx: &mut mpsc::UnboundedReceiver<()>,
    ) {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::debug!("Accepted {}", addr);
                            tokio::spawn(Self::handle_connection(
                                stream,
                                addr,
                                broker_handle.clone(),
                                idle_timeout,
                            ));
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Listener shutting down");
                    break;
                }
            }
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        broker_handle: BrokerHandle,
        idle_timeout: Option<Duration>,
    ) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }

        if let Err(e) = handle_client_stream(stream, broker_handle, idle_timeout).await {
            tracing::warn!("Client {} stream error: {}", addr, e);
        }
        tracing::debug!("Connection from {} finished", addr);
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for sending commands to the broker
    pub fn handle(&self) -> BrokerHandle {
        self.broker_handle.clone()
    }

    /// Stop accepting, stop the broker, and return the final state.
    ///
    /// Dropping the state closes every connection's writer.
    pub async fn shutdown(self) -> Result<ChatState> {
        let _ = self.shutdown_tx.send(());
        self.broker_handle
            .send_command(BrokerCommand::Shutdown)
            .context("Failed to send shutdown command")?;
        self.broker_task.await.context("Broker task panicked")
    }
}
