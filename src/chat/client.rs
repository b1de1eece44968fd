// Client connection I/O: line framing in, queued text out

use crate::chat::broker::{BrokerCommand, BrokerHandle};
use crate::chat::session::{ConnectionId, Outbound, SessionSink};
use anyhow::Result;
use futures::StreamExt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};

/// Longest accepted input line, in bytes
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// How long queued replies may take to flush once the peer stops sending
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Drive one client connection until either side closes it.
///
/// Registers the connection with the broker, forwards every inbound line, and
/// always reports the disconnect, however the connection ended.
pub async fn handle_client_stream<S>(
    stream: S,
    broker: BrokerHandle,
    idle_timeout: Option<Duration>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let connection_id = ConnectionId::new();
    let (sink, outgoing_rx) = SessionSink::channel();

    broker.send_command(BrokerCommand::Connected {
        connection_id,
        sink,
    })?;

    let (read_half, write_half) = tokio::io::split(stream);
    let mut write_task = tokio::spawn(write_loop(write_half, outgoing_rx));

    let (result, writer_done) = tokio::select! {
        result = read_loop(read_half, connection_id, &broker, idle_timeout) => (result, false),
        _ = &mut write_task => (Ok(()), true),
    };

    let _ = broker.send_command(BrokerCommand::Disconnected { connection_id });

    // The broker drops the session's sink on disconnect, which ends the writer
    // once everything already queued has been written.
    if !writer_done
        && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut write_task)
            .await
            .is_err()
    {
        tracing::debug!("Writer for {} did not drain in time", connection_id);
        write_task.abort();
    }
    result
}

async fn read_loop<R>(
    reader: R,
    connection_id: ConnectionId,
    broker: &BrokerHandle,
    idle_timeout: Option<Duration>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let codec =
        AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), MAX_LINE_LENGTH);
    let mut lines = FramedRead::new(reader, codec);

    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, lines.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::info!("Connection {} idle for {:?}, closing", connection_id, limit);
                    return Ok(());
                }
            },
            None => lines.next().await,
        };

        match next {
            Some(Ok(frame)) => {
                broker.send_command(BrokerCommand::Line {
                    connection_id,
                    line: decode_line(&frame),
                })?;
            }
            Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => {
                tracing::warn!("Connection {} sent an over-long line, dropped", connection_id);
            }
            Some(Err(AnyDelimiterCodecError::Io(e))) => {
                tracing::warn!("Error reading from connection {}: {}", connection_id, e);
                return Ok(());
            }
            None => return Ok(()), // EOF
        }
    }
}

/// Clients are not required to send UTF-8; undecodable bytes become U+FFFD
fn decode_line(frame: &[u8]) -> String {
    let frame = frame.strip_suffix(b"\r").unwrap_or(frame);
    String::from_utf8_lossy(frame).into_owned()
}

async fn write_loop<W>(mut writer: W, mut outgoing_rx: mpsc::UnboundedReceiver<Outbound>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = outgoing_rx.recv().await {
        match item {
            Outbound::Text(text) => {
                if let Err(e) = writer.write_all(text.as_bytes()).await {
                    tracing::debug!("Write failed: {}", e);
                    return;
                }
                let _ = writer.flush().await;
            }
            Outbound::Close => break,
        }
    }
    let _ = writer.shutdown().await;
}
