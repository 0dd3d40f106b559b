//! Read/write task pair for a single WebSocket connection.
//!
//! Each connection runs two tasks. The read loop consumes inbound frames,
//! refreshing liveness on any traffic and starting the drain when the peer
//! goes away. The write loop is the only writer to the socket: it drains
//! the outbound queue in FIFO order and, once draining starts, flushes what
//! is left before sending a close frame.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::Instrument;

use super::messages::{CloseReason, to_frame};
use crate::domain::{Connection, Outbound};
use crate::service::Hub;

/// Runs both loops for `conn` until the connection drains, then releases it.
///
/// Returns once the write loop has flushed (or the shutdown grace period
/// forced it to stop) and the connection has been removed from the
/// registry.
pub async fn run_connection(
    hub: Arc<Hub>,
    socket: WebSocket,
    conn: Arc<Connection>,
    outbound: mpsc::Receiver<Outbound>,
) {
    let span = tracing::info_span!("ws", conn_id = %conn.id(), user_id = %conn.user_id());
    let write_timeout = hub.config().write_timeout;
    let grace = hub.config().shutdown_grace;

    let (sink, stream) = socket.split();
    let read_task = tokio::spawn(read_loop(stream, Arc::clone(&conn)).instrument(span.clone()));
    let mut write_task = tokio::spawn(
        write_loop(sink, outbound, Arc::clone(&conn), Arc::clone(&hub), write_timeout)
            .instrument(span.clone()),
    );

    conn.drained().await;
    read_task.abort();

    if tokio::time::timeout(grace, &mut write_task).await.is_err() {
        tracing::warn!(parent: &span, grace_ms = grace.as_millis(), "flush grace elapsed, forcing close");
        write_task.abort();
    }

    hub.close_connection(&conn);
}

/// Consumes inbound frames until the peer leaves or draining starts.
async fn read_loop(mut stream: SplitStream<WebSocket>, conn: Arc<Connection>) {
    loop {
        tokio::select! {
            biased;
            () = conn.drained() => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "peer closed connection");
                    break;
                }
                Some(Ok(_)) => conn.touch(),
                Some(Err(err)) => {
                    tracing::debug!(error = %err, "websocket read failed");
                    break;
                }
                None => break,
            }
        }
    }
    conn.begin_draining();
}

/// Writes queued items in order. Any write error or timeout drains the
/// connection without a flush.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
    conn: Arc<Connection>,
    hub: Arc<Hub>,
    write_timeout: Duration,
) {
    loop {
        tokio::select! {
            biased;
            () = conn.drained() => break,
            item = outbound.recv() => {
                let Some(item) = item else { break };
                if !write_frame(&mut sink, to_frame(&item), write_timeout).await {
                    conn.begin_draining();
                    return;
                }
            }
        }
    }

    // Stop accepting, then flush whatever was queued before the drain.
    conn.begin_draining();
    outbound.close();
    let mut flushed = 0_usize;
    while let Some(item) = outbound.recv().await {
        if matches!(item, Outbound::Probe) {
            continue;
        }
        if !write_frame(&mut sink, to_frame(&item), write_timeout).await {
            return;
        }
        flushed += 1;
    }

    let reason = if hub.is_shutting_down() {
        CloseReason::ServerShutdown
    } else {
        CloseReason::Draining
    };
    // The peer may already be gone; a failed goodbye changes nothing.
    let _ = write_frame(&mut sink, reason.frame(), write_timeout).await;
    let _ = tokio::time::timeout(write_timeout, sink.close()).await;

    tracing::debug!(flushed, "write loop finished");
}

/// Sends one frame, bounded by `write_timeout`. Returns `false` on error or
/// timeout.
async fn write_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: Message,
    write_timeout: Duration,
) -> bool {
    match tokio::time::timeout(write_timeout, sink.send(frame)).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::debug!(error = %err, "websocket write failed");
            false
        }
        Err(_) => {
            tracing::warn!(timeout_ms = write_timeout.as_millis(), "websocket write timed out");
            false
        }
    }
}
