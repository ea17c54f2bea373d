//! Per-connection WebSocket processing.
//!
//! Each socket is split into a reader loop, which turns text frames into
//! session events, and a writer task, which drains the connection's outbox.
//! A server-side disconnect cancels the reader; the writer flushes whatever
//! is still queued (typically an `internal_error`) before closing.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::select;
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Instrument};

use crate::pipeline::{Outbound, Transport};
use crate::reliability::metrics as service_metrics;
use crate::server::protocol;
use crate::server::AppState;
use crate::types::SessionId;

/// Serve one WebSocket connection until either side closes it.
pub async fn serve_socket(socket: WebSocket, state: Arc<AppState>) {
    let id = SessionId::random();
    let span = tracing::info_span!("session", session_id = %id);
    serve(socket, state, id).instrument(span).await
}

async fn serve(socket: WebSocket, state: Arc<AppState>, id: SessionId) {
    let handle = state.connections.open(id.clone());
    state.metrics.connection_opened();
    service_metrics::record_websocket_connection();
    info!("Connection opened");

    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(write_loop(sink, handle.outbox).in_current_span());
    let cancel = handle.cancel;

    loop {
        select! {
            _ = cancel.cancelled() => {
                debug!("Connection cancelled by server");
                break;
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        service_metrics::record_websocket_message();
                        match protocol::parse_event(&text) {
                            Ok(event) => state.sessions.handle(&id, event).await,
                            Err(e) => reject(&state, &id, &e.to_string()).await,
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        reject(&state, &id, "binary frames are not accepted").await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Connection closed by client");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Disconnect event: drop the analyzer, then the connection.
    state.sessions.disconnect(&id);
    state.connections.close(&id);
    if writer.await.is_err() {
        warn!("Writer task panicked");
    }

    state.metrics.connection_closed();
    service_metrics::record_websocket_disconnection();
    info!("Connection closed");
}

async fn reject(state: &AppState, id: &SessionId, reason: &str) {
    warn!(reason, "Rejected client frame");
    let message = format!("Malformed event: {}", reason);
    if let Err(e) = state
        .connections
        .emit(id, Outbound::InternalError(message))
        .await
    {
        debug!(error = %e, "Could not report rejected frame");
    }
}

/// Forward queued payloads to the socket until the outbox closes.
///
/// The outbox closes once the connection leaves the table, after everything
/// sent before that has been yielded.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbox: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(outbound) = outbox.recv().await {
        if let Err(e) = sink.send(protocol::to_message(outbound)).await {
            debug!(error = %e, "Socket write failed");
            return;
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}

