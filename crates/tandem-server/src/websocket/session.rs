//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tandem_core::ids::ConnectionId;
use tandem_core::protocol::ServerEvent;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::handler::handle_message;
use crate::metrics::{WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL};
use crate::server::AppState;

/// How long the writer gets to flush and close after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection and queues `connection-established`
/// 2. Decodes incoming text (or UTF-8 binary) frames and routes them
/// 3. Forwards queued outbound frames, with periodic Ping frames
/// 4. Drops clients that stay silent past the heartbeat timeout
/// 5. On exit, ends hosted sessions and unsubscribes everywhere else
#[instrument(skip_all, fields(conn_id = %connection_id))]
pub async fn run_ws_session(ws: WebSocket, connection_id: ConnectionId, state: AppState) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(state.config.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(connection_id.clone(), send_tx));
    let shutdown = state.shutdown.token();

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    state.broadcast.add(connection.clone());
    let _ = connection.send_event(&ServerEvent::ConnectionEstablished { connection_id });

    // Outbound forwarder with periodic Ping frames.
    let ping_every = state.config.heartbeat_interval();
    let pong_timeout = state.config.heartbeat_timeout();
    let outbound_conn = connection.clone();
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(ping_every);
        // first tick fires immediately
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive() && outbound_conn.last_pong_elapsed() > pong_timeout {
                        warn!(conn_id = %outbound_conn.id, "client unresponsive for {pong_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_conn.closed() => break,
            }
        }
        let _ = ws_tx.close().await;
        outbound_conn.close();
    });

    loop {
        let next = tokio::select! {
            () = connection.closed() => {
                debug!("connection closed by server");
                break;
            }
            () = shutdown.cancelled() => {
                debug!("server shutting down");
                break;
            }
            next = ws_rx.next() => next,
        };
        let Some(Ok(msg)) = next else { break };
        connection.mark_alive();

        // Accept text from either Text or UTF-8 Binary frames.
        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(s) => s.to_owned(),
                Err(_) => {
                    info!(len = data.len(), "received non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if let Some(reply) = handle_message(&text, &connection.id, &state.registry) {
            if !connection.send_event(&reply) {
                info!("failed to enqueue reply (channel full or closed)");
            }
        }
    }

    // Clean up
    connection.close();
    state.broadcast.remove(&connection.id);
    let ended = state.registry.remove_connection(&connection.id);
    info!(ended_sessions = ended.len(), "client disconnected");
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut outbound).await.is_err() {
        outbound.abort();
    }
}
