//! WebSocket transport for the relay
//!
//! Each socket gets a `ConnectionId`, an outbox, and two halves: a writer that
//! drains the outbox and a reader that feeds frames to the relay in order.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use courier_relay::ConnectionId;
use futures::{sink::SinkExt, stream::StreamExt};
use std::ops::ControlFlow;
use tracing::{debug, info, warn};

use crate::AppState;

pub async fn websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn = ConnectionId::new();
    state.metrics.connection_opened();
    state.relay.on_connection_open(conn);
    let mut outbox = state
        .outboxes
        .register(conn, state.relay_config.outbox_capacity);
    info!(%conn, "websocket client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task to send queued frames to the WebSocket
    let sender_task = async move {
        while let Some(frame) = outbox.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    };

    // Task to handle incoming frames
    let input_state = state.clone();
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            let flow = match msg {
                Ok(Message::Text(text)) => handle_frame(&input_state, conn, text.as_str().as_bytes()),
                Ok(Message::Binary(data)) => handle_frame(&input_state, conn, &data),
                Ok(Message::Close(_)) => break,
                // Protocol-level ping/pong is answered by axum
                Ok(_) => ControlFlow::Continue(()),
                Err(e) => {
                    debug!(%conn, error = %e, "websocket receive error");
                    break;
                }
            };
            if flow.is_break() {
                break;
            }
        }
    };

    tokio::select! {
        _ = sender_task => {
            debug!(%conn, "websocket sender ended");
        }
        _ = input_task => {
            debug!(%conn, "websocket receiver ended");
        }
        _ = state.shutdown.cancelled() => {
            debug!(%conn, "server shutting down");
        }
    }

    // Unbind before anything else can route to this connection
    let nickname = state.relay.on_connection_close(conn);
    state.outboxes.remove(conn);
    state.metrics.connection_closed();
    info!(%conn, nickname = ?nickname, "websocket client disconnected");
}

/// Runs one frame through the relay and queues the resulting deliveries.
fn handle_frame(state: &AppState, conn: ConnectionId, raw: &[u8]) -> ControlFlow<()> {
    state.metrics.frame_received();

    match state.relay.on_frame(conn, raw) {
        Ok(deliveries) => {
            state.outboxes.dispatch(deliveries, &state.metrics);
            ControlFlow::Continue(())
        }
        Err(e) if e.is_routing() => {
            state.metrics.frame_unrouted();
            debug!(%conn, code = e.error_code(), "dropping frame: {}", e);
            ControlFlow::Continue(())
        }
        Err(e) => {
            state.metrics.frame_malformed();
            warn!(%conn, code = e.error_code(), "failed to handle frame: {}", e);
            if state.relay_config.close_on_malformed {
                info!(%conn, "closing connection after malformed frame");
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }
    }
}
