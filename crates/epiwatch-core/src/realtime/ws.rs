//! WebSocket live channel
//!
//! One socket per user session. The first client frame must be an
//! `authenticate` message; the server then registers presence, pushes the
//! unread-alerts resync snapshot, and pumps fan-out events until the socket
//! closes.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::{SplitStream, StreamExt};
use futures_util::SinkExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::AppState;

use super::events::{ClientMessage, LiveEvent};

/// Upgrade handler for `GET /api/v1/ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut outbound, mut inbound) = socket.split();

    let Some(user_id) = wait_for_authenticate(&mut inbound).await else {
        debug!("socket closed before authenticate");
        return;
    };

    let user = match state.users.get(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(%user_id, "authenticate from unknown user, closing socket");
            return;
        }
        Err(e) => {
            warn!(%user_id, error = %e, "directory lookup failed, closing socket");
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection_id = state.presence.authenticate(user_id, tx.clone());

    // Resync: the durable ledger is the at-least-once layer; this snapshot is
    // how a reconnecting user catches up on pushes they missed.
    match state
        .alerts
        .unread_for_user(user_id, user.role, state.resync_limit)
        .await
    {
        Ok(alerts) => {
            debug!(%user_id, count = alerts.len(), "sending resync snapshot");
            let _ = tx.send(LiveEvent::UnreadAlerts { alerts });
        }
        Err(e) => {
            warn!(%user_id, error = %e, "failed to compute resync snapshot");
        }
    }

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(%user_id, error = %e, "failed to encode live event");
                        continue;
                    }
                };
                if outbound.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            msg = inbound.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Re-authentication and other frames are ignored; the
                    // session is bound to the user that opened it.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.presence.disconnect(user_id, connection_id);
    debug!(%user_id, %connection_id, "socket closed");
}

/// Drain frames until the authenticate handshake arrives.
///
/// Unparseable frames before the handshake are ignored rather than fatal.
async fn wait_for_authenticate(inbound: &mut SplitStream<WebSocket>) -> Option<Uuid> {
    while let Some(Ok(msg)) = inbound.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Authenticate { user_id }) => return Some(user_id),
                Err(e) => debug!(error = %e, "ignoring frame before authenticate"),
            },
            Message::Close(_) => return None,
            _ => {}
        }
    }
    None
}
