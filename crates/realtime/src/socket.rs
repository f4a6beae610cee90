//! WebSocket transport glue.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::connection::{connect, disconnect, handle_client_event};
use crate::events::{ClientEvent, ServerEvent};
use crate::state::RealtimeState;

#[derive(Debug, Deserialize)]
pub struct SocketQuery {
    token: Option<String>,
}

/// `GET /ws?token=...` upgrade handler.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<SocketQuery>,
    State(state): State<RealtimeState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.token))
}

async fn handle_socket(socket: WebSocket, state: RealtimeState, token: Option<String>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(state.config.outbound_queue_size);

    let sender_task = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to encode outbound event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        // Flush a close frame where possible
        let _ = ws_sender.close().await;
    });

    // Authenticate before anything else; a refused connection gets one
    // error frame with a machine-readable code, then the close.
    let ctx = match connect(&state, token.as_deref(), out_tx.clone()).await {
        Ok(ctx) => ctx,
        Err(err) => {
            warn!(error = %err, "connection refused");
            let _ = out_tx.send(ServerEvent::error(&err)).await;
            drop(out_tx);
            let _ = sender_task.await;
            return;
        }
    };

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    if let Err(err) = handle_client_event(&state, &ctx, event).await {
                        debug!(user = ctx.user.id, error = %err, "event refused");
                        ctx.send(ServerEvent::error(&err)).await;
                    }
                }
                Err(err) => {
                    debug!(user = ctx.user.id, error = %err, "unparseable client frame");
                    ctx.send(ServerEvent::Error {
                        message: "Invalid event format".to_string(),
                        code: None,
                    })
                    .await;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                // ping/pong/binary are handled by the transport
            }
            Err(err) => {
                debug!(user = ctx.user.id, error = %err, "websocket receive error");
                break;
            }
        }
    }

    disconnect(&state, &ctx).await;
    drop(out_tx);
    drop(ctx);
    let _ = sender_task.await;
}
