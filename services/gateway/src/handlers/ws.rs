use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::auth::{Credentials, HandshakeQuery};
use crate::protocol::{Outbound, ServerEvent};
use crate::state::AppState;

/// GET /v1/ws?token=JWT&userId=ID
///
/// Always upgrades. Authentication runs on the upgraded socket so a rejected
/// client still receives an `error` frame and a specific close code.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<HandshakeQuery>,
    headers: HeaderMap,
) -> Response {
    let credentials = Credentials::from_handshake(query, &headers);
    ws.on_upgrade(move |socket| handle_socket(socket, state, credentials))
}

async fn handle_socket(socket: WebSocket, state: AppState, credentials: Credentials) {
    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Outbound>();
    let mut writer = tokio::spawn(writer_task(sink, rx));

    let info = match state.manager.connect(tx.clone(), credentials).await {
        Ok(info) => info,
        Err(err) => {
            let _ = tx.send(Outbound::Event(ServerEvent::error(&err.to_payload())));
            let _ = tx.send(Outbound::Close {
                code: err.close_code(),
                reason: err.code().to_string(),
            });
            drop(tx);
            let _ = writer.await;
            return;
        }
    };
    // The session owns the transport from here; the writer ends when it is
    // dropped or a close frame goes out.
    drop(tx);

    let caller = state.router.caller(&info);

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    state.router.dispatch(&caller, text.as_str()).await;
                }
                Some(Ok(Message::Binary(_))) => {
                    debug!(user_id = %info.user_id, "ignoring binary frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(user_id = %info.user_id, reason = ?frame, "client initiated close");
                    break;
                }
                // Ping and pong are answered by the protocol layer
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(user_id = %info.user_id, error = %e, "websocket receive error");
                    break;
                }
                None => {
                    debug!(user_id = %info.user_id, "websocket stream ended");
                    break;
                }
            },
            _ = &mut writer => {
                debug!(user_id = %info.user_id, "writer finished");
                break;
            }
        }
    }

    state.manager.disconnect(info.connection_id);
    writer.abort();
}

/// Owns the sink. Drains the session's outbound queue until a close frame
/// is sent or every sender is gone.
async fn writer_task(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Event(event) => {
                let text = match event.to_text() {
                    Ok(text) => text,
                    Err(e) => {
                        error!(event = event.event.as_str(), error = %e, "failed to serialize frame");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            Outbound::Close { code, reason } => {
                let _ = sink
                    .send(Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })))
                    .await;
                break;
            }
        }
    }
    let _ = sink.close().await;
}
