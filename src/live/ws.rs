//! WebSocket transport for live sessions

use super::protocol::{ClientMessage, ServerMessage};
use super::session::{SessionId, SessionManager};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

pub async fn ws_handler(ws: WebSocketUpgrade, State(sessions): State<SessionManager>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, sessions))
}

async fn handle_socket(socket: WebSocket, sessions: SessionManager) {
    let (id, outbound) = sessions.connect();
    let (sink, mut stream) = socket.split();

    let writer = tokio::spawn(write_loop(id, sink, outbound));

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(session = %id, error = %e, "WebSocket read failed");
                break;
            }
        };

        match frame {
            Message::Text(text) => handle_text(&sessions, id, &text).await,
            Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => handle_text(&sessions, id, text).await,
                Err(_) => reply_error(&sessions, id, "Binary frames must be UTF-8 JSON"),
            },
            Message::Close(_) => break,
            // Ping/pong are answered by the transport
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    sessions.disconnect(id);
    writer.abort();
}

async fn handle_text(sessions: &SessionManager, id: SessionId, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => sessions.handle(id, message).await,
        Err(e) => {
            tracing::debug!(session = %id, error = %e, "Malformed live message");
            reply_error(sessions, id, &format!("Malformed message: {}", e));
        }
    }
}

fn reply_error(sessions: &SessionManager, id: SessionId, message: &str) {
    sessions.push(id, ServerMessage::error(message));
}

async fn write_loop(
    id: SessionId,
    mut sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(message) = outbound.recv().await {
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(session = %id, message = message.name(), error = %e, "Failed to encode live message");
                continue;
            }
        };

        if sink.send(Message::Text(text)).await.is_err() {
            break;
        }
    }

    let _ = sink.close().await;
}
