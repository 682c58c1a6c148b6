use crate::channel::codec::TaggedFrame;
use crate::channel::ChannelResult;
use crate::echo::EchoServer;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use std::net::SocketAddr;

pub fn router() -> Router {
    Router::new().route("/", get(websocket_handler))
}

/// Bind and serve the WebSocket echo in a background task
pub async fn spawn_websocket_echo(bind_addr: SocketAddr) -> ChannelResult<EchoServer> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router()).await {
            tracing::error!("WebSocket echo stopped: {}", e);
        }
    });

    tracing::info!("WebSocket echo listening on ws://{}", local_addr);
    Ok(EchoServer::new(local_addr, task))
}

async fn websocket_handler(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(handle_websocket)
}

async fn handle_websocket(mut socket: WebSocket) {
    while let Some(message) = socket.recv().await {
        let reply = match message {
            Ok(Message::Text(text)) => Message::Text(stamp_reply(&text)),
            Ok(Message::Binary(data)) => Message::Binary(data),
            Ok(Message::Close(_)) => return,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!("WebSocket echo receive failed: {}", e);
                return;
            }
        };

        if socket.send(reply).await.is_err() {
            return;
        }
    }
}

/// Echo a `{"c":N}` request as `{"c":N,"ts":<unix ms>}`; anything else verbatim
pub fn stamp_reply(request: &str) -> String {
    let Ok(mut frame) = serde_json::from_str::<TaggedFrame>(request) else {
        return request.to_string();
    };
    frame.ts = Some(chrono::Utc::now().timestamp_millis());
    serde_json::to_string(&frame).unwrap_or_else(|_| request.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::WireFormat;

    #[test]
    fn test_stamp_reply_keeps_tag() {
        let reply = stamp_reply(r#"{"c":17}"#);
        let frame: TaggedFrame = serde_json::from_str(&reply).unwrap();
        assert_eq!(frame.c, 17);
        assert!(frame.ts.is_some());
        assert_eq!(WireFormat::Json.decode_tag(reply.as_bytes()), Some(17));
    }

    #[test]
    fn test_stamp_reply_passes_through_untagged() {
        assert_eq!(stamp_reply("hello"), "hello");
    }
}
