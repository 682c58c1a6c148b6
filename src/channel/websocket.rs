use crate::channel::codec::WireFormat;
use crate::channel::error::{ChannelError, ChannelResult};
use crate::channel::{FrameSink, OpenChannel, Transport};
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Message-framed channel over WebSocket carrying JSON tags
#[derive(Debug, Default, Clone)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

pub struct WebSocketSink {
    sink: SplitSink<WsStream, Message>,
}

impl Transport for WebSocketTransport {
    type Sink = WebSocketSink;

    fn wire_format(&self) -> WireFormat {
        WireFormat::Json
    }

    async fn open(&self, address: &str) -> ChannelResult<OpenChannel<WebSocketSink>> {
        if !(address.starts_with("ws://") || address.starts_with("wss://")) {
            return Err(ChannelError::InvalidAddress(address.to_string()));
        }

        let (stream, _) = tokio_tungstenite::connect_async(address)
            .await
            .map_err(|e| ChannelError::ConnectFailed(format!("{address}: {e}")))?;
        let (sink, mut stream) = stream.split();
        let (tx, inbound) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let frame = match message {
                    Ok(Message::Text(text)) => Bytes::copy_from_slice(text.as_bytes()),
                    Ok(Message::Binary(data)) => data,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::debug!("WebSocket read ended: {}", e);
                        break;
                    }
                };
                if tx.send(frame).is_err() {
                    break;
                }
            }
        });

        Ok(OpenChannel {
            sink: WebSocketSink { sink },
            inbound,
        })
    }
}

impl FrameSink for WebSocketSink {
    async fn send(&mut self, frame: Bytes) -> ChannelResult<()> {
        let message = match std::str::from_utf8(&frame) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(frame),
        };
        self.sink.send(message).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.sink.close().await {
            tracing::debug!("WebSocket close failed: {}", e);
        }
    }
}
