//! WebSocket accelerometer stream.
//!
//! After the subscription request is sent, the socket carries the JSON-RPC reply to
//! that request followed by an unbounded series of sample batches. Decoding is left to
//! [`decode_stream_message`]; this module only moves frames.

use crate::acquisition::ingest::{SampleStream, StreamMessage};
use crate::error::{AppResult, DaqError};
use crate::moonraker::protocol::{decode_stream_message, subscribe_request};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Subscribed accelerometer dump stream.
pub struct AdxlStreamClient {
    socket: Socket,
    url: String,
}

impl AdxlStreamClient {
    /// Open the WebSocket at `url`.
    pub async fn connect(url: &str) -> AppResult<Self> {
        let (socket, _response) =
            connect_async(url)
                .await
                .map_err(|e| DaqError::StreamConnect {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
        tracing::info!(url, "Connected to websocket");
        Ok(Self {
            socket,
            url: url.to_string(),
        })
    }

    /// Request the raw dump of `sensor`.
    pub async fn subscribe(&mut self, sensor: &str) -> AppResult<()> {
        self.socket
            .send(Message::Text(subscribe_request(sensor)))
            .await?;
        tracing::debug!(sensor, url = %self.url, "Subscription sent");
        Ok(())
    }

    /// Connect and subscribe in one step.
    pub async fn open(url: String, sensor: String) -> AppResult<Self> {
        let mut client = Self::connect(&url).await?;
        client.subscribe(&sensor).await?;
        Ok(client)
    }
}

#[async_trait]
impl SampleStream for AdxlStreamClient {
    async fn next_message(&mut self) -> AppResult<StreamMessage> {
        match self.socket.next().await {
            None => Err(DaqError::StreamClosed(format!("{} ended", self.url))),
            Some(Err(e)) => Err(e.into()),
            Some(Ok(Message::Text(text))) => decode_stream_message(&text),
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => decode_stream_message(text),
                Err(_) => Ok(StreamMessage::Malformed("binary frame is not UTF-8".to_string())),
            },
            Some(Ok(Message::Close(frame))) => Err(DaqError::StreamClosed(match frame {
                Some(frame) => format!("closed by peer: {} {}", frame.code, frame.reason),
                None => "closed by peer".to_string(),
            })),
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                Ok(StreamMessage::Control)
            }
        }
    }
}
