//! Push channel transport.

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Handshake or protocol failure, including an HTTP 401 on upgrade.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Text frames from an open channel. The stream ending, or yielding an error,
/// means the channel is gone.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

/// Opens one-way push channels.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn open(&self, url: &Url) -> Result<FrameStream, TransportError>;
}

/// WebSocket transport using tokio-tungstenite. Only text frames are
/// surfaced; the client never writes application messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

#[async_trait]
impl PushTransport for WsTransport {
    async fn open(&self, url: &Url) -> Result<FrameStream, TransportError> {
        let (ws_stream, _response) = connect_async(url.as_str()).await?;

        let frames = ws_stream.filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                Ok(Message::Close(frame)) => {
                    if let Some(close_frame) = frame {
                        tracing::debug!(
                            "Server closed notification stream: code={:?}, reason='{}'",
                            close_frame.code,
                            close_frame.reason
                        );
                    }
                    None
                }
                Ok(Message::Binary(data)) => {
                    tracing::debug!("Ignoring binary frame ({} bytes)", data.len());
                    None
                }
                // Pong replies are handled by tungstenite
                Ok(_) => None,
                Err(e) => Some(Err(e.into())),
            }
        });

        Ok(frames.boxed())
    }
}
