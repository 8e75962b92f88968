//! JSON frames over a WebSocket.

use async_trait::async_trait;
use futures_util::future;
use futures_util::stream::StreamExt;
use tokio_tungstenite::tungstenite::Message;

use super::{FrameStream, PushTransport};
use crate::EngineError;

/// Connects to a `ws://` URL (e.g. `ws://localhost:8080/ws`) and yields
/// every text or binary message as one frame.
///
/// Control messages are not frames. A close message ends the stream
/// cleanly; a dropped socket ends it with an error.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PushTransport for WsTransport {
    async fn connect(&self) -> Result<FrameStream, EngineError> {
        let (socket, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| EngineError::Transport(format!("{}: {e}", self.url)))?;

        let frames = socket
            .take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)))))
            .filter_map(|message| async move {
                match message {
                    Ok(Message::Text(text)) => Some(Ok(text.into_bytes())),
                    Ok(Message::Binary(data)) => Some(Ok(data)),
                    Ok(_) => None,
                    Err(e) => Some(Err(EngineError::ConnectionLost(e.to_string()))),
                }
            });

        Ok(frames.boxed())
    }

    fn description(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_reads_messages_as_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(Message::Text(r#"{"type":"a"}"#.to_string()))
                .await
                .unwrap();
            ws.send(Message::Ping(vec![1])).await.unwrap();
            ws.send(Message::Binary(br#"{"type":"b"}"#.to_vec()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        });

        let transport = WsTransport::new(url.clone());
        assert_eq!(transport.description(), url);

        let mut frames = transport.connect().await.unwrap();
        assert_eq!(frames.next().await.unwrap().unwrap(), br#"{"type":"a"}"#.to_vec());
        assert_eq!(frames.next().await.unwrap().unwrap(), br#"{"type":"b"}"#.to_vec());
        assert!(frames.next().await.is_none());

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        drop(listener);

        let err = WsTransport::new(url).connect().await.err().unwrap();
        assert!(matches!(err, EngineError::Transport(_)));
    }
}
