//! In-process transport backed by tokio channels.
//!
//! The [`ChannelAcceptor`] side plays the server: each call to
//! [`accept`](ChannelAcceptor::accept) queues one connection that the next
//! [`connect`](PushTransport::connect) picks up. When nothing is queued the
//! connect attempt fails, like a refused TCP connection.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{FrameStream, PushTransport};
use crate::EngineError;

type Item = Result<Vec<u8>, EngineError>;

/// Client side of the in-process channel.
#[derive(Debug)]
pub struct ChannelTransport {
    pending: Mutex<mpsc::UnboundedReceiver<mpsc::Receiver<Item>>>,
    description: String,
}

/// Server side: queues connections for the transport.
#[derive(Debug, Clone)]
pub struct ChannelAcceptor {
    connections: mpsc::UnboundedSender<mpsc::Receiver<Item>>,
}

/// One accepted connection. Dropping it closes the stream cleanly.
#[derive(Debug)]
pub struct ServerEnd {
    tx: mpsc::Sender<Item>,
}

impl ChannelTransport {
    /// Create a connected acceptor/transport pair.
    pub fn create(description: impl Into<String>) -> (ChannelAcceptor, ChannelTransport) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ChannelAcceptor { connections: tx },
            ChannelTransport {
                pending: Mutex::new(rx),
                description: description.into(),
            },
        )
    }
}

#[async_trait]
impl PushTransport for ChannelTransport {
    async fn connect(&self) -> Result<FrameStream, EngineError> {
        let rx = self
            .pending
            .lock()
            .try_recv()
            .map_err(|_| EngineError::Transport(format!("{}: no connection available", self.description)))?;

        let frames = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(frames.boxed())
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl ChannelAcceptor {
    /// Queue a connection whose frames are buffered up to `buffer`.
    pub fn accept(&self, buffer: usize) -> Result<ServerEnd, EngineError> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        self.connections
            .send(rx)
            .map_err(|_| EngineError::ConnectionLost("transport dropped".to_string()))?;
        Ok(ServerEnd { tx })
    }
}

impl ServerEnd {
    /// Send one frame, waiting for buffer space.
    pub async fn send(&self, frame: impl Into<Vec<u8>>) -> Result<(), EngineError> {
        self.tx
            .send(Ok(frame.into()))
            .await
            .map_err(|_| EngineError::ConnectionLost("client disconnected".to_string()))
    }

    /// Send one frame without waiting.
    pub fn try_send(&self, frame: impl Into<Vec<u8>>) -> Result<(), EngineError> {
        self.tx
            .try_send(Ok(frame.into()))
            .map_err(|e| EngineError::ConnectionLost(e.to_string()))
    }

    /// Break the connection with a read error.
    pub async fn fail(self, reason: impl Into<String>) {
        // The client may already be gone; either way the connection is over.
        let _ = self
            .tx
            .send(Err(EngineError::ConnectionLost(reason.into())))
            .await;
    }

    /// Whether the client side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_without_pending_connection_fails() {
        let (_acceptor, transport) = ChannelTransport::create("test");
        let err = transport.connect().await.err().unwrap();
        assert!(matches!(err, EngineError::Transport(_)));
    }

    #[tokio::test]
    async fn test_frames_flow_until_server_end_drops() {
        let (acceptor, transport) = ChannelTransport::create("test");
        let server = acceptor.accept(8).unwrap();

        let mut frames = transport.connect().await.unwrap();
        server.send("one").await.unwrap();
        server.try_send("two").unwrap();
        drop(server);

        assert_eq!(frames.next().await.unwrap().unwrap(), b"one".to_vec());
        assert_eq!(frames.next().await.unwrap().unwrap(), b"two".to_vec());
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn test_fail_surfaces_connection_lost() {
        let (acceptor, transport) = ChannelTransport::create("test");
        let server = acceptor.accept(1).unwrap();
        let mut frames = transport.connect().await.unwrap();

        server.fail("reset by peer").await;
        assert_eq!(
            frames.next().await.unwrap(),
            Err(EngineError::ConnectionLost("reset by peer".to_string()))
        );
    }
}
