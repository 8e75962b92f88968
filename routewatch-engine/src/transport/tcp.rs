//! Newline-delimited JSON over TCP.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

use super::{FrameStream, PushTransport};
use crate::EngineError;

/// Connects to `host:port` and treats every non-blank line as one frame.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: String,
}

impl TcpTransport {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl PushTransport for TcpTransport {
    async fn connect(&self) -> Result<FrameStream, EngineError> {
        let socket = TcpStream::connect(&self.address)
            .await
            .map_err(|e| EngineError::Transport(format!("{}: {e}", self.address)))?;

        let lines = BufReader::new(socket).lines();
        let frames = stream::unfold(lines, |mut lines| async move {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => return Some((Ok(line.into_bytes()), lines)),
                    Ok(None) => return None,
                    Err(e) => {
                        return Some((Err(EngineError::ConnectionLost(e.to_string())), lines))
                    }
                }
            }
        });

        Ok(frames.boxed())
    }

    fn description(&self) -> &str {
        &self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_reads_lines_as_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let transport = TcpTransport::new(listener.local_addr().unwrap().to_string());

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"{\"type\":\"a\"}\n\n{\"type\":\"b\"}\n")
                .await
                .unwrap();
        });

        let mut frames = transport.connect().await.unwrap();
        assert_eq!(frames.next().await.unwrap().unwrap(), b"{\"type\":\"a\"}".to_vec());
        assert_eq!(frames.next().await.unwrap().unwrap(), b"{\"type\":\"b\"}".to_vec());

        server.await.unwrap();
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = TcpTransport::new(address).connect().await.err().unwrap();
        assert!(matches!(err, EngineError::Transport(_)));
    }
}
