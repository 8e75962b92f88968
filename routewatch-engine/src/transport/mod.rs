//! Push channel transports.
//!
//! A transport opens one connection at a time and yields the raw frames
//! received on it. Reconnecting is the supervisor's job, not the
//! transport's.

mod channel;
mod tcp;
mod ws;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

pub use channel::{ChannelAcceptor, ChannelTransport, ServerEnd};
pub use tcp::TcpTransport;
pub use ws::WsTransport;

use crate::EngineError;

/// Frames received on one open connection. The stream ends when the peer
/// closes the connection cleanly.
pub type FrameStream = BoxStream<'static, Result<Vec<u8>, EngineError>>;

/// Something that can open the push channel.
#[async_trait]
pub trait PushTransport: Send + Sync + Debug {
    /// Open a new connection.
    async fn connect(&self) -> Result<FrameStream, EngineError>;

    /// Short human-readable description (e.g. the peer address).
    fn description(&self) -> &str;
}

/// Transport for a configured push address.
///
/// `ws://` and `wss://` URLs get a [`WsTransport`]; anything else is taken
/// as the `host:port` of a [`TcpTransport`].
pub fn for_address(address: &str) -> Arc<dyn PushTransport> {
    if address.starts_with("ws://") || address.starts_with("wss://") {
        Arc::new(WsTransport::new(address))
    } else {
        Arc::new(TcpTransport::new(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_scheme_selects_transport() {
        let ws = for_address("ws://localhost:8080/ws");
        assert_eq!(ws.description(), "ws://localhost:8080/ws");
        assert!(format!("{ws:?}").starts_with("WsTransport"));

        let tcp = for_address("localhost:8081");
        assert_eq!(tcp.description(), "localhost:8081");
        assert!(format!("{tcp:?}").starts_with("TcpTransport"));
    }
}
