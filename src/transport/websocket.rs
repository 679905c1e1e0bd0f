//! WebSocket transport over `tokio-tungstenite`.
//!
//! Connects to the gateway's WebSocket endpoint and adapts the stream to
//! the [`Transport`] trait. Only text frames carry protocol traffic;
//! Ping/Pong are handled by the library and Binary frames are ignored.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{Transport, TransportRx, TransportTx};

// ============================================================================
// Constants
// ============================================================================

/// Subprotocol the gateway requires during the WebSocket handshake.
const GATEWAY_SUBPROTOCOL: &str = "janus-protocol";

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// WebSocketTransport
// ============================================================================

/// A WebSocket connection to the gateway.
///
/// # Example
///
/// ```ignore
/// use janus_client::{Session, SessionOptions, WebSocketTransport};
///
/// let transport = WebSocketTransport::connect("ws://127.0.0.1:8188/janus").await?;
/// let session = Session::new(Box::new(transport), SessionOptions::default());
/// ```
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
}

impl WebSocketTransport {
    /// Connects to the gateway at `url` and completes the handshake.
    ///
    /// The URL scheme must be `ws` or `wss`. The handshake offers the
    /// `janus-protocol` subprotocol the gateway insists on.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the URL is invalid
    /// - [`Error::WebSocket`] if the handshake fails
    pub async fn connect(url: &str) -> Result<Self> {
        let parsed =
            Url::parse(url).map_err(|e| Error::connection(format!("Invalid URL {url}: {e}")))?;

        match parsed.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::connection(format!(
                    "Unsupported URL scheme: {other}"
                )));
            }
        }

        let mut request = parsed.as_str().into_client_request()?;
        request.headers_mut().insert(
            SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static(GATEWAY_SUBPROTOCOL),
        );

        let (stream, response) = tokio_tungstenite::connect_async(request).await?;

        debug!(url, status = %response.status(), "WebSocket connection established");

        Ok(Self { stream })
    }

    /// Wraps an already-established WebSocket stream.
    #[must_use]
    pub fn from_stream(stream: WsStream) -> Self {
        Self { stream }
    }
}

impl Transport for WebSocketTransport {
    fn split(self: Box<Self>) -> (Box<dyn TransportTx>, Box<dyn TransportRx>) {
        let (write, read) = self.stream.split();
        (Box::new(WsTx { write }), Box::new(WsRx { read }))
    }
}

// ============================================================================
// WsTx
// ============================================================================

/// Write half of the WebSocket connection.
struct WsTx {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl TransportTx for WsTx {
    async fn send_raw(&mut self, message: String) -> Result<()> {
        self.write.send(Message::Text(message.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.write.close().await?;
        Ok(())
    }
}

// ============================================================================
// WsRx
// ============================================================================

/// Read half of the WebSocket connection.
struct WsRx {
    read: SplitStream<WsStream>,
}

#[async_trait]
impl TransportRx for WsRx {
    async fn receive_raw(&mut self) -> Option<String> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => return Some(text.to_string()),

                Some(Ok(Message::Close(_))) => {
                    debug!("WebSocket closed by remote");
                    return None;
                }

                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket read error");
                    return None;
                }

                None => {
                    debug!("WebSocket stream ended");
                    return None;
                }

                // Ignore Binary, Ping, Pong, Frame
                Some(Ok(_)) => {}
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
