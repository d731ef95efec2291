//! WebSocket transport implementation
//!
//! Frames are JSON text messages. Binary frames from non-conforming
//! clients are accepted leniently and handed up as-is.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        handshake::server::{Request as HsRequest, Response as HsResponse},
        http::HeaderValue,
        protocol::Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{
    Transport, TransportEvent, TransportReceiver, TransportSender, TransportServer,
};

use airwave_core::WS_SUBPROTOCOL;

/// WebSocket configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Subprotocol to negotiate
    pub subprotocol: String,
    /// Outbound queue depth per connection
    pub send_queue: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            subprotocol: WS_SUBPROTOCOL.to_string(),
            send_queue: 100,
        }
    }
}

/// WebSocket transport (client side)
pub struct WebSocketTransport;

/// WebSocket sender
pub struct WebSocketSender {
    tx: mpsc::Sender<WsMessage>,
    connected: Arc<Mutex<bool>>,
}

#[async_trait]
impl TransportSender for WebSocketSender {
    async fn send(&self, data: Bytes) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let text = String::from_utf8(data.to_vec())
            .map_err(|e| TransportError::InvalidFrame(e.to_string()))?;
        self.tx
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    async fn close(&self) -> Result<()> {
        let _ = self.tx.send(WsMessage::Close(None)).await;
        *self.connected.lock() = false;
        Ok(())
    }
}

/// WebSocket receiver
pub struct WebSocketReceiver {
    rx: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
impl TransportReceiver for WebSocketReceiver {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// Bridge one side of an upgraded stream into sender/receiver halves.
fn spawn_stream_tasks<S>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    queue: usize,
) -> (WebSocketSender, WebSocketReceiver)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let (write, read) = ws_stream.split();

    let (send_tx, mut send_rx) = mpsc::channel::<WsMessage>(queue);
    let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(queue);

    let connected = Arc::new(Mutex::new(true));
    let connected_write = connected.clone();
    let connected_read = connected.clone();

    // Writer task
    tokio::spawn(async move {
        let mut write = write;
        while let Some(msg) = send_rx.recv().await {
            if let Err(e) = write.send(msg).await {
                error!("WebSocket write error: {}", e);
                break;
            }
        }
        *connected_write.lock() = false;
    });

    // Reader task
    tokio::spawn(async move {
        let mut read = read;

        let _ = event_tx.send(TransportEvent::Connected).await;

        loop {
            // Stop holding the read half once the consumer is gone,
            // otherwise the TCP connection stays open after a drop.
            let result = tokio::select! {
                _ = event_tx.closed() => break,
                next = read.next() => match next {
                    Some(result) => result,
                    None => break,
                },
            };

            match result {
                Ok(msg) => match msg {
                    WsMessage::Text(text) => {
                        let _ = event_tx.send(TransportEvent::Data(Bytes::from(text))).await;
                    }
                    WsMessage::Binary(data) => {
                        warn!("binary frame received, passing through");
                        let _ = event_tx.send(TransportEvent::Data(Bytes::from(data))).await;
                    }
                    WsMessage::Ping(_) | WsMessage::Pong(_) => {
                        // Ping replies are handled by tungstenite
                        debug!("websocket keepalive frame");
                    }
                    WsMessage::Close(frame) => {
                        let reason = frame.map(|f| f.reason.to_string());
                        info!("WebSocket closed: {:?}", reason);
                        let _ = event_tx.send(TransportEvent::Disconnected { reason }).await;
                        break;
                    }
                    WsMessage::Frame(_) => {}
                },
                Err(e) => {
                    let _ = event_tx.send(TransportEvent::Error(e.to_string())).await;
                    let _ = event_tx
                        .send(TransportEvent::Disconnected {
                            reason: Some(e.to_string()),
                        })
                        .await;
                    break;
                }
            }
        }

        *connected_read.lock() = false;
    });

    (
        WebSocketSender {
            tx: send_tx,
            connected,
        },
        WebSocketReceiver { rx: event_rx },
    )
}

#[async_trait]
impl Transport for WebSocketTransport {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn connect(url: &str) -> Result<(Self::Sender, Self::Receiver)> {
        info!("Connecting to WebSocket: {}", url);

        // into_client_request fills in the mandatory handshake headers;
        // we only add the subprotocol on top.
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(WS_SUBPROTOCOL));

        let (ws_stream, response) = connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        debug!("WebSocket connected, response: {:?}", response.status());

        Ok(spawn_stream_tasks(
            ws_stream,
            WebSocketConfig::default().send_queue,
        ))
    }
}

/// WebSocket server
pub struct WebSocketServer {
    listener: tokio::net::TcpListener,
    config: WebSocketConfig,
}

impl WebSocketServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!("WebSocket server listening on {}", addr);

        Ok(Self {
            listener,
            config: WebSocketConfig::default(),
        })
    }

    pub fn with_config(mut self, config: WebSocketConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl TransportServer for WebSocketServer {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn accept(&mut self) -> Result<(Self::Sender, Self::Receiver, SocketAddr)> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        debug!("Accepted TCP connection from {}", addr);

        // Upgrade with subprotocol negotiation
        let subprotocol = self.config.subprotocol.clone();
        let ws_stream = tokio_tungstenite::accept_hdr_async(
            stream,
            |req: &HsRequest, mut response: HsResponse| {
                if let Some(protocols) = req.headers().get("Sec-WebSocket-Protocol") {
                    if let Ok(protocols_str) = protocols.to_str() {
                        let requested: Vec<&str> =
                            protocols_str.split(',').map(|s| s.trim()).collect();
                        if requested.contains(&subprotocol.as_str()) {
                            if let Ok(value) = subprotocol.parse() {
                                response
                                    .headers_mut()
                                    .insert("Sec-WebSocket-Protocol", value);
                            }
                        }
                    }
                }
                Ok(response)
            },
        )
        .await
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!("WebSocket client connected from {}", addr);

        let (sender, receiver) = spawn_stream_tasks(ws_stream, self.config.send_queue);
        Ok((sender, receiver, addr))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(TransportError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_airwave_subprotocol() {
        let config = WebSocketConfig::default();
        assert_eq!(config.subprotocol, "airwave.v1");
    }

    #[tokio::test]
    async fn loopback_text_round_trip() {
        let mut server = WebSocketServer::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        let accept = tokio::spawn(async move { server.accept().await.unwrap() });

        let (client_tx, mut client_rx) =
            WebSocketTransport::connect(&format!("ws://127.0.0.1:{port}"))
                .await
                .unwrap();
        let (server_tx, mut server_rx, _) = accept.await.unwrap();

        client_tx.send(Bytes::from("{\"type\":\"ping\"}")).await.unwrap();
        loop {
            match server_rx.recv().await {
                Some(TransportEvent::Data(data)) => {
                    assert_eq!(&data[..], b"{\"type\":\"ping\"}");
                    break;
                }
                Some(TransportEvent::Connected) => continue,
                other => panic!("unexpected event: {other:?}"),
            }
        }

        server_tx.send(Bytes::from("{\"type\":\"pong\"}")).await.unwrap();
        loop {
            match client_rx.recv().await {
                Some(TransportEvent::Data(data)) => {
                    assert_eq!(&data[..], b"{\"type\":\"pong\"}");
                    break;
                }
                Some(TransportEvent::Connected) => continue,
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }
}
