//! WebSocket implementation of the transport seams.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_websockets::{ClientBuilder, MaybeTlsStream, Message, WebSocketStream};

use crate::transport::{Channel, Dial};

/// Dials the device's serial WebSocket. A fresh handshake per attempt.
pub struct WsDialer {
    url: String,
}

impl WsDialer {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Dial for WsDialer {
    type Conn = WsChannel;

    async fn dial(&mut self) -> anyhow::Result<WsChannel> {
        log::info!("connecting to {}", self.url);

        let (ws, resp) = ClientBuilder::new().uri(&self.url)?.connect().await?;
        log::info!("ws handshake status: {:?}", resp.status());

        Ok(WsChannel { ws })
    }
}

pub struct WsChannel {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Channel for WsChannel {
    async fn send_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.ws.send(Message::text(text.to_string())).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Option<anyhow::Result<String>> {
        loop {
            let msg = match self.ws.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(e.into())),
            };
            if let Some(text) = msg.as_text() {
                return Some(Ok(text.to_string()));
            }
            if msg.is_close() {
                return None;
            }
            // Binary and ping/pong frames are not part of the log stream.
        }
    }

    async fn shutdown(&mut self) {
        let _ = SinkExt::close(&mut self.ws).await;
    }
}
