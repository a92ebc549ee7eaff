//! Transport abstraction over one message-oriented socket
//!
//! The connection machinery never touches a socket type directly; it drives
//! a [`TransportHandle`] (outbound frame sender plus inbound event stream)
//! produced by a [`Transport`]. Production uses [`WsTransport`]; tests swap
//! in a channel-backed implementation.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

use marketfeed_core::{FeedError, FeedResult};

/// Close code reported when the peer sent no status at all
const NO_STATUS_CODE: u16 = 1005;

/// Events surfaced by an open transport
#[derive(Debug)]
pub enum TransportEvent {
    /// One complete text frame, in arrival order
    Frame(String),
    /// The peer closed the connection with the given close code
    Closed { code: u16 },
    /// Socket-level failure; the transport is unusable afterwards
    Error(String),
}

/// Frames accepted by an open transport
#[derive(Debug)]
pub enum OutboundFrame {
    /// One complete text frame
    Text(String),
    /// Close the connection with a normal-closure code
    Close,
}

/// Handle to one established connection.
///
/// Dropping the handle (or sending [`OutboundFrame::Close`]) tears the
/// connection down.
#[derive(Debug)]
pub struct TransportHandle {
    pub outbound: mpsc::Sender<OutboundFrame>,
    pub inbound: mpsc::Receiver<TransportEvent>,
}

/// Factory for establishing connections
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open one connection to `url`, resolving once the socket is usable.
    async fn open(&self, url: &str) -> FeedResult<TransportHandle>;
}

/// WebSocket transport backed by `tokio-tungstenite`
#[derive(Debug, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> FeedResult<TransportHandle> {
        let url =
            Url::parse(url).map_err(|e| FeedError::Transport(format!("invalid url: {e}")))?;
        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(64);
        let (inbound_tx, inbound_rx) = mpsc::channel::<TransportEvent>(256);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outbound = outbound_rx.recv() => {
                        match outbound {
                            Some(OutboundFrame::Text(text)) => {
                                if let Err(e) = write.send(Message::Text(text.into())).await {
                                    let _ = inbound_tx
                                        .send(TransportEvent::Error(e.to_string()))
                                        .await;
                                    break;
                                }
                            }
                            Some(OutboundFrame::Close) | None => {
                                let _ = write
                                    .send(Message::Close(Some(CloseFrame {
                                        code: CloseCode::Normal,
                                        reason: "".into(),
                                    })))
                                    .await;
                                break;
                            }
                        }
                    }
                    incoming = read.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                if inbound_tx
                                    .send(TransportEvent::Frame(text.to_string()))
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            Some(Ok(Message::Binary(bytes))) => {
                                match String::from_utf8(bytes.to_vec()) {
                                    Ok(text) => {
                                        if inbound_tx
                                            .send(TransportEvent::Frame(text))
                                            .await
                                            .is_err()
                                        {
                                            break;
                                        }
                                    }
                                    Err(_) => {
                                        warn!("[Feed WS] Dropping non-UTF-8 binary frame");
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if write.send(Message::Pong(data)).await.is_err() {
                                    let _ = inbound_tx
                                        .send(TransportEvent::Error(
                                            "failed to answer ping".to_string(),
                                        ))
                                        .await;
                                    break;
                                }
                            }
                            Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                            Some(Ok(Message::Close(frame))) => {
                                let code = frame
                                    .map(|f| u16::from(f.code))
                                    .unwrap_or(NO_STATUS_CODE);
                                debug!("[Feed WS] Close frame received (code {})", code);
                                let _ = inbound_tx.send(TransportEvent::Closed { code }).await;
                                break;
                            }
                            Some(Err(e)) => {
                                let _ = inbound_tx
                                    .send(TransportEvent::Error(e.to_string()))
                                    .await;
                                break;
                            }
                            None => {
                                let _ = inbound_tx
                                    .send(TransportEvent::Error("stream ended".to_string()))
                                    .await;
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(TransportHandle {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
