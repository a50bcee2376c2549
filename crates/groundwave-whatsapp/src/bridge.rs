//! transport talking to an external protocol bridge over a websocket.
//!
//! the bridge owns the actual whatsapp multi-device session. we send it
//! json control frames and it streams pairing and connection events back:
//!
//! ```text
//! -> {"type":"connect","device":{..},"trust_identity":true}
//! <- {"type":"pair","data":{"kind":"code","code":"2@.."}}
//! <- {"type":"event","data":{"kind":"connected"}}
//! -> {"type":"disconnect"}
//! ```

use futures_util::future::BoxFuture;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{FutureExt, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::error::WhatsAppError;
use crate::event::{Event, PairEvent};
use crate::store::DeviceStore;
use crate::transport::{ConnectOptions, Session, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CHANNEL_CAPACITY: usize = 64;

/// frames we send to the bridge.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Connect {
        device: DeviceStore,
        trust_identity: bool,
    },
    Disconnect,
    Logout,
}

/// frames the bridge sends us.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BridgeFrame {
    Pair(PairEvent),
    Event(Event),
}

struct Connection {
    sink: SplitSink<WsStream, Message>,
    reader: JoinHandle<()>,
}

pub struct BridgeTransport {
    url: String,
    conn: Mutex<Option<Connection>>,
}

impl BridgeTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            conn: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn open(
        &self,
        device: DeviceStore,
        options: ConnectOptions,
    ) -> Result<Session, WhatsAppError> {
        let mut conn = self.conn.lock().await;
        if let Some(old) = conn.take() {
            let _ = close(old, None).await;
        }

        let (ws, _) = connect_async(self.url.as_str()).await?;
        let (mut sink, stream) = ws.split();

        let paired = device.is_paired();
        let hello = serde_json::to_string(&ClientFrame::Connect {
            device,
            trust_identity: options.trust_identity,
        })?;
        sink.send(Message::text(hello)).await?;

        let (events_tx, events) = mpsc::channel(CHANNEL_CAPACITY);
        let (pairing_tx, pairing) = if paired {
            (None, None)
        } else {
            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
            (Some(tx), Some(rx))
        };
        let reader = tokio::spawn(read_frames(stream, events_tx, pairing_tx));

        info!(url = %self.url, paired, "connected to whatsapp bridge");
        *conn = Some(Connection { sink, reader });
        Ok(Session { events, pairing })
    }
}

/// send an optional goodbye frame, then tear the connection down.
async fn close(mut conn: Connection, frame: Option<ClientFrame>) -> Result<(), WhatsAppError> {
    let sent = match frame {
        Some(frame) => {
            let text = serde_json::to_string(&frame)?;
            conn.sink.send(Message::text(text)).await.map_err(WhatsAppError::from)
        }
        None => Ok(()),
    };
    if let Err(e) = conn.sink.close().await {
        debug!(error = %e, "bridge close failed");
    }
    conn.reader.abort();
    sent
}

/// dispatch bridge frames until the socket ends. dropping the senders on
/// return closes the session streams.
async fn read_frames(
    mut stream: SplitStream<WsStream>,
    events: mpsc::Sender<Event>,
    mut pairing: Option<mpsc::Sender<PairEvent>>,
) {
    while let Some(msg) = stream.next().await {
        let frame: BridgeFrame = match msg {
            Ok(Message::Text(text)) => match serde_json::from_str(text.as_str()) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "ignoring malformed bridge frame");
                    continue;
                }
            },
            Ok(Message::Binary(data)) => match serde_json::from_slice(&data) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "ignoring malformed bridge frame");
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "bridge connection failed");
                break;
            }
        };

        match frame {
            BridgeFrame::Pair(event) => {
                let done = matches!(
                    event,
                    PairEvent::Success { .. } | PairEvent::Timeout | PairEvent::Error { .. }
                );
                if let Some(tx) = &pairing
                    && tx.send(event).await.is_err()
                {
                    debug!("pairing receiver gone");
                }
                if done {
                    pairing = None;
                }
            }
            BridgeFrame::Event(event) => {
                if events.send(event).await.is_err() {
                    debug!("event receiver gone, closing bridge reader");
                    return;
                }
            }
        }
    }
    debug!("bridge stream ended");
}

impl Transport for BridgeTransport {
    fn connect(
        &self,
        device: DeviceStore,
        options: ConnectOptions,
    ) -> BoxFuture<'_, Result<Session, WhatsAppError>> {
        self.open(device, options).boxed()
    }

    fn disconnect(&self) -> BoxFuture<'_, ()> {
        async move {
            let conn = self.conn.lock().await.take();
            if let Some(conn) = conn
                && let Err(e) = close(conn, Some(ClientFrame::Disconnect)).await
            {
                debug!(error = %e, "bridge disconnect frame not delivered");
            }
        }
        .boxed()
    }

    fn logout(&self) -> BoxFuture<'_, Result<(), WhatsAppError>> {
        async move {
            let conn = self.conn.lock().await.take();
            match conn {
                Some(conn) => close(conn, Some(ClientFrame::Logout)).await,
                None => Err(WhatsAppError::Transport(
                    "not connected to bridge".to_string(),
                )),
            }
        }
        .boxed()
    }
}
