//! error types for groundwave-whatsapp

use thiserror::Error;

/// errors from the whatsapp client and its collaborators.
#[derive(Debug, Error)]
pub enum WhatsAppError {
    /// reconnect was asked for without a paired device
    #[error("no existing session to reconnect")]
    NoSession,

    /// the device store could not be loaded or saved
    #[error("device store error: {0}")]
    Store(String),

    /// the protocol transport failed
    #[error("transport error: {0}")]
    Transport(String),

    /// the pairing code could not be rendered
    #[error("failed to render qr code: {0}")]
    Qr(String),

    /// a jid string did not parse
    #[error("invalid jid '{0}'")]
    InvalidJid(String),

    /// the message handler rejected an event
    #[error("message handler failed: {0}")]
    Handler(String),

    /// websocket failure talking to the protocol bridge
    #[error("bridge connection error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// a bridge frame did not (de)serialize
    #[error("invalid bridge frame: {0}")]
    Frame(#[from] serde_json::Error),
}
