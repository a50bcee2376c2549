//! events delivered by the protocol transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jid::Jid;

/// metadata the server attaches to messages sent from one of our own devices.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceSentMeta {
    #[serde(default)]
    pub destination_jid: String,
}

/// who and where a message came from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageInfo {
    pub id: String,
    pub chat: Jid,
    pub sender: Jid,
    /// the sender's other address (lid vs phone number), when known
    pub sender_alt: Jid,
    /// the recipient's other address for messages we sent, when known
    pub recipient_alt: Jid,
    pub is_from_me: bool,
    pub is_group: bool,
    pub timestamp: DateTime<Utc>,
    pub device_sent_meta: Option<DeviceSentMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtendedTextMessage {
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageMessage {
    pub caption: Option<String>,
}

/// message payload. only the text-bearing parts are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub conversation: Option<String>,
    pub extended_text: Option<ExtendedTextMessage>,
    pub image: Option<ImageMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub info: MessageInfo,
    pub message: Message,
}

/// connection and message events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Connected,
    Disconnected,
    LoggedOut {
        #[serde(default)]
        reason: String,
    },
    Message(Box<MessageEvent>),
    /// the transport produced new session credentials to persist
    SessionUpdated { session: String },
}

/// events of the qr pairing flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PairEvent {
    /// a new code to show as qr
    Code { code: String },
    /// the phone scanned the code; `jid` is our new device address
    Success { jid: Jid },
    Timeout,
    Error { message: String },
}
