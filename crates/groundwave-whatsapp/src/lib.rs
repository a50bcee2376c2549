//! whatsapp linked-device support for groundwave.
//!
//! [`WhatsAppClient`] drives pairing and the connection lifecycle over a
//! pluggable [`Transport`]; [`chat_candidate`] decides which incoming
//! messages become contact chat entries.

mod bridge;
mod client;
mod error;
mod event;
mod ingest;
mod jid;
mod memory;
mod phone;
mod qr;
mod store;
mod transport;

pub use bridge::{BridgeFrame, BridgeTransport, ClientFrame};
pub use client::{ClientOptions, MessageHandler, Status, StatusSnapshot, WhatsAppClient};
pub use error::WhatsAppError;
pub use event::{
    DeviceSentMeta, Event, ExtendedTextMessage, ImageMessage, Message, MessageEvent, MessageInfo,
    PairEvent,
};
pub use ingest::{
    ChatCandidate, IMAGE_PREFIX, chat_candidate, extract_text, is_outgoing,
    resolve_other_party_jid,
};
pub use jid::{
    DEFAULT_USER_SERVER, GROUP_SERVER, HIDDEN_USER_SERVER, HOSTED_LID_SERVER, Jid,
    LEGACY_USER_SERVER,
};
pub use memory::{MemoryContainer, MemoryTransport};
pub use phone::{MIN_SUFFIX_MATCH_DIGITS, normalize_phone, phone_matches};
pub use qr::{QR_SIZE, render_qr_png_base64};
pub use store::{DeviceContainer, DeviceStore};
pub use transport::{ConnectOptions, Session, Transport};

/// result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, WhatsAppError>;
