//! device credentials and their persistence.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::WhatsAppError;
use crate::jid::Jid;

/// the linked-device state of this installation.
///
/// `id` is set once a phone has scanned the pairing code. `session` is the
/// opaque credential blob the transport hands back and expects on the next
/// connect.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceStore {
    pub id: Option<Jid>,
    pub initialized: bool,
    pub session: Option<String>,
}

impl DeviceStore {
    pub fn is_paired(&self) -> bool {
        self.id.is_some()
    }

    /// initialised but without an id: the store must be reloaded before use.
    pub fn is_stale(&self) -> bool {
        self.initialized && self.id.is_none()
    }
}

/// where device stores live.
pub trait DeviceContainer: Send + Sync {
    /// the stored device, or a fresh unpaired one.
    fn load_device(&self) -> BoxFuture<'_, Result<DeviceStore, WhatsAppError>>;

    fn save_device(&self, device: DeviceStore) -> BoxFuture<'_, Result<(), WhatsAppError>>;

    /// forget all credentials.
    fn delete_device(&self) -> BoxFuture<'_, Result<(), WhatsAppError>>;
}
