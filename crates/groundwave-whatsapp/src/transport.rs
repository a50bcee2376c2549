//! the protocol transport seam.

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::WhatsAppError;
use crate::event::{Event, PairEvent};
use crate::store::DeviceStore;

/// per-connection settings passed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// accept identity changes of contacts instead of failing decryption
    pub trust_identity: bool,
}

/// a live connection: its event stream and, for unpaired devices, the
/// pairing stream.
///
/// both channels close when the connection ends.
#[derive(Debug)]
pub struct Session {
    pub events: mpsc::Receiver<Event>,
    pub pairing: Option<mpsc::Receiver<PairEvent>>,
}

/// speaks the whatsapp multi-device protocol.
///
/// one connection at a time; `connect` replaces any previous one.
pub trait Transport: Send + Sync {
    fn connect(
        &self,
        device: DeviceStore,
        options: ConnectOptions,
    ) -> BoxFuture<'_, Result<Session, WhatsAppError>>;

    /// close the connection, if any.
    fn disconnect(&self) -> BoxFuture<'_, ()>;

    /// unlink this device from the account and close the connection.
    fn logout(&self) -> BoxFuture<'_, Result<(), WhatsAppError>>;
}
