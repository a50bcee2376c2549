//! in-process transport and device container.
//!
//! used by tests and by development setups without a protocol bridge.
//! events are injected with [`MemoryTransport::emit`] and
//! [`MemoryTransport::emit_pairing`].

use std::sync::Mutex;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::WhatsAppError;
use crate::event::{Event, PairEvent};
use crate::store::{DeviceContainer, DeviceStore};
use crate::transport::{ConnectOptions, Session, Transport};

const CHANNEL_CAPACITY: usize = 32;

#[derive(Default)]
struct TransportState {
    events: Option<mpsc::Sender<Event>>,
    pairing: Option<mpsc::Sender<PairEvent>>,
    connects: Vec<(DeviceStore, ConnectOptions)>,
    failures: usize,
    disconnects: usize,
    logouts: usize,
}

#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<TransportState>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TransportState> {
        // poisoning is not fatal here
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// make the next `n` connect calls fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.lock().failures = n;
    }

    /// connect attempts so far, failed ones included.
    pub fn connect_count(&self) -> usize {
        self.lock().connects.len()
    }

    /// device and options of the latest connect attempt.
    pub fn last_connect(&self) -> Option<(DeviceStore, ConnectOptions)> {
        self.lock().connects.last().cloned()
    }

    pub fn disconnect_count(&self) -> usize {
        self.lock().disconnects
    }

    pub fn logout_count(&self) -> usize {
        self.lock().logouts
    }

    /// deliver a connection event. false when nothing is connected.
    pub async fn emit(&self, event: Event) -> bool {
        let tx = self.lock().events.clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// deliver a pairing event. false when no pairing is in progress.
    pub async fn emit_pairing(&self, event: PairEvent) -> bool {
        let tx = self.lock().pairing.clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// simulate the network going away: both streams end.
    pub fn drop_connection(&self) {
        let mut state = self.lock();
        state.events = None;
        state.pairing = None;
    }
}

impl Transport for MemoryTransport {
    fn connect(
        &self,
        device: DeviceStore,
        options: ConnectOptions,
    ) -> BoxFuture<'_, Result<Session, WhatsAppError>> {
        async move {
            let mut state = self.lock();
            let paired = device.is_paired();
            state.connects.push((device, options));
            if state.failures > 0 {
                state.failures -= 1;
                return Err(WhatsAppError::Transport("connection refused".to_string()));
            }

            let (events_tx, events) = mpsc::channel(CHANNEL_CAPACITY);
            state.events = Some(events_tx);
            let pairing = if paired {
                state.pairing = None;
                None
            } else {
                let (pairing_tx, pairing) = mpsc::channel(CHANNEL_CAPACITY);
                state.pairing = Some(pairing_tx);
                Some(pairing)
            };
            Ok(Session { events, pairing })
        }
        .boxed()
    }

    fn disconnect(&self) -> BoxFuture<'_, ()> {
        async move {
            let mut state = self.lock();
            state.disconnects += 1;
            state.events = None;
            state.pairing = None;
        }
        .boxed()
    }

    fn logout(&self) -> BoxFuture<'_, Result<(), WhatsAppError>> {
        async move {
            let mut state = self.lock();
            state.logouts += 1;
            state.events = None;
            state.pairing = None;
            Ok(())
        }
        .boxed()
    }
}

/// a device container holding at most one device in memory.
#[derive(Default)]
pub struct MemoryContainer {
    device: Mutex<Option<DeviceStore>>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(device: DeviceStore) -> Self {
        Self {
            device: Mutex::new(Some(device)),
        }
    }

    /// what is currently persisted.
    pub fn stored(&self) -> Option<DeviceStore> {
        self.device.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl DeviceContainer for MemoryContainer {
    fn load_device(&self) -> BoxFuture<'_, Result<DeviceStore, WhatsAppError>> {
        async move {
            let mut device = self.stored().unwrap_or_default();
            device.initialized = true;
            Ok(device)
        }
        .boxed()
    }

    fn save_device(&self, device: DeviceStore) -> BoxFuture<'_, Result<(), WhatsAppError>> {
        async move {
            *self.device.lock().unwrap_or_else(|e| e.into_inner()) = Some(device);
            Ok(())
        }
        .boxed()
    }

    fn delete_device(&self) -> BoxFuture<'_, Result<(), WhatsAppError>> {
        async move {
            *self.device.lock().unwrap_or_else(|e| e.into_inner()) = None;
            Ok(())
        }
        .boxed()
    }
}
