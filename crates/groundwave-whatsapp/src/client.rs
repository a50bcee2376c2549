//! the whatsapp linking state machine.
//!
//! ```text
//! disconnected --connect (unpaired)--> pairing --code scanned--> connected
//!                                         | timeout / error
//!                                         v
//!                                    disconnected
//! disconnected --connect (paired)--> connecting --> connected
//! connected --disconnect / logged out / logout--> disconnected
//! ```
//!
//! one client exists per process; the composition root builds it once and
//! shares it. connection loss on a paired device triggers a reconnect with
//! exponential backoff until [`WhatsAppClient::disconnect`] is called.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WhatsAppError;
use crate::event::{Event, MessageEvent, PairEvent};
use crate::qr::render_qr_png_base64;
use crate::store::{DeviceContainer, DeviceStore};
use crate::transport::{ConnectOptions, Transport};

/// link status as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Disconnected,
    Connecting,
    Pairing,
    Connected,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Disconnected => "disconnected",
            Status::Connecting => "connecting",
            Status::Pairing => "pairing",
            Status::Connected => "connected",
        }
    }
}

/// receives every message event of a live connection, in arrival order.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, event: MessageEvent) -> BoxFuture<'_, Result<(), WhatsAppError>>;
}

#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    /// reconnect paired devices after connection loss
    pub auto_reconnect: bool,
    /// accept contact identity changes
    pub trust_identity: bool,
    /// first reconnect delay; doubles per failure
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            trust_identity: true,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// status plus qr code, for the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: Status,
    /// base64 png; empty unless pairing
    pub qr_code: String,
    pub paired: bool,
    pub jid: Option<String>,
}

struct LinkState {
    status: Status,
    qr_code: String,
}

struct Inner {
    container: Arc<dyn DeviceContainer>,
    transport: Arc<dyn Transport>,
    handler: Arc<dyn MessageHandler>,
    options: ClientOptions,
    state: RwLock<LinkState>,
    device: Mutex<DeviceStore>,
    /// cancelled by disconnect; replaced by the next connect.
    stop_reconnect: std::sync::Mutex<CancellationToken>,
    /// bumped per opened connection; event loops of older ones are ignored.
    session_gen: AtomicU64,
    /// bumped per spawned reconnect loop; only the newest keeps retrying.
    reconnect_gen: AtomicU64,
}

#[derive(Clone)]
pub struct WhatsAppClient {
    inner: Arc<Inner>,
}

impl WhatsAppClient {
    pub fn new(
        container: Arc<dyn DeviceContainer>,
        transport: Arc<dyn Transport>,
        handler: Arc<dyn MessageHandler>,
        options: ClientOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                container,
                transport,
                handler,
                options,
                state: RwLock::new(LinkState {
                    status: Status::Disconnected,
                    qr_code: String::new(),
                }),
                device: Mutex::new(DeviceStore::default()),
                stop_reconnect: std::sync::Mutex::new(CancellationToken::new()),
                session_gen: AtomicU64::new(0),
                reconnect_gen: AtomicU64::new(0),
            }),
        }
    }

    /// load the device store and, if it is paired, reconnect in the background.
    pub async fn start(&self) -> Result<(), WhatsAppError> {
        let device = self.inner.container.load_device().await?;
        let paired = device.is_paired();
        *self.inner.device.lock().await = device;

        if paired && self.inner.options.auto_reconnect {
            info!("whatsapp device paired, reconnecting in background");
            let token = self.inner.fresh_token();
            self.inner.spawn_reconnect(token, Duration::ZERO);
        } else {
            debug!("whatsapp device not paired");
        }
        Ok(())
    }

    /// connect, pairing first when no device is linked. no-op unless disconnected.
    /// a pending background reconnect is cancelled first.
    pub async fn connect(&self) -> Result<(), WhatsAppError> {
        if self.status().await != Status::Disconnected {
            return Ok(());
        }
        self.inner.signal_stop();
        let token = self.inner.fresh_token();
        self.inner.open(token).await
    }

    /// connect an already paired device.
    pub async fn reconnect(&self) -> Result<(), WhatsAppError> {
        if self.status().await != Status::Disconnected {
            return Ok(());
        }
        self.inner.signal_stop();
        let token = self.inner.fresh_token();
        self.inner.reconnect_with(token).await
    }

    /// close the connection and stop any pending reconnect. idempotent.
    pub async fn disconnect(&self) {
        self.inner.signal_stop();
        self.inner.transport.disconnect().await;
        self.inner.set_status(Status::Disconnected).await;
        info!("whatsapp disconnected");
    }

    /// unlink the device and drop its credentials.
    pub async fn logout(&self) -> Result<(), WhatsAppError> {
        self.inner.signal_stop();
        if let Err(e) = self.inner.transport.logout().await {
            warn!(error = %e, "whatsapp logout request failed, clearing local credentials anyway");
        }
        self.inner.clear_device().await?;
        self.inner.set_status(Status::Disconnected).await;
        info!("whatsapp logged out");
        Ok(())
    }

    pub async fn status(&self) -> Status {
        self.inner.state.read().await.status
    }

    /// the pairing qr as base64 png; empty unless pairing.
    pub async fn qr_code(&self) -> String {
        let state = self.inner.state.read().await;
        if state.status == Status::Pairing {
            state.qr_code.clone()
        } else {
            String::new()
        }
    }

    pub async fn is_paired(&self) -> bool {
        self.inner.device.lock().await.is_paired()
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        let device = self.inner.device.lock().await.clone();
        let state = self.inner.state.read().await;
        StatusSnapshot {
            status: state.status,
            qr_code: if state.status == Status::Pairing {
                state.qr_code.clone()
            } else {
                String::new()
            },
            paired: device.is_paired(),
            jid: device.id.map(|j| j.to_non_ad().to_string()),
        }
    }
}

impl Inner {
    fn token_slot(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.stop_reconnect.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// the current stop token, replaced first if it was already used.
    fn fresh_token(&self) -> CancellationToken {
        let mut slot = self.token_slot();
        if slot.is_cancelled() {
            *slot = CancellationToken::new();
        }
        slot.clone()
    }

    /// cancel the stop token once; later calls find it cancelled already.
    fn signal_stop(&self) {
        let slot = self.token_slot();
        if !slot.is_cancelled() {
            slot.cancel();
            debug!("whatsapp stop-reconnect signalled");
        }
    }

    async fn set_status(&self, status: Status) {
        let mut state = self.state.write().await;
        state.status = status;
        if status != Status::Pairing {
            state.qr_code.clear();
        }
    }

    /// the device to connect with, reloaded when stale or never loaded.
    async fn current_device(&self) -> Result<DeviceStore, WhatsAppError> {
        let mut device = self.device.lock().await;
        if !device.initialized || device.is_stale() {
            *device = self.container.load_device().await?;
        }
        Ok(device.clone())
    }

    async fn save_device(&self, device: DeviceStore) {
        if let Err(e) = self.container.save_device(device).await {
            warn!(error = %e, "failed to persist whatsapp device");
        }
    }

    async fn clear_device(&self) -> Result<(), WhatsAppError> {
        self.container.delete_device().await?;
        let fresh = self.container.load_device().await?;
        *self.device.lock().await = fresh;
        Ok(())
    }

    async fn open(self: &Arc<Self>, token: CancellationToken) -> Result<(), WhatsAppError> {
        let device = self.current_device().await?;
        let paired = device.is_paired();
        self.set_status(if paired {
            Status::Connecting
        } else {
            Status::Pairing
        })
        .await;

        let options = ConnectOptions {
            trust_identity: self.options.trust_identity,
        };
        let session = match self.transport.connect(device, options).await {
            Ok(session) => session,
            Err(e) => {
                self.set_status(Status::Disconnected).await;
                return Err(e);
            }
        };

        let generation = self.session_gen.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(pairing) = session.pairing {
            tokio::spawn(Arc::clone(self).consume_pairing(pairing, token.clone()));
        }
        tokio::spawn(Arc::clone(self).run_events(session.events, token, generation));
        Ok(())
    }

    async fn reconnect_with(self: &Arc<Self>, token: CancellationToken) -> Result<(), WhatsAppError> {
        let device = self.device.lock().await.clone();
        if device.is_stale() || !device.is_paired() {
            return Err(WhatsAppError::NoSession);
        }
        self.open(token).await
    }

    fn spawn_reconnect(self: &Arc<Self>, token: CancellationToken, first_delay: Duration) {
        let id = self.reconnect_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.reconnect_loop(token, first_delay, id).await });
    }

    async fn reconnect_loop(
        self: &Arc<Self>,
        token: CancellationToken,
        first_delay: Duration,
        id: u64,
    ) {
        let mut delay = first_delay;
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("whatsapp reconnect aborted");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            if token.is_cancelled() || self.reconnect_gen.load(Ordering::SeqCst) != id {
                debug!("whatsapp reconnect superseded");
                return;
            }
            if self.state.read().await.status != Status::Disconnected {
                debug!("whatsapp already connecting, reconnect dropped");
                return;
            }

            match self.reconnect_with(token.clone()).await {
                Ok(()) => return,
                Err(WhatsAppError::NoSession) => {
                    warn!("whatsapp reconnect abandoned: no existing session");
                    return;
                }
                Err(e) => {
                    delay = if delay.is_zero() {
                        self.options.initial_backoff
                    } else {
                        (delay * 2).min(self.options.max_backoff)
                    };
                    warn!(error = %e, retry_in = ?delay, "whatsapp reconnect failed");
                }
            }
        }
    }

    async fn consume_pairing(
        self: Arc<Self>,
        mut events: mpsc::Receiver<PairEvent>,
        token: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => return,
                event = events.recv() => event,
            };
            let Some(event) = event else {
                // the connection went away mid-pairing
                let mut state = self.state.write().await;
                if state.status == Status::Pairing {
                    state.status = Status::Disconnected;
                    state.qr_code.clear();
                }
                return;
            };

            match event {
                PairEvent::Code { code } => match render_qr_png_base64(&code) {
                    Ok(qr) => {
                        let mut state = self.state.write().await;
                        if state.status == Status::Pairing {
                            state.qr_code = qr;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to render whatsapp pairing code"),
                },
                PairEvent::Success { jid } => {
                    info!(jid = %jid.to_non_ad(), "whatsapp device paired");
                    let device = {
                        let mut device = self.device.lock().await;
                        device.id = Some(jid);
                        device.initialized = true;
                        device.clone()
                    };
                    self.save_device(device).await;
                    self.set_status(Status::Connected).await;
                    return;
                }
                PairEvent::Timeout => {
                    warn!("whatsapp pairing timed out");
                    self.transport.disconnect().await;
                    self.set_status(Status::Disconnected).await;
                    return;
                }
                PairEvent::Error { message } => {
                    warn!(error = %message, "whatsapp pairing failed");
                    self.transport.disconnect().await;
                    self.set_status(Status::Disconnected).await;
                    return;
                }
            }
        }
    }

    async fn run_events(
        self: Arc<Self>,
        mut events: mpsc::Receiver<Event>,
        token: CancellationToken,
        generation: u64,
    ) {
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => return,
                event = events.recv() => event,
            };
            if token.is_cancelled() {
                return;
            }
            if self.session_gen.load(Ordering::SeqCst) != generation {
                debug!(generation, "whatsapp event from a replaced connection ignored");
                return;
            }

            match event {
                Some(Event::Connected) => {
                    info!("whatsapp connected");
                    self.set_status(Status::Connected).await;
                }
                Some(Event::Disconnected) | None => {
                    self.set_status(Status::Disconnected).await;
                    let paired = self.device.lock().await.is_paired();
                    if paired && self.options.auto_reconnect {
                        info!("whatsapp connection lost, scheduling reconnect");
                        self.spawn_reconnect(token, self.options.initial_backoff);
                    } else {
                        info!("whatsapp connection closed");
                    }
                    return;
                }
                Some(Event::LoggedOut { reason }) => {
                    warn!(%reason, "whatsapp device was logged out");
                    if let Err(e) = self.clear_device().await {
                        warn!(error = %e, "failed to clear whatsapp device");
                    }
                    self.set_status(Status::Disconnected).await;
                    return;
                }
                Some(Event::Message(message)) => {
                    if let Err(e) = self.handler.handle(*message).await {
                        warn!(error = %e, "whatsapp message ingest failed");
                    }
                }
                Some(Event::SessionUpdated { session }) => {
                    let device = {
                        let mut device = self.device.lock().await;
                        device.session = Some(session);
                        device.initialized = true;
                        device.clone()
                    };
                    self.save_device(device).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Message, MessageInfo};
    use crate::jid::Jid;
    use crate::memory::{MemoryContainer, MemoryTransport};
    use futures_util::FutureExt;

    struct Recorder(mpsc::UnboundedSender<MessageEvent>);

    impl MessageHandler for Recorder {
        fn handle(&self, event: MessageEvent) -> BoxFuture<'_, Result<(), WhatsAppError>> {
            let _ = self.0.send(event);
            async { Ok(()) }.boxed()
        }
    }

    struct Harness {
        client: WhatsAppClient,
        transport: Arc<MemoryTransport>,
        container: Arc<MemoryContainer>,
        messages: mpsc::UnboundedReceiver<MessageEvent>,
    }

    fn paired_device() -> DeviceStore {
        DeviceStore {
            id: Some(Jid::parse("15550001111:4@s.whatsapp.net").unwrap()),
            initialized: true,
            session: Some("creds".to_string()),
        }
    }

    fn harness(container: MemoryContainer) -> Harness {
        let transport = Arc::new(MemoryTransport::new());
        let container = Arc::new(container);
        let (tx, messages) = mpsc::unbounded_channel();
        let client = WhatsAppClient::new(
            container.clone(),
            transport.clone(),
            Arc::new(Recorder(tx)),
            ClientOptions::default(),
        );
        Harness {
            client,
            transport,
            container,
            messages,
        }
    }

    async fn wait_for_status(client: &WhatsAppClient, want: Status) {
        for _ in 0..200 {
            if client.status().await == want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("status never became {:?}, is {:?}", want, client.status().await);
    }

    async fn wait_for_connects(transport: &MemoryTransport, want: usize) {
        for _ in 0..200 {
            if transport.connect_count() >= want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} connect attempts, saw {}", want, transport.connect_count());
    }

    #[tokio::test]
    async fn pairing_flow_shows_qr_then_connects() {
        let h = harness(MemoryContainer::new());
        h.client.start().await.unwrap();
        assert_eq!(h.client.status().await, Status::Disconnected);

        h.client.connect().await.unwrap();
        assert_eq!(h.client.status().await, Status::Pairing);
        assert_eq!(h.client.qr_code().await, "");

        assert!(
            h.transport
                .emit_pairing(PairEvent::Code {
                    code: "2@abc,def".to_string()
                })
                .await
        );
        for _ in 0..200 {
            if !h.client.qr_code().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!h.client.qr_code().await.is_empty());

        h.transport
            .emit_pairing(PairEvent::Success {
                jid: Jid::parse("15550001111:9@s.whatsapp.net").unwrap(),
            })
            .await;
        wait_for_status(&h.client, Status::Connected).await;
        assert_eq!(h.client.qr_code().await, "");

        let stored = h.container.stored().unwrap();
        assert_eq!(stored.id.unwrap().user, "15550001111");
        let snap = h.client.snapshot().await;
        assert!(snap.paired);
        assert_eq!(snap.jid.as_deref(), Some("15550001111@s.whatsapp.net"));
    }

    #[tokio::test]
    async fn pairing_timeout_returns_to_disconnected() {
        let h = harness(MemoryContainer::new());
        h.client.connect().await.unwrap();
        h.transport
            .emit_pairing(PairEvent::Code {
                code: "2@x".to_string(),
            })
            .await;
        h.transport.emit_pairing(PairEvent::Timeout).await;

        wait_for_status(&h.client, Status::Disconnected).await;
        assert_eq!(h.client.qr_code().await, "");
        assert!(!h.client.is_paired().await);
        assert!(h.container.stored().is_none());
    }

    #[tokio::test]
    async fn start_reconnects_paired_device() {
        let h = harness(MemoryContainer::with_device(paired_device()));
        h.client.start().await.unwrap();

        wait_for_connects(&h.transport, 1).await;
        let (device, options) = h.transport.last_connect().unwrap();
        assert_eq!(device.session.as_deref(), Some("creds"));
        assert!(options.trust_identity);

        h.transport.emit(Event::Connected).await;
        wait_for_status(&h.client, Status::Connected).await;
    }

    #[tokio::test]
    async fn reconnect_without_session_fails() {
        let h = harness(MemoryContainer::new());
        h.client.start().await.unwrap();
        let err = h.client.reconnect().await.unwrap_err();
        assert!(matches!(err, WhatsAppError::NoSession));
        assert_eq!(err.to_string(), "no existing session to reconnect");
        assert_eq!(h.transport.connect_count(), 0);
    }

    #[tokio::test]
    async fn messages_reach_handler_in_order() {
        let mut h = harness(MemoryContainer::with_device(paired_device()));
        h.client.start().await.unwrap();
        wait_for_connects(&h.transport, 1).await;

        for text in ["one", "two"] {
            let ev = MessageEvent {
                info: MessageInfo {
                    chat: Jid::parse("1@s.whatsapp.net").unwrap(),
                    ..Default::default()
                },
                message: Message {
                    conversation: Some(text.to_string()),
                    ..Default::default()
                },
            };
            h.transport.emit(Event::Message(Box::new(ev))).await;
        }

        let first = h.messages.recv().await.unwrap();
        let second = h.messages.recv().await.unwrap();
        assert_eq!(first.message.conversation.as_deref(), Some("one"));
        assert_eq!(second.message.conversation.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn session_updates_are_persisted() {
        let h = harness(MemoryContainer::with_device(paired_device()));
        h.client.start().await.unwrap();
        wait_for_connects(&h.transport, 1).await;

        h.transport
            .emit(Event::SessionUpdated {
                session: "rotated".to_string(),
            })
            .await;
        for _ in 0..200 {
            if h.container.stored().and_then(|d| d.session).as_deref() == Some("rotated") {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session was not persisted");
    }

    #[tokio::test(start_paused = true)]
    async fn connection_loss_retries_with_backoff() {
        let h = harness(MemoryContainer::with_device(paired_device()));
        h.client.start().await.unwrap();
        wait_for_connects(&h.transport, 1).await;
        assert_eq!(h.transport.connect_count(), 1);

        h.transport.fail_next_connects(3);
        h.transport.drop_connection();
        wait_for_status(&h.client, Status::Disconnected).await;

        // retries run 1s, 2s, 4s and 8s apart; the first three fail
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(h.transport.connect_count(), 2);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.transport.connect_count(), 3);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(h.transport.connect_count(), 4);
        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(h.transport.connect_count(), 5);
        assert_eq!(h.client.status().await, Status::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_stops_reconnect_and_is_idempotent() {
        let h = harness(MemoryContainer::with_device(paired_device()));
        h.client.start().await.unwrap();
        wait_for_connects(&h.transport, 1).await;

        h.transport.fail_next_connects(100);
        h.transport.drop_connection();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let attempts = h.transport.connect_count();

        h.client.disconnect().await;
        h.client.disconnect().await;
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(h.transport.connect_count(), attempts);
        assert_eq!(h.client.status().await, Status::Disconnected);
        assert_eq!(h.transport.disconnect_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_connect_during_backoff_cancels_pending_reconnect() {
        let h = harness(MemoryContainer::with_device(paired_device()));
        h.client.start().await.unwrap();
        wait_for_connects(&h.transport, 1).await;
        h.transport.emit(Event::Connected).await;
        wait_for_status(&h.client, Status::Connected).await;

        h.transport.drop_connection();
        wait_for_status(&h.client, Status::Disconnected).await;

        // the scheduled retry is still inside its 1s backoff
        h.client.connect().await.unwrap();
        assert_eq!(h.transport.connect_count(), 2);
        h.transport.emit(Event::Connected).await;
        wait_for_status(&h.client, Status::Connected).await;

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(h.transport.connect_count(), 2);
        assert_eq!(h.client.status().await, Status::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_start_keeps_a_single_reconnect_loop() {
        let h = harness(MemoryContainer::with_device(paired_device()));
        h.transport.fail_next_connects(100);
        h.client.start().await.unwrap();
        h.client.start().await.unwrap();

        // one loop tries at 0s, 1s, 3s and 7s
        tokio::time::sleep(Duration::from_millis(7500)).await;
        assert_eq!(h.transport.connect_count(), 4);
    }

    #[tokio::test]
    async fn connect_after_disconnect_works_again() {
        let h = harness(MemoryContainer::with_device(paired_device()));
        h.client.start().await.unwrap();
        wait_for_connects(&h.transport, 1).await;
        h.client.disconnect().await;

        h.client.connect().await.unwrap();
        h.transport.emit(Event::Connected).await;
        wait_for_status(&h.client, Status::Connected).await;
    }

    #[tokio::test]
    async fn logout_clears_credentials() {
        let h = harness(MemoryContainer::with_device(paired_device()));
        h.client.start().await.unwrap();
        wait_for_connects(&h.transport, 1).await;
        h.transport.emit(Event::Connected).await;
        wait_for_status(&h.client, Status::Connected).await;

        h.client.logout().await.unwrap();
        assert_eq!(h.client.status().await, Status::Disconnected);
        assert_eq!(h.transport.logout_count(), 1);
        assert!(h.container.stored().is_none());
        assert!(!h.client.is_paired().await);

        // a fresh store pairs again
        h.client.connect().await.unwrap();
        assert_eq!(h.client.status().await, Status::Pairing);
    }

    #[tokio::test]
    async fn remote_logout_clears_credentials() {
        let h = harness(MemoryContainer::with_device(paired_device()));
        h.client.start().await.unwrap();
        wait_for_connects(&h.transport, 1).await;

        h.transport
            .emit(Event::LoggedOut {
                reason: "unlinked from phone".to_string(),
            })
            .await;
        wait_for_status(&h.client, Status::Disconnected).await;
        for _ in 0..200 {
            if h.container.stored().is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(h.container.stored().is_none());
        assert_eq!(h.transport.connect_count(), 1);
    }
}
