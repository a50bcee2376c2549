//! whatsapp messages into contact history.
//!
//! every direct text message is matched to a contact by phone number; a
//! match bumps the contact's last auto-contact time and appends the message
//! to their chat history. unmatched and group messages are dropped.

use futures_util::future::{BoxFuture, FutureExt};
use groundwave_db::{Database, GroundwaveDb, WhatsAppDeviceRecord};
use groundwave_types::{ChatPlatform, ChatSender, Contact, NewChatEntry};
use groundwave_whatsapp::{
    DeviceContainer, DeviceStore, Jid, MessageEvent, MessageHandler, WhatsAppError,
    chat_candidate, phone_matches,
};
use tracing::{debug, info};

/// the first contact with a phone number matching `phone`.
pub fn find_contact_by_phone<'a>(contacts: &'a [Contact], phone: &str) -> Option<&'a Contact> {
    contacts
        .iter()
        .find(|c| c.phones.iter().any(|p| phone_matches(p, phone)))
}

/// records incoming and outgoing messages against contacts.
pub struct ContactMessageHandler {
    db: GroundwaveDb,
}

impl ContactMessageHandler {
    pub fn new(db: GroundwaveDb) -> Self {
        Self { db }
    }

    async fn ingest(&self, event: MessageEvent) -> Result<(), WhatsAppError> {
        let Some(candidate) = chat_candidate(&event) else {
            debug!(id = %event.info.id, "dropping message without direct text");
            return Ok(());
        };

        let contacts = self.db.list_contacts().await.map_err(handler_error)?;
        let Some(contact) = find_contact_by_phone(&contacts, &candidate.phone) else {
            debug!(jid = %candidate.other_party, "no contact for whatsapp sender");
            return Ok(());
        };

        self.db
            .record_auto_contact(contact.id, candidate.sent_at)
            .await
            .map_err(handler_error)?;

        let sender = if candidate.outgoing {
            ChatSender::Me
        } else {
            ChatSender::Them
        };
        let entry = match NewChatEntry::new(
            contact.id,
            ChatPlatform::WhatsApp,
            sender,
            &candidate.text,
            candidate.sent_at,
        ) {
            Ok(entry) => entry,
            // whitespace-only text
            Err(_) => return Ok(()),
        };
        self.db.add_chat_entry(&entry).await.map_err(handler_error)?;
        info!(contact_id = %contact.id, sender = sender.as_str(), "recorded whatsapp message");
        Ok(())
    }
}

fn handler_error(e: groundwave_db::Error) -> WhatsAppError {
    WhatsAppError::Handler(e.to_string())
}

impl MessageHandler for ContactMessageHandler {
    fn handle(&self, event: MessageEvent) -> BoxFuture<'_, Result<(), WhatsAppError>> {
        self.ingest(event).boxed()
    }
}

/// keeps the linked device in the database.
pub struct DbDeviceContainer {
    db: GroundwaveDb,
}

impl DbDeviceContainer {
    pub fn new(db: GroundwaveDb) -> Self {
        Self { db }
    }
}

fn store_error(e: groundwave_db::Error) -> WhatsAppError {
    WhatsAppError::Store(e.to_string())
}

impl DeviceContainer for DbDeviceContainer {
    fn load_device(&self) -> BoxFuture<'_, Result<DeviceStore, WhatsAppError>> {
        async move {
            let record = self.db.load_whatsapp_device().await.map_err(store_error)?;
            let record = record.unwrap_or_default();
            let id = record.jid.as_deref().map(Jid::parse).transpose()?;
            Ok(DeviceStore {
                id,
                // a loaded store is always initialised
                initialized: true,
                session: record.session,
            })
        }
        .boxed()
    }

    fn save_device(&self, device: DeviceStore) -> BoxFuture<'_, Result<(), WhatsAppError>> {
        async move {
            let record = WhatsAppDeviceRecord {
                jid: device.id.as_ref().map(ToString::to_string),
                initialized: device.initialized,
                session: device.session,
            };
            self.db
                .save_whatsapp_device(&record)
                .await
                .map_err(store_error)
        }
        .boxed()
    }

    fn delete_device(&self) -> BoxFuture<'_, Result<(), WhatsAppError>> {
        async move { self.db.delete_whatsapp_device().await.map_err(store_error) }.boxed()
    }
}
