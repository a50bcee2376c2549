//! database entity models for sea-orm.
//!
//! these entities map to database tables and handle serialization
//! of list-valued fields to json text columns.

pub mod chat_entry;
pub mod contact;
pub mod invite;
pub mod passkey;
pub mod qso;
pub mod session;
pub mod user;
pub mod whatsapp_device;
pub mod zettel;
pub mod zettel_back_link;
pub mod zettel_forward_link;
