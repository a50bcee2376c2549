//! core types for groundwave - a single-tenant personal data server.
//!
//! this crate provides the data structures shared across groundwave:
//! - [`user`]: users and roles
//! - [`invite`]: one-shot signup invites
//! - [`contact`]: contacts, link kinds and chat entries
//! - [`config`]: application configuration and the runtime environment

mod config;
mod contact;
mod env;
mod error;
mod invite;
mod user;

pub use config::{
    ChatConfig, Config, DatabaseConfig, GridMapConfig, PowConfig, SensitiveConfig, SessionConfig,
    SecurityTxtConfig, WebAuthnConfig, WhatsAppConfig, ZettelConfig,
};
pub use contact::{
    ChatEntry, ChatPlatform, ChatSender, Contact, ContactId, LinkKind, NewChatEntry,
};
pub use env::RuntimeEnv;
pub use error::Error;
pub use invite::{INVITE_TOKEN_LEN, Invite, InviteId, InviteToken, InviteTokenError};
pub use user::{Role, User, UserId};

/// result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;
