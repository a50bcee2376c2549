//! http handlers for groundwave routes.

mod error;
pub mod ext;
pub mod health;
pub mod invites;
pub mod misc;
mod pages;
pub mod qsl;
pub mod security;
pub mod webauthn;
pub mod whatsapp;
pub mod zettel;

pub use error::{ApiError, OptionExt, ResultExt};
