//! whatsapp addresses.
//!
//! a jid looks like `user[.agent][:device]@server`. the device part ("ad")
//! addresses one linked device of an account and is stripped before a jid is
//! used to identify a person.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WhatsAppError;

/// phone-number server.
pub const DEFAULT_USER_SERVER: &str = "s.whatsapp.net";
/// legacy phone-number server.
pub const LEGACY_USER_SERVER: &str = "c.us";
/// hidden-user (lid) server; the user part is not a phone number.
pub const HIDDEN_USER_SERVER: &str = "lid";
/// hosted lid server.
pub const HOSTED_LID_SERVER: &str = "hosted.lid";
/// group chats.
pub const GROUP_SERVER: &str = "g.us";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Jid {
    pub user: String,
    pub agent: u8,
    pub device: u16,
    pub server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            agent: 0,
            device: 0,
            server: server.into(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, WhatsAppError> {
        let invalid = || WhatsAppError::InvalidJid(s.to_string());
        let s_trim = s.trim();
        if s_trim.is_empty() {
            return Err(invalid());
        }

        let Some((addr, server)) = s_trim.split_once('@') else {
            // bare server jid
            return Ok(Self::new("", s_trim));
        };
        if server.is_empty() || server.contains('@') {
            return Err(invalid());
        }

        let (addr, device) = match addr.split_once(':') {
            Some((a, d)) => (a, d.parse::<u16>().map_err(|_| invalid())?),
            None => (addr, 0),
        };
        let (user, agent) = match addr.split_once('.') {
            Some((u, a)) => (u, a.parse::<u8>().map_err(|_| invalid())?),
            None => (addr, 0),
        };

        Ok(Self {
            user: user.to_string(),
            agent,
            device,
            server: server.to_string(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.server.is_empty()
    }

    /// addressed by phone number (`s.whatsapp.net` or `c.us`).
    pub fn is_phone_number(&self) -> bool {
        !self.user.is_empty()
            && (self.server == DEFAULT_USER_SERVER || self.server == LEGACY_USER_SERVER)
    }

    /// addressed by a hidden lid.
    pub fn is_hidden(&self) -> bool {
        self.server == HIDDEN_USER_SERVER || self.server == HOSTED_LID_SERVER
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }

    /// the same jid without agent and device.
    pub fn to_non_ad(&self) -> Self {
        Self::new(self.user.clone(), self.server.clone())
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.user.is_empty() {
            return f.write_str(&self.server);
        }
        f.write_str(&self.user)?;
        if self.agent != 0 {
            write!(f, ".{}", self.agent)?;
        }
        if self.device != 0 {
            write!(f, ":{}", self.device)?;
        }
        write!(f, "@{}", self.server)
    }
}

impl FromStr for Jid {
    type Err = WhatsAppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Jid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Jid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(Self::default());
        }
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
