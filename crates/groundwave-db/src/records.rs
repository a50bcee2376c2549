//! stored values that have no home in groundwave-types.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use groundwave_org::Access;
use groundwave_types::{InviteId, User, UserId};

/// a registered webauthn credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasskeyRecord {
    pub id: u64,
    pub user_id: UserId,
    /// base64url credential id
    pub credential_id: String,
    /// the serialized credential, public key included
    pub credential: String,
    pub sign_count: u32,
    pub transports: Vec<String>,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// a browser session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// 64 hex chars, also the cookie value
    pub id: String,
    /// none until login
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub absolute_expires_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    /// user agent family, e.g. "Firefox on Linux"
    pub device: String,
    pub ip: String,
    pub sensitive_expires_at: Option<DateTime<Utc>>,
    pub break_glass_profile_ids: BTreeSet<u64>,
    pub break_glass_expires_at: Option<DateTime<Utc>>,
    /// pending webauthn ceremony state
    pub ceremony: Option<String>,
}

impl SessionRecord {
    /// an anonymous session starting at `now`.
    pub fn new(id: String, now: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            id,
            user_id: None,
            created_at: now,
            absolute_expires_at: now + lifetime,
            last_activity_at: now,
            device: String::new(),
            ip: String::new(),
            sensitive_expires_at: None,
            break_glass_profile_ids: BTreeSet::new(),
            break_glass_expires_at: None,
            ceremony: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.absolute_expires_at <= now
    }
}

/// a zettel as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZettelRecord {
    pub id: String,
    pub title: String,
    pub body: String,
    pub access: Access,
    pub date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// the persisted whatsapp device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WhatsAppDeviceRecord {
    pub jid: Option<String>,
    pub initialized: bool,
    pub session: Option<String>,
}

/// a new user together with their first passkey.
///
/// without an invite this is the setup flow and only succeeds while there
/// are no users.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub passkey: PasskeyRecord,
    pub invite: Option<InviteId>,
}

/// outcome of an adif import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QsoImport {
    pub inserted: usize,
    /// already present (same call and timestamp)
    pub skipped: usize,
}
