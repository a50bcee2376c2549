//! signup invites.
//!
//! invite tokens must:
//! - be exactly 22 characters long (16 random bytes, unpadded base64url)
//! - contain only `A-Z a-z 0-9 - _`

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::{Role, UserId};

/// length of an invite token.
pub const INVITE_TOKEN_LEN: usize = 22;

/// unique identifier for an invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InviteId(pub u64);

impl fmt::Display for InviteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// a validated invite token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InviteToken(String);

impl InviteToken {
    /// create a token, validating the format.
    pub fn new(s: impl Into<String>) -> Result<Self, InviteTokenError> {
        let s = s.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    /// generate a new random token.
    pub fn generate() -> Self {
        use rand::Rng;
        let bytes: [u8; 16] = rand::rng().random();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// constant-time comparison against a presented token.
    pub fn matches(&self, presented: &str) -> bool {
        self.0.as_bytes().ct_eq(presented.as_bytes()).into()
    }

    fn validate(s: &str) -> Result<(), InviteTokenError> {
        if s.len() != INVITE_TOKEN_LEN {
            return Err(InviteTokenError::InvalidLength {
                expected: INVITE_TOKEN_LEN,
                got: s.len(),
            });
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(InviteTokenError::InvalidCharacters);
        }
        Ok(())
    }
}

impl fmt::Display for InviteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InviteToken {
    type Err = InviteTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for InviteToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// error type for malformed invite tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InviteTokenError {
    #[error("invite token must be {expected} characters, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("invite token contains invalid characters")]
    InvalidCharacters,
}

impl<'de> Deserialize<'de> for InviteToken {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for InviteToken {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// a one-shot signup invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub id: InviteId,
    pub token: InviteToken,
    pub created_by: UserId,
    /// role the invited user will get
    pub target_role: Role,
    pub created_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub consumed_by: Option<UserId>,
}

impl Invite {
    /// consumed invites can no longer be used, regenerated or deleted.
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_valid() {
        let a = InviteToken::generate();
        let b = InviteToken::generate();
        assert_eq!(a.as_str().len(), INVITE_TOKEN_LEN);
        assert!(InviteToken::new(a.as_str()).is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_bad_tokens() {
        assert_eq!(
            InviteToken::new("short").unwrap_err(),
            InviteTokenError::InvalidLength {
                expected: 22,
                got: 5
            }
        );
        assert_eq!(
            InviteToken::new("abcdefghijklmnopqrst+/").unwrap_err(),
            InviteTokenError::InvalidCharacters
        );
    }

    #[test]
    fn test_matches() {
        let token = InviteToken::new("abcdefghijklmnopqrst-_").unwrap();
        assert!(token.matches("abcdefghijklmnopqrst-_"));
        assert!(!token.matches("abcdefghijklmnopqrst--"));
        assert!(!token.matches(""));
    }

    #[test]
    fn test_serde_validates() {
        assert!(serde_json::from_str::<InviteToken>(r#""nope""#).is_err());
        let token: InviteToken = serde_json::from_str(r#""abcdefghijklmnopqrst-_""#).unwrap();
        assert_eq!(token.as_str(), "abcdefghijklmnopqrst-_");
    }
}
