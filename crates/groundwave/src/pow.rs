//! proof-of-work challenges and request tokens.
//!
//! a challenge is `<unix seconds>.<hex hmac>` signed with the csrf secret,
//! so the server can check it was issued here without storing it. a
//! solution is a nonce such that `sha256(challenge || nonce)` starts with
//! the required number of zero bits.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PowError {
    #[error("malformed challenge")]
    Malformed,
    #[error("challenge was not issued by this server")]
    BadSignature,
    #[error("challenge expired")]
    Expired,
    #[error("insufficient work")]
    InsufficientWork,
}

fn mac(secret: &[u8]) -> HmacSha256 {
    // hmac accepts keys of any length
    HmacSha256::new_from_slice(secret).unwrap_or_else(|_| unreachable!())
}

fn sign(secret: &[u8], payload: &str) -> String {
    let mut mac = mac(secret);
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// issue a challenge at `now`.
pub fn issue_challenge(secret: &[u8], now: DateTime<Utc>) -> String {
    let ts = now.timestamp().to_string();
    let sig = sign(secret, &ts);
    format!("{ts}.{sig}")
}

/// number of leading zero bits of a digest.
pub fn leading_zero_bits(digest: &[u8]) -> u32 {
    let mut bits = 0;
    for byte in digest {
        if *byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}

/// check a solved challenge.
pub fn verify(
    secret: &[u8],
    challenge: &str,
    nonce: &str,
    difficulty_bits: u32,
    ttl: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<(), PowError> {
    let (ts, sig) = challenge.split_once('.').ok_or(PowError::Malformed)?;
    let issued: i64 = ts.parse().map_err(|_| PowError::Malformed)?;
    let sig = hex::decode(sig).map_err(|_| PowError::Malformed)?;

    let mut mac = mac(secret);
    mac.update(ts.as_bytes());
    mac.verify_slice(&sig).map_err(|_| PowError::BadSignature)?;

    let issued = DateTime::from_timestamp(issued, 0).ok_or(PowError::Malformed)?;
    if issued > now || now - issued > ttl {
        return Err(PowError::Expired);
    }

    let mut hasher = Sha256::new();
    hasher.update(challenge.as_bytes());
    hasher.update(nonce.as_bytes());
    if leading_zero_bits(&hasher.finalize()) < difficulty_bits {
        return Err(PowError::InsufficientWork);
    }
    Ok(())
}

/// the request token for a session, sent back in `X-CSRF-Token`.
pub fn csrf_token(secret: &[u8], session_id: &str) -> String {
    sign(secret, &format!("csrf:{session_id}"))
}

/// constant-time check of a presented request token.
pub fn csrf_token_matches(secret: &[u8], session_id: &str, presented: &str) -> bool {
    let expected = csrf_token(secret, session_id);
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &[u8] = b"test-secret";

    fn solve(challenge: &str, bits: u32) -> String {
        (0u64..)
            .map(|n| n.to_string())
            .find(|nonce| {
                let mut h = Sha256::new();
                h.update(challenge.as_bytes());
                h.update(nonce.as_bytes());
                leading_zero_bits(&h.finalize()) >= bits
            })
            .unwrap()
    }

    #[test]
    fn test_leading_zero_bits() {
        assert_eq!(leading_zero_bits(&[0xff]), 0);
        assert_eq!(leading_zero_bits(&[0x0f]), 4);
        assert_eq!(leading_zero_bits(&[0x00, 0x01]), 15);
        assert_eq!(leading_zero_bits(&[0x00, 0x00]), 16);
    }

    #[test]
    fn test_solved_challenge_verifies() {
        let now = Utc::now();
        let challenge = issue_challenge(SECRET, now);
        let nonce = solve(&challenge, 8);
        let ttl = Duration::minutes(10);

        assert_eq!(verify(SECRET, &challenge, &nonce, 8, ttl, now), Ok(()));
        assert_eq!(
            verify(SECRET, &challenge, &nonce, 8, ttl, now + Duration::minutes(11)),
            Err(PowError::Expired)
        );
        assert_eq!(
            verify(b"other", &challenge, &nonce, 8, ttl, now),
            Err(PowError::BadSignature)
        );
    }

    #[test]
    fn test_rejects_forged_and_lazy() {
        let now = Utc::now();
        let ttl = Duration::minutes(10);
        assert_eq!(
            verify(SECRET, "nonsense", "1", 0, ttl, now),
            Err(PowError::Malformed)
        );

        let forged = format!("{}.{}", now.timestamp(), "00".repeat(32));
        assert_eq!(
            verify(SECRET, &forged, "1", 0, ttl, now),
            Err(PowError::BadSignature)
        );

        // 64 zero bits is out of reach for nonce "x"
        let challenge = issue_challenge(SECRET, now);
        assert_eq!(
            verify(SECRET, &challenge, "x", 64, ttl, now),
            Err(PowError::InsufficientWork)
        );
    }

    #[test]
    fn test_csrf_token() {
        let token = csrf_token(SECRET, "abc");
        assert!(csrf_token_matches(SECRET, "abc", &token));
        assert!(!csrf_token_matches(SECRET, "abd", &token));
        assert!(!csrf_token_matches(SECRET, "abc", ""));
    }
}
