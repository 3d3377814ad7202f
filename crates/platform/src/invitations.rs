//! Admin invitations: random single-use tokens handed out of band.
//! Only the SHA-256 digest of a token is ever stored.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Prefix that makes invitation tokens recognisable in support requests.
pub const INVITE_TOKEN_PREFIX: &str = "tt_inv_";

/// A freshly generated invitation. `token` is shown once and discarded.
#[derive(Debug, Clone)]
pub struct IssuedInvitation {
    pub token: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvitationError {
    #[error("Invitation lifetime of {0} hours is out of range")]
    LifetimeOutOfRange(i64),
}

/// Generate a random token valid for `ttl_hours`.
pub fn generate_invitation(ttl_hours: i64) -> Result<IssuedInvitation, InvitationError> {
    let expires_at = Duration::try_hours(ttl_hours)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or(InvitationError::LifetimeOutOfRange(ttl_hours))?;

    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    let token = format!("{}{}", INVITE_TOKEN_PREFIX, hex::encode(bytes));
    let token_hash = hash_token(&token);

    Ok(IssuedInvitation {
        token,
        token_hash,
        expires_at,
    })
}

/// Hex SHA-256 digest used as the lookup key for a token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.trim().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_unique_and_hashed() {
        let a = generate_invitation(72).unwrap();
        let b = generate_invitation(72).unwrap();

        assert!(a.token.starts_with(INVITE_TOKEN_PREFIX));
        assert_eq!(a.token.len(), INVITE_TOKEN_PREFIX.len() + 64);
        assert_ne!(a.token, b.token);
        assert_eq!(a.token_hash, hash_token(&a.token));
        assert!(!a.token_hash.contains(&a.token));
        assert!(a.expires_at > Utc::now() + Duration::hours(71));
    }

    #[test]
    fn test_huge_lifetime_is_rejected() {
        assert_eq!(
            generate_invitation(i64::MAX).unwrap_err(),
            InvitationError::LifetimeOutOfRange(i64::MAX)
        );
        // Representable as a duration but past the last representable date.
        assert!(generate_invitation(i64::MAX / 3_600_000).is_err());
    }

    #[test]
    fn test_hash_ignores_surrounding_whitespace() {
        assert_eq!(hash_token(" tt_inv_abc \n"), hash_token("tt_inv_abc"));
        assert_eq!(hash_token("x").len(), 64);
    }
}
