//! Session tokens: HS256-signed JWTs asserting an account's email and role.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use timetable_core::types::{DbId, Role};
use timetable_core::TimetableError;
use tracing::debug;

/// Minimum accepted signing secret length.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("JWT secret must be at least {MIN_SECRET_LEN} characters")]
    WeakSecret,

    #[error("Failed to sign session token: {0}")]
    Signing(String),

    #[error("Token expired")]
    Expired,

    #[error("{0}")]
    Invalid(&'static str),
}

impl From<AuthError> for TimetableError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Expired | AuthError::Invalid(_) => TimetableError::InvalidToken,
            AuthError::WeakSecret | AuthError::Signing(_) => TimetableError::internal(err.to_string()),
        }
    }
}

/// Payload carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id within its table.
    pub sub: DbId,
    pub email: String,
    pub role: Role,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct SessionManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionManager {
    /// Build a manager. Rejects short secrets.
    pub fn new(secret: &str, ttl_secs: u64) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::WeakSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX / 1000)),
        })
    }

    /// Sign a token for an authenticated account.
    pub fn issue(&self, account_id: DbId, email: &str, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id,
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Verify signature and expiry and return the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                debug!(error = %err, "Session token rejected");
                match err.kind() {
                    ErrorKind::ExpiredSignature => AuthError::Expired,
                    ErrorKind::InvalidSignature => AuthError::Invalid("Invalid signature"),
                    _ => AuthError::Invalid("Invalid token"),
                }
            })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

    #[test]
    fn test_issue_and_verify() {
        let sessions = SessionManager::new(SECRET, 3600).unwrap();
        let token = sessions.issue(42, "a@x.com", Role::Faculty).unwrap();

        let claims = sessions.verify(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.role, Role::Faculty);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_rejects_weak_secret() {
        assert!(matches!(
            SessionManager::new("short", 3600),
            Err(AuthError::WeakSecret)
        ));
    }

    #[test]
    fn test_rejects_foreign_signature() {
        let ours = SessionManager::new(SECRET, 3600).unwrap();
        let theirs = SessionManager::new("another-secret-that-is-long-enough-too", 3600).unwrap();
        let token = theirs.issue(1, "a@x.com", Role::Admin).unwrap();

        let err = ours.verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
        assert!(matches!(TimetableError::from(err), TimetableError::InvalidToken));
    }

    #[test]
    fn test_rejects_expired_token() {
        let sessions = SessionManager::new(SECRET, 3600).unwrap();
        let past = Utc::now() - Duration::hours(2);
        let claims = Claims {
            sub: 1,
            email: "a@x.com".into(),
            role: Role::Student,
            iat: past.timestamp(),
            exp: (past + Duration::hours(1)).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();

        assert!(matches!(sessions.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn test_rejects_garbage() {
        let sessions = SessionManager::new(SECRET, 3600).unwrap();
        assert!(sessions.verify("not.a.jwt").is_err());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(None), None);
    }
}
