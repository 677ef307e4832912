use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Default lifetime of verification and password reset tokens (1 hour)
pub const DEFAULT_TOKEN_TTL_MS: i64 = 60 * 60 * 1000;

/// Opaque single-use token with its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Generates a random token (UUID v4) expiring `ttl_ms` milliseconds from now.
/// `None` or a non-positive ttl falls back to 1 hour.
pub fn generate_token(ttl_ms: Option<i64>) -> GeneratedToken {
    let ttl_ms = match ttl_ms {
        Some(ms) if ms > 0 => ms,
        _ => DEFAULT_TOKEN_TTL_MS,
    };

    GeneratedToken {
        token: Uuid::new_v4().to_string(),
        expires_at: Utc::now() + Duration::milliseconds(ttl_ms),
    }
}

/// A token is accepted only while `now` is strictly before its expiry
pub fn is_live(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now < expires_at
}
