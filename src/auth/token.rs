use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// One-time tokens expire an hour after issuance. Expiry is checked at
/// consumption time; expired tokens are never swept proactively.
pub const ONE_TIME_TOKEN_TTL: Duration = Duration::hours(1);

/// Derive a fresh one-time token for a user: a salted SHA-256 of the user
/// id, URL-safe encoded for use in an email link. The random salt makes
/// every issuance distinct.
pub fn issue(user_id: Uuid) -> (String, OffsetDateTime) {
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);

    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(salt);
    let token = URL_SAFE_NO_PAD.encode(hasher.finalize());

    (token, OffsetDateTime::now_utc() + ONE_TIME_TOKEN_TTL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_for_same_user_differ() {
        let user_id = Uuid::new_v4();
        let (first, _) = issue(user_id);
        let (second, _) = issue(user_id);
        assert_ne!(first, second);
    }

    #[test]
    fn token_is_url_safe() {
        let (token, _) = issue(Uuid::new_v4());
        // 32 hash bytes -> 43 unpadded base64 characters.
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn expiry_is_about_an_hour_ahead() {
        let (_, expires_at) = issue(Uuid::new_v4());
        let remaining = expires_at - OffsetDateTime::now_utc();
        assert!(remaining > Duration::minutes(59));
        assert!(remaining <= Duration::hours(1));
    }
}
