use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::repo::User;
use crate::error::AuthError;
use crate::state::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "token";

/// Sessions live for one day from issuance. There is no refresh or
/// revocation; the token expires on its own.
const SESSION_TTL: Duration = Duration::days(1);

/// Session token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    pub iat: usize,
    pub exp: usize,
}

/// Signing and verification keys derived from the process-wide secret.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.config.token_secret.as_bytes())
    }
}

impl SessionKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a session token for a user, expiring in one day.
    pub fn sign(&self, user: &User) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + SESSION_TTL;
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, "session token signed");
        Ok(token)
    }

    /// Decode and validate a session token. Fails on a bad signature, an
    /// elapsed expiry, or a payload missing the user id.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        debug!(user_id = %data.claims.sub, "session token verified");
        Ok(data.claims)
    }
}

/// Cookie carrying a freshly issued session token. HTTP-only, no Max-Age:
/// the browser drops it on close and the JWT's own `exp` bounds its life.
pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .path("/")
        .build()
}

/// Replacement cookie that clears the session: empty value, past expiry,
/// root path.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .path("/")
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

/// Extracts the session cookie, verifies it, and yields the user id.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_owned())
            .ok_or(AuthError::Unauthorized)?;

        let claims = match keys.verify(&token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired session token");
                return Err(AuthError::Unauthorized);
            }
        };

        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::http::{header, Request};
    use jsonwebtoken::errors::ErrorKind;

    fn make_keys() -> SessionKeys {
        SessionKeys::from_ref(&AppState::fake())
    }

    fn make_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "a@x.com".into(),
            password_hash: "hash".into(),
            is_verified: false,
            verify_token: None,
            verify_token_expiry: None,
            forgot_password_token: None,
            forgot_password_expiry: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn sign_and_verify_roundtrip() {
        let keys = make_keys();
        let user = make_user();
        let token = keys.sign(&user).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.email, "a@x.com");
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        let user = make_user();
        let now = OffsetDateTime::now_utc();
        // Issued two days ago, expired one day ago; well past the leeway.
        let claims = Claims {
            sub: user.id,
            username: user.username,
            email: user.email,
            iat: (now - Duration::days(2)).unix_timestamp() as usize,
            exp: (now - Duration::days(1)).unix_timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("encode");
        let err = keys.verify(&token).unwrap_err();
        let kind = err
            .downcast_ref::<jsonwebtoken::errors::Error>()
            .map(jsonwebtoken::errors::Error::kind);
        assert!(matches!(kind, Some(ErrorKind::ExpiredSignature)));
    }

    #[tokio::test]
    async fn verify_rejects_tampered_token() {
        let keys = make_keys();
        let token = keys.sign(&make_user()).expect("sign");
        let mut tampered = token.into_bytes();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).expect("utf8");
        assert!(keys.verify(&tampered).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_token_without_user_id() {
        #[derive(Serialize)]
        struct BareClaims {
            username: String,
            iat: usize,
            exp: usize,
        }
        let now = OffsetDateTime::now_utc();
        let claims = BareClaims {
            username: "alice".into(),
            iat: now.unix_timestamp() as usize,
            exp: (now + Duration::days(1)).unix_timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("encode");
        assert!(make_keys().verify(&token).is_err());
    }

    #[test]
    fn session_cookie_is_http_only_with_no_max_age() {
        let cookie = session_cookie("abc".into());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert!(cookie.max_age().is_none());
        assert!(cookie.expires().is_none());
    }

    #[test]
    fn removal_cookie_is_empty_and_expired() {
        let cookie = removal_cookie();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.path(), Some("/"));
        let expires = cookie.expires_datetime().expect("expiry set");
        assert!(expires < OffsetDateTime::now_utc());
    }

    #[tokio::test]
    async fn extractor_rejects_missing_cookie() {
        let state = AppState::fake();
        let req = Request::builder().uri("/users/me").body(()).expect("request");
        let (mut parts, _) = req.into_parts();
        let result = AuthUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::Unauthorized)));
    }

    #[tokio::test]
    async fn extractor_accepts_valid_cookie() {
        let state = AppState::fake();
        let user = make_user();
        let token = SessionKeys::from_ref(&state).sign(&user).expect("sign");
        let req = Request::builder()
            .uri("/users/me")
            .header(header::COOKIE, format!("{SESSION_COOKIE}={token}"))
            .body(())
            .expect("request");
        let (mut parts, _) = req.into_parts();
        let AuthUser(id) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("extract");
        assert_eq!(id, user.id);
    }

    #[tokio::test]
    async fn extractor_rejects_garbage_cookie() {
        let state = AppState::fake();
        let req = Request::builder()
            .uri("/users/me")
            .header(header::COOKIE, format!("{SESSION_COOKIE}=not-a-jwt"))
            .body(())
            .expect("request");
        let (mut parts, _) = req.into_parts();
        let result = AuthUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::Unauthorized)));
    }
}
