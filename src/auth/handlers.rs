use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AckResponse, LoginRequest, MeResponse, SignupRequest, SignupResponse,
            VerifyEmailRequest, VerifyEmailResponse,
        },
        jwt::{removal_cookie, session_cookie, AuthUser, SessionKeys},
        password::{hash_password, verify_password},
        repo::{is_unique_violation, User},
    },
    error::AuthError,
    mailer::{send_account_email, EmailKind},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/signUp", post(sign_up))
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/me", get(me))
        .route("/users/verifyemail", post(verify_email))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    payload: Option<Json<SignupRequest>>,
) -> Result<(StatusCode, Json<SignupResponse>), AuthError> {
    let Some(Json(mut payload)) = payload else {
        warn!("signup payload missing or malformed");
        return Err(AuthError::validation("Missing request body"));
    };
    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.username.is_empty() {
        warn!("signup without username");
        return Err(AuthError::validation("Username is required"));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AuthError::validation("Invalid email"));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(AuthError::validation("Password too short"));
    }

    if User::find_by_email(&state.db, &payload.email)
        .await?
        .is_some()
    {
        warn!(email = %payload.email, "email already registered");
        return Err(AuthError::EmailTaken);
    }

    let hash = hash_password(&payload.password)?;

    let user = match User::create(&state.db, &payload.username, &payload.email, &hash).await {
        Ok(user) => user,
        // Two signups can race past the pre-check; the unique index settles it.
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %payload.email, "email already registered");
            return Err(AuthError::EmailTaken);
        }
        Err(e) => return Err(e.into()),
    };

    // The account stands even if the verification mail never goes out;
    // only persisting the token can fail the request.
    send_account_email(&state, &user, EmailKind::Verification).await?;

    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User signed up successfully".into(),
            saved_user: user.into(),
        }),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Option<Json<LoginRequest>>,
) -> Result<(CookieJar, Json<AckResponse>), AuthError> {
    let Some(Json(mut payload)) = payload else {
        warn!("login payload missing or malformed");
        return Err(AuthError::validation("Missing request body"));
    };
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AuthError::validation("Invalid email"));
    }

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            AuthError::UnknownUser
        })?;

    if !verify_password(&payload.password, &user.password_hash) {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let token = SessionKeys::from_ref(&state).sign(&user)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((
        jar.add(session_cookie(token)),
        Json(AckResponse {
            message: "Login successful".into(),
            success: true,
        }),
    ))
}

/// Purely client-side teardown. The JWT stays valid until its own expiry;
/// we only clear the cookie.
#[instrument(skip(jar))]
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<AckResponse>) {
    (
        jar.add(removal_cookie()),
        Json(AckResponse {
            message: "Logout successful".into(),
            success: true,
        }),
    )
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MeResponse>, AuthError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %user_id, "session user no longer exists");
            AuthError::NotFound
        })?;

    Ok(Json(MeResponse {
        message: "User found".into(),
        data: user.into(),
        success: true,
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> Result<Json<VerifyEmailResponse>, AuthError> {
    let Some(Json(payload)) = payload else {
        warn!("verify-email payload missing or malformed");
        return Err(AuthError::validation("Missing request body"));
    };
    let token = payload.token.trim();
    if token.is_empty() {
        warn!("verify-email with empty token");
        return Err(AuthError::validation("Token is required"));
    }

    let user = User::consume_verify_token(&state.db, token)
        .await?
        .ok_or_else(|| {
            warn!("verification token unknown, expired or already consumed");
            AuthError::InvalidOrExpiredToken
        })?;

    info!(user_id = %user.id, "email verified");
    Ok(Json(VerifyEmailResponse {
        message: "Email verified successfully".into(),
        user: user.into(),
    }))
}
