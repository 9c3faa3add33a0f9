use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for email verification.
#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// Public projection of a user. Never carries the password hash or any
/// pending one-time tokens.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(rename = "isVerified")]
    pub is_verified: bool,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

/// Response returned after a successful registration.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: String,
    #[serde(rename = "savedUser")]
    pub saved_user: PublicUser,
}

/// Flat acknowledgement used by login and logout.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub message: String,
    pub success: bool,
}

/// Response for the current-user lookup.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub message: String,
    pub data: PublicUser,
    pub success: bool,
}

/// Short summary returned once a verification token is consumed.
#[derive(Debug, Serialize)]
pub struct VerifiedUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(rename = "isVerified")]
    pub is_verified: bool,
}

impl From<User> for VerifiedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_verified: user.is_verified,
        }
    }
}

/// Response returned once a verification token is consumed.
#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub message: String,
    pub user: VerifiedUser,
}
