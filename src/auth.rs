// src/auth.rs
//! Account credentials and bearer tokens.
//!
//! Passwords are stored as bcrypt hashes. Login issues an HS256 JWT carrying the
//! account email; [`AuthUser`] guards routes that need one.

use std::time::Duration;

use anyhow::{Context, Result};
use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::AppState;
use crate::error::AuthError;
use crate::store::{InsertOutcome, UserStore};

/// Work factor for new password hashes.
pub const BCRYPT_COST: u32 = 10;

pub const TEST_USER_EMAIL: &str = "test@example.com";
pub const TEST_USER_PASSWORD: &str = "Test@123";

/// Token payload. Also what `/api/user-profile` echoes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Password hashing and token signing with one process-wide secret.
pub struct Authenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    cost: u32,
}

impl Authenticator {
    pub fn new(secret: &[u8], ttl: Duration, cost: u32) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::default(),
            ttl,
            cost,
        }
    }

    pub fn issue(&self, email: &str) -> Result<String> {
        self.issue_at(email, chrono::Utc::now().timestamp())
    }

    /// Sign a token as if issued at `issued_at` (unix seconds).
    pub fn issue_at(&self, email: &str, issued_at: i64) -> Result<String> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            email: email.to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl),
        };
        encode(&Header::default(), &claims, &self.encoding).context("signing token")
    }

    /// Signature and expiry check. Any failure is just "invalid".
    pub fn verify(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .ok()
    }

    /// bcrypt is CPU bound, so it runs on the blocking pool.
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .context("hash task")?
            .context("hashing password")
    }

    pub async fn password_matches(&self, password: &str, hash: &str) -> Result<bool> {
        let (password, hash) = (password.to_string(), hash.to_string());
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .context("verify task")?
            .context("verifying password")
    }
}

/// Parses `JWT_EXPIRES_IN` values such as `3600`, `90s`, `30m`, `1h`, `7d`.
pub fn parse_ttl(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (num, unit) = raw.split_at(split);
    let n: u64 = num.parse().ok()?;
    let mult = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => return None,
    };
    Some(Duration::from_secs(n.checked_mul(mult)?)).filter(|d| !d.is_zero())
}

/// Creates the well-known local account unless it already exists.
pub async fn seed_test_user(users: &dyn UserStore, auth: &Authenticator) -> Result<()> {
    if users.password_hash(TEST_USER_EMAIL).await?.is_some() {
        info!(email = TEST_USER_EMAIL, "test user already exists");
        return Ok(());
    }
    let hash = auth.hash_password(TEST_USER_PASSWORD).await?;
    match users.create_user(TEST_USER_EMAIL, &hash).await? {
        InsertOutcome::Inserted => warn!(email = TEST_USER_EMAIL, "test user created"),
        InsertOutcome::AlreadyPresent => {
            info!(email = TEST_USER_EMAIL, "test user already exists")
        }
    }
    Ok(())
}

/// Claims of a request carrying a valid `Authorization: Bearer <jwt>` header.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .ok_or(AuthError::Unauthorized("Access Denied. No token provided."))?;
        let raw = raw
            .to_str()
            .map_err(|_| AuthError::Unauthorized("Invalid Token"))?;
        let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();

        state
            .auth
            .verify(token)
            .map(AuthUser)
            .ok_or(AuthError::Unauthorized("Invalid Token"))
    }
}
