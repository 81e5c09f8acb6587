//! Signed session tokens.
//!
//! A token is `base64url(claims) "." base64url(hmac_sha256(secret, claims))`.
//! Nothing is stored server-side: a token is valid while its signature checks
//! out and its expiry lies in the future.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::err::Error;
use crate::models::User;

pub const TOKEN_COOKIE: &str = "auth_token";
/// Seven days, shared by the token expiry and the cookie max-age.
pub const TOKEN_LIFETIME_SECS: i64 = 60 * 60 * 24 * 7;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    /// Unix seconds.
    pub issued_at: i64,
    /// Unix seconds.
    pub expires_at: i64,
}

impl Claims {
    pub fn for_user(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            issued_at: now.timestamp(),
            expires_at: (now + Duration::seconds(TOKEN_LIFETIME_SECS)).timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Malformed session token")]
    Malformed,
    #[error("Invalid session token signature")]
    BadSignature,
    #[error("Session expired")]
    Expired,
}

impl From<TokenError> for Error {
    fn from(err: TokenError) -> Self {
        Error::unauthorized(err.to_string())
    }
}

#[derive(Clone)]
pub struct SessionKeys {
    secret: Arc<[u8]>,
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new<S: Into<Vec<u8>>>(secret: S) -> Self {
        Self {
            secret: secret.into().into(),
        }
    }

    /// A fresh random secret. Tokens signed with it die with the process.
    pub fn generate() -> Self {
        let secret: [u8; 32] = thread_rng().gen();
        Self::new(secret.to_vec())
    }

    fn mac(&self) -> Result<HmacSha256, hmac::digest::InvalidLength> {
        <HmacSha256 as Mac>::new_from_slice(&self.secret)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, Error> {
        let payload = serde_json::to_vec(claims)?;
        let mut mac = self.mac().map_err(|err| Error::InternalError {
            kind: "TokenError",
            message: err.to_string(),
        })?;
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac().map_err(|_| TokenError::BadSignature)?;
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        if claims.expires_at <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

/// `Set-Cookie` value carrying a freshly issued token.
pub fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        TOKEN_COOKIE, token, TOKEN_LIFETIME_SECS
    )
}

/// `Set-Cookie` value that makes the client drop its token.
pub fn cleared_cookie() -> String {
    format!("{}=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax", TOKEN_COOKIE)
}
