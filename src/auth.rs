use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, RequestParts};
use axum::headers::authorization::Bearer;
use axum::headers::{Authorization, Cookie};
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use axum::{async_trait, Extension, Json, TypedHeader};
use chrono::Utc;
use lazy_static::lazy_static;
use pbkdf2::password_hash::{PasswordHash, PasswordVerifier};
use pbkdf2::Pbkdf2;
use serde::{Deserialize, Serialize};

use crate::models::{Message, User, UserSummary};
use crate::store::{hash_password, Store};
use crate::token::{cleared_cookie, session_cookie, Claims, TOKEN_COOKIE};
use crate::{proceeds, AppContext, Error, Payload};

lazy_static! {
    /// Checked against when the username is unknown, so that path costs the
    /// same PBKDF2 run as a wrong password.
    static ref UNKNOWN_USER_HASH: Option<String> = hash_password("unknown-user").ok();
}

#[cfg(test)]
thread_local! {
    static PASSWORD_CHECKS: std::cell::Cell<usize> = std::cell::Cell::new(0);
}

/// Computes the placeholder hash up front instead of on the first failed login.
pub fn prime_unknown_user_hash() {
    lazy_static::initialize(&UNKNOWN_USER_HASH);
}

fn password_matches(password: &str, phc: &str) -> Result<bool, Error> {
    #[cfg(test)]
    PASSWORD_CHECKS.with(|checks| checks.set(checks.get() + 1));

    let hash = PasswordHash::new(phc)?;
    Ok(Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok())
}

/// Looks up `username` and checks `password` against its stored hash.
///
/// Both inputs must be non-empty. Unknown users and wrong passwords fail the
/// same way and take the same time.
pub async fn verify_credentials(
    store: &Store,
    username: &str,
    password: &str,
) -> Result<User, Error> {
    if username.is_empty() || password.is_empty() {
        return Err(Error::bad_request("Username and password are required"));
    }

    let user = match store.find_user_by_username(username).await? {
        Some(user) => user,
        None => {
            if let Some(hash) = UNKNOWN_USER_HASH.as_deref() {
                password_matches(password, hash)?;
            }
            return Err(Error::InvalidCredentials);
        }
    };

    if !password_matches(password, &user.password_hash)? {
        return Err(Error::InvalidCredentials);
    }
    Ok(user)
}

pub async fn login(
    Extension(ctx): Extension<AppContext>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(login) = payload?;
    let username = login.username.unwrap_or_default();
    let password = login.password.unwrap_or_default();

    let user = match verify_credentials(&ctx.store, &username, &password).await {
        Ok(user) => user,
        Err(Error::InvalidCredentials) => {
            log::warn!("Rejected login for {:?}", username);
            return Err(Error::InvalidCredentials);
        }
        Err(err) => return Err(err),
    };

    let token = ctx.keys.sign(&Claims::for_user(&user, Utc::now()))?;
    log::info!("User `{}` logged in", user.username);

    let body = LoggedIn {
        message: "Login successful".to_string(),
        user: UserSummary::from(&user),
        token: token.clone(),
    };
    Ok(([(SET_COOKIE, session_cookie(&token))], Json(body)).into_response())
}

pub async fn logout() -> Response {
    (
        [(SET_COOKIE, cleared_cookie())],
        Json(Message::new("Logout successful")),
    )
        .into_response()
}

pub async fn me(Authenticated(claims): Authenticated) -> Payload<UserSummary> {
    proceeds(UserSummary {
        id: claims.user_id,
        username: claims.username,
        email: claims.email,
    })
}

/// Extractor for routes that need a signed-in user.
///
/// Reads the token from `Authorization: Bearer` first, then from the
/// session cookie, and rejects with 401 unless it verifies.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Claims);

#[async_trait]
impl<B> FromRequest<B> for Authenticated
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let ctx = req
            .extensions()
            .get::<AppContext>()
            .cloned()
            .ok_or_else(|| Error::InternalError {
                kind: "MissingContext",
                message: "Application context is not installed".to_string(),
            })?;

        let bearer = Option::<TypedHeader<Authorization<Bearer>>>::from_request(req)
            .await
            .ok()
            .flatten()
            .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string());
        let token = match bearer {
            Some(token) => Some(token),
            None => Option::<TypedHeader<Cookie>>::from_request(req)
                .await
                .ok()
                .flatten()
                .and_then(|TypedHeader(cookie)| cookie.get(TOKEN_COOKIE).map(str::to_string)),
        };

        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::unauthorized("Authentication required"))?;
        let claims = ctx.keys.verify(&token, Utc::now())?;
        Ok(Self(claims))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedIn {
    pub message: String,
    pub user: UserSummary,
    pub token: String,
}
