pub mod auth;
pub mod config;
pub mod err;
pub mod io;
pub mod models;
pub mod store;
pub mod students;
pub mod token;

use axum::body::Body;
use axum::handler::Handler;
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use tokio::time::Instant;

pub use crate::err::Error;
use crate::store::Store;
use crate::token::SessionKeys;

pub type Payload<T> = Result<Json<T>, Error>;
pub type Created<T> = Result<(StatusCode, Json<T>), Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Json(value))
}

pub fn creates<V>(value: V) -> Created<V>
where
    V: Serialize,
{
    Ok((StatusCode::CREATED, Json(value)))
}

pub fn breaks<V>(err: Error) -> Payload<V>
where
    V: Serialize,
{
    Err(err)
}

/// Everything a handler needs, installed once as a router extension.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub store: Store,
    pub keys: SessionKeys,
}

impl AppContext {
    pub fn new(store: Store, keys: SessionKeys) -> Self {
        Self { store, keys }
    }
}

pub fn router(ctx: AppContext) -> Router {
    auth::prime_unknown_user_hash();
    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route(
            "/api/students",
            get(students::list_students).post(students::create_student),
        )
        .route(
            "/api/students/:id",
            get(students::read_student)
                .put(students::update_student)
                .delete(students::delete_student),
        )
        .fallback(err::handler404.into_service())
        .layer(middleware::from_fn(log_requests))
        .layer(Extension(ctx))
}

async fn log_requests(req: Request<Body>, next: Next<Body>) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(req).await;
    log::info!(
        "{} {} -> {} in {:?}",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}
