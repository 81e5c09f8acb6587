use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Sqlite extended result codes for unique and primary key violations.
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";

pub async fn handler404(path: Uri) -> Error {
    Error::NotFound {
        message: format!("Invalid path: {}", path),
    }
}

/// Every failure a handler can surface. Each variant renders as
/// `{"error": "<message>"}` with its own status code.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("{message}")]
    BadRequest { message: String },
    /// Unknown user and wrong password share this variant so the response
    /// never tells the two apart.
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{message}")]
    Unauthorized { message: String },
    #[error("{message}")]
    NotFound { message: String },
    #[error("{message}")]
    Conflict { message: String },
    #[error("{message}")]
    InternalError { kind: &'static str, message: String },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl Error {
    pub fn bad_request<S: Into<String>>(msg: S) -> Error {
        Error::BadRequest {
            message: msg.into(),
        }
    }

    pub fn unauthorized<S: Into<String>>(msg: S) -> Error {
        Error::Unauthorized {
            message: msg.into(),
        }
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Error {
        Error::NotFound {
            message: msg.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials | Error::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if let Error::InternalError { kind, message } = &self {
            log::error!("{}: {}", kind, message);
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

fn is_unique_violation(err: &(dyn sqlx::error::DatabaseError + 'static)) -> bool {
    let by_code = err
        .code()
        .map(|code| code == SQLITE_CONSTRAINT_UNIQUE || code == SQLITE_CONSTRAINT_PRIMARYKEY)
        .unwrap_or(false);
    by_code || err.message().contains("UNIQUE constraint failed")
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                message: "Record not found".to_string(),
            },
            sqlx::Error::Database(db) if is_unique_violation(&*db) => {
                let message = if db.message().contains(".email") {
                    "A record with this email already exists".to_string()
                } else {
                    format!("Duplicate record: {}", db.message())
                };
                Self::Conflict { message }
            }
            other => Self::InternalError {
                kind: "DatabaseError",
                message: other.to_string(),
            },
        }
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::InternalError {
            kind: "PasswordHashError",
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InternalError {
            kind: "SerializationError",
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest {
            message: format!("Invalid request body: {}", rejection),
        }
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest {
            message: format!("Invalid path parameter: {}", rejection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(Error::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::Conflict {
                message: "x".into()
            }
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::from(serde_json::from_str::<u8>("boom").unwrap_err()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            Error::from(sqlx::Error::RowNotFound),
            Error::NotFound { .. }
        ));
    }
}
