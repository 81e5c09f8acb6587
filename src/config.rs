//! Server configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honoured when present.
//!
//! - `STUDENTS_DATABASE_URL` - sqlite url (default: `sqlite:data/students.db`)
//! - `STUDENTS_HOST` - bind address (default: 127.0.0.1)
//! - `STUDENTS_PORT` - listen port (default: 3000)
//! - `STUDENTS_TOKEN_SECRET` - session token signing secret, at least 32 bytes.
//!   A random secret is generated per process when unset.
//! - `STUDENTS_ADMIN_USERNAME`, `STUDENTS_ADMIN_PASSWORD`, `STUDENTS_ADMIN_EMAIL` -
//!   the administrator seeded into a fresh database.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/students.db";
pub const DEFAULT_PORT: u16 = 3000;
const MIN_TOKEN_SECRET_LENGTH: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Credentials of the administrator created when the store is first prepared.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl Default for AdminSeed {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin123".to_string(),
            email: "admin@example.com".to_string(),
        }
    }
}

impl fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSeed")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("email", &self.email)
            .finish()
    }
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub token_secret: Option<Vec<u8>>,
    pub admin: AdminSeed,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url)
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "token_secret",
                &self.token_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("admin", &self.admin)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            token_secret: None,
            admin: AdminSeed::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let host = match get("STUDENTS_HOST") {
            Some(raw) => raw.parse::<IpAddr>().map_err(|err| {
                ConfigError::InvalidEnvVar("STUDENTS_HOST".into(), err.to_string())
            })?,
            None => defaults.host,
        };
        let port = match get("STUDENTS_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|err| {
                ConfigError::InvalidEnvVar("STUDENTS_PORT".into(), err.to_string())
            })?,
            None => defaults.port,
        };

        let token_secret = match get("STUDENTS_TOKEN_SECRET") {
            Some(secret) if secret.len() < MIN_TOKEN_SECRET_LENGTH => {
                return Err(ConfigError::InsecureSecret(
                    "STUDENTS_TOKEN_SECRET".into(),
                    format!("must be at least {} bytes", MIN_TOKEN_SECRET_LENGTH),
                ))
            }
            Some(secret) => Some(secret.into_bytes()),
            None => None,
        };

        let admin = AdminSeed {
            username: get("STUDENTS_ADMIN_USERNAME").unwrap_or(defaults.admin.username),
            password: get("STUDENTS_ADMIN_PASSWORD").unwrap_or(defaults.admin.password),
            email: get("STUDENTS_ADMIN_EMAIL").unwrap_or(defaults.admin.email),
        };

        Ok(Self {
            database_url: get("STUDENTS_DATABASE_URL").unwrap_or(defaults.database_url),
            host,
            port,
            token_secret,
            admin,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
