//! The sqlite store holding `users` and `students`.
//!
//! One [`Store`] is opened at startup and shared by every request through
//! [`crate::AppContext`]. Each method runs independent statements; sqlite
//! serializes concurrent writers on its own.

use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, Utc};
use pbkdf2::password_hash::{PasswordHasher, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::AdminSeed;
use crate::err::Error;
use crate::io::{is_in_memory, prepare_io};
use crate::models::{blank_to_none, nullable, NewStudent, Student, StudentPatch, User};

const FILE_POOL_CONNECTIONS: u32 = 5;

const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    created_at TEXT NOT NULL
)
"#;

const CREATE_STUDENTS: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    phone TEXT,
    date_of_birth TEXT,
    address TEXT,
    enrollment_date TEXT NOT NULL,
    major TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// Hashes a password into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Pbkdf2.hash_password(password.as_bytes(), &salt)?.to_string())
}

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connects to `url`, creating the database file (and its directory) when missing.
    ///
    /// In-memory databases live on a single connection that is never recycled,
    /// otherwise every pooled connection would see its own empty database.
    pub async fn open(url: &str) -> anyhow::Result<Self> {
        prepare_io(url).await?;

        let mut options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url `{}`", url))?
            .create_if_missing(true);

        let pool_options = if is_in_memory(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options = options.journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new().max_connections(FILE_POOL_CONNECTIONS)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("connecting to `{}`", url))?;
        log::debug!("Opened student store at {}", url);
        Ok(Self { pool })
    }

    /// Creates missing tables and seeds the administrator if absent.
    pub async fn prepare(&self, admin: &AdminSeed) -> anyhow::Result<()> {
        sqlx::query(CREATE_USERS)
            .execute(&self.pool)
            .await
            .context("creating users table")?;
        sqlx::query(CREATE_STUDENTS)
            .execute(&self.pool)
            .await
            .context("creating students table")?;

        if self.find_user_by_username(&admin.username).await?.is_some() {
            return Ok(());
        }

        let hash = hash_password(&admin.password)?;
        let res = sqlx::query(
            "INSERT OR IGNORE INTO users (username, password_hash, email, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&admin.username)
        .bind(hash)
        .bind(&admin.email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("seeding administrator")?;

        if res.rows_affected() >= 1 {
            log::info!("Seeded administrator account `{}`", admin.username);
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ? LIMIT 1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list_students(&self) -> Result<Vec<Student>, Error> {
        let students = sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(students)
    }

    pub async fn find_student(&self, id: i64) -> Result<Option<Student>, Error> {
        let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ? LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(student)
    }

    /// Inserts a validated student and returns the assigned id.
    pub async fn insert_student(
        &self,
        student: &NewStudent,
        now: DateTime<Utc>,
    ) -> Result<i64, Error> {
        student.validate()?;
        let enrollment_date = blank_to_none(student.enrollment_date.as_deref())
            .unwrap_or_else(|| now.date_naive().format("%Y-%m-%d").to_string());

        let res = sqlx::query(
            r#"
            INSERT INTO students (first_name, last_name, email, phone, date_of_birth, address,
                                  enrollment_date, major, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(nullable(&student.phone))
        .bind(nullable(&student.date_of_birth))
        .bind(nullable(&student.address))
        .bind(enrollment_date)
        .bind(nullable(&student.major))
        .bind(student.status.unwrap_or_default())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(res.last_insert_rowid())
    }

    /// Applies `patch` to the stored row. Returns `None` when no such student
    /// exists, including when it is deleted before the write lands.
    pub async fn update_student(
        &self,
        id: i64,
        patch: &StudentPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Student>, Error> {
        let mut student = match self.find_student(id).await? {
            Some(student) => student,
            None => return Ok(None),
        };
        patch.apply(&mut student)?;
        student.updated_at = now;

        if !self.write_student(&student).await? {
            return Ok(None);
        }
        Ok(Some(student))
    }

    /// Overwrites the row with `student.id`. Returns whether a row matched.
    async fn write_student(&self, student: &Student) -> Result<bool, Error> {
        let res = sqlx::query(
            r#"
            UPDATE students
            SET first_name = ?, last_name = ?, email = ?, phone = ?, date_of_birth = ?,
                address = ?, enrollment_date = ?, major = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(&student.phone)
        .bind(&student.date_of_birth)
        .bind(&student.address)
        .bind(&student.enrollment_date)
        .bind(&student.major)
        .bind(student.status)
        .bind(student.updated_at)
        .bind(student.id)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() >= 1)
    }

    /// Returns whether a row was removed.
    pub async fn delete_student(&self, id: i64) -> Result<bool, Error> {
        let res = sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() >= 1)
    }

    #[cfg(test)]
    pub async fn count_students_with_email(&self, email: &str) -> Result<i64, Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM students WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
