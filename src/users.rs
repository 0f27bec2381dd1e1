//! User accounts: SQLite repository plus registration and login.

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::info;

use crate::auth::{hash_password, verify_password, AuthError, TokenService};

pub const DEFAULT_ROLE: &str = "USER";

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub roles: Vec<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default, alias = "fullName")]
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the token expires.
    pub expires_in: i64,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
}

fn split_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_roles(roles: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for role in roles {
        let role = role.trim().to_uppercase();
        if !role.is_empty() && !out.contains(&role) {
            out.push(role);
        }
    }
    if out.is_empty() {
        out.push(DEFAULT_ROLE.to_string());
    }
    out
}

pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn username_taken(&self, username: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
            .bind(username)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn email_taken(&self, email: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower(?))")
            .bind(email)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn insert(&self, user: &User, password_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, full_name, password_hash, roles, enabled, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(password_hash)
        .bind(user.roles.join(","))
        .bind(user.enabled)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The user and its stored password hash.
    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, username, email, full_name, password_hash, roles, enabled FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<(User, String), sqlx::Error> {
            let roles: String = row.try_get("roles")?;
            let user = User {
                id: row.try_get("id")?,
                username: row.try_get("username")?,
                email: row.try_get("email")?,
                full_name: row.try_get("full_name")?,
                roles: split_roles(&roles),
                enabled: row.try_get("enabled")?,
            };
            Ok((user, row.try_get("password_hash")?))
        })
        .transpose()
    }
}

fn validate_registration(req: &RegisterRequest) -> Result<(), AccountError> {
    let username_len = req.username.trim().chars().count();
    if !(3..=50).contains(&username_len) {
        return Err(AccountError::Invalid(
            "username must be between 3 and 50 characters".to_string(),
        ));
    }
    if !req.email.contains('@') {
        return Err(AccountError::Invalid("email is not valid".to_string()));
    }
    if req.password.chars().count() < 6 {
        return Err(AccountError::Invalid(
            "password must be at least 6 characters".to_string(),
        ));
    }
    Ok(())
}

/// Create a new account. Roles default to `USER`.
pub async fn register(repo: &UserRepository, req: RegisterRequest) -> Result<User, AccountError> {
    validate_registration(&req)?;

    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();

    if repo.username_taken(&username).await? {
        return Err(AccountError::Conflict(format!(
            "username '{}' is already taken",
            username
        )));
    }
    if repo.email_taken(&email).await? {
        return Err(AccountError::Conflict(format!(
            "email '{}' is already registered",
            email
        )));
    }

    let password_hash = hash_password(&req.password)?;
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        username,
        email,
        full_name: req.full_name.trim().to_string(),
        roles: normalize_roles(&req.roles),
        enabled: true,
    };

    // Two concurrent registrations can both pass the checks above.
    repo.insert(&user, &password_hash).await.map_err(|e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return AccountError::Conflict(
                    "username or email is already registered".to_string(),
                );
            }
        }
        AccountError::Database(e)
    })?;

    info!(username = %user.username, roles = ?user.roles, "user registered");
    Ok(user)
}

/// Check credentials and issue an access token.
pub async fn login(
    repo: &UserRepository,
    tokens: &TokenService,
    req: LoginRequest,
) -> Result<AuthResponse, AccountError> {
    let (user, hash) = repo
        .find_by_username(req.username.trim())
        .await?
        .ok_or(AuthError::BadCredentials)?;

    if !user.enabled || !verify_password(&req.password, &hash)? {
        return Err(AuthError::BadCredentials.into());
    }

    let access_token = tokens.issue(&user.username, &user.roles)?;
    info!(username = %user.username, "user logged in");

    Ok(AuthResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: tokens.ttl_secs(),
        username: user.username,
        email: user.email,
        roles: user.roles,
    })
}
