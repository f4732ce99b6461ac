/// Persistence module
///
/// The authentication service only talks to storage through the two traits
/// below. `PgStore` is the relational implementation used in production,
/// `InMemoryStore` backs tests and local runs.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Unique constraint names, shared by both implementations.
pub const USERNAME_CONSTRAINT: &str = "users_username_key";
pub const EMAIL_CONSTRAINT: &str = "users_email_key";
pub const REFRESH_TOKEN_USER_CONSTRAINT: &str = "refresh_tokens_user_id_key";

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub token: String,
    pub expiry_date: DateTime<Utc>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Token row to insert, or the new contents of a user's existing row.
#[derive(Debug, Clone)]
pub struct RefreshTokenInput {
    pub user_id: Uuid,
    pub token: String,
    pub expiry_date: DateTime<Utc>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// # Errors
    /// `DatabaseError::UniqueConstraintViolation` naming the violated
    /// constraint when the username or email is taken.
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError>;
    async fn get_user_by_id(&self, id: Uuid) -> Result<User, AppError>;
    async fn get_user_by_email(&self, email: &str) -> Result<User, AppError>;
    async fn get_user_by_username(&self, username: &str) -> Result<User, AppError>;
    async fn update_user_by_id(&self, id: Uuid, changes: UserChanges) -> Result<User, AppError>;
    async fn delete_user_by_id(&self, id: Uuid) -> Result<User, AppError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Insert the user's token row and return the owning user. Fails with a
    /// unique violation if the user already has a row.
    async fn create_token_and_return_user(&self, input: RefreshTokenInput) -> Result<User, AppError>;
    /// Insert a fresh row for the user, replacing any existing one in the
    /// same step. Returns the owning user.
    async fn replace_token_and_return_user(&self, input: RefreshTokenInput) -> Result<User, AppError>;
    async fn get_token_by_user_id(&self, user_id: Uuid) -> Result<RefreshToken, AppError>;
    /// Overwrite token and expiry of the user's row in place.
    async fn update_token_by_user_id(&self, input: RefreshTokenInput) -> Result<RefreshToken, AppError>;
    /// Remove the user's row; succeeds when there is none.
    async fn delete_token_by_user_id(&self, user_id: Uuid) -> Result<(), AppError>;
}
