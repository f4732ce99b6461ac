use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{NewUser, RefreshToken, RefreshTokenInput, RefreshTokenStore, User, UserChanges, UserStore};
use crate::error::AppError;

/// Postgres-backed storage; errors are classified by `From<sqlx::Error>`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    #[tracing::instrument(name = "create_user", skip(self, new_user), fields(username = %new_user.username))]
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, username, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at, updated_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at, updated_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user_by_id(&self, id: Uuid, changes: UserChanges) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                updated_at = $5
            WHERE id = $1
            RETURNING id, username, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete_user_by_id(&self, id: Uuid) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            DELETE FROM users
            WHERE id = $1
            RETURNING id, username, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn create_token_and_return_user(&self, input: RefreshTokenInput) -> Result<User, AppError> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            WITH inserted AS (
                INSERT INTO refresh_tokens (id, token, expiry_date, user_id, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $5)
                RETURNING user_id
            )
            SELECT u.id, u.username, u.email, u.password_hash, u.created_at, u.updated_at
            FROM users u
            JOIN inserted i ON u.id = i.user_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.token)
        .bind(input.expiry_date)
        .bind(input.user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn replace_token_and_return_user(&self, input: RefreshTokenInput) -> Result<User, AppError> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            WITH upserted AS (
                INSERT INTO refresh_tokens (id, token, expiry_date, user_id, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $5)
                ON CONFLICT ON CONSTRAINT refresh_tokens_user_id_key DO UPDATE
                SET id = EXCLUDED.id,
                    token = EXCLUDED.token,
                    expiry_date = EXCLUDED.expiry_date,
                    created_at = EXCLUDED.created_at,
                    updated_at = EXCLUDED.updated_at
                RETURNING user_id
            )
            SELECT u.id, u.username, u.email, u.password_hash, u.created_at, u.updated_at
            FROM users u
            JOIN upserted i ON u.id = i.user_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.token)
        .bind(input.expiry_date)
        .bind(input.user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_token_by_user_id(&self, user_id: Uuid) -> Result<RefreshToken, AppError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, token, expiry_date, user_id, created_at, updated_at
            FROM refresh_tokens
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(token)
    }

    async fn update_token_by_user_id(&self, input: RefreshTokenInput) -> Result<RefreshToken, AppError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            UPDATE refresh_tokens
            SET token = $1, expiry_date = $2, updated_at = $3
            WHERE user_id = $4
            RETURNING id, token, expiry_date, user_id, created_at, updated_at
            "#,
        )
        .bind(&input.token)
        .bind(input.expiry_date)
        .bind(Utc::now())
        .bind(input.user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(token)
    }

    async fn delete_token_by_user_id(&self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
