use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    NewUser, RefreshToken, RefreshTokenInput, RefreshTokenStore, User, UserChanges, UserStore,
    EMAIL_CONSTRAINT, REFRESH_TOKEN_USER_CONSTRAINT, USERNAME_CONSTRAINT,
};
use crate::error::{AppError, DatabaseError};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    refresh_tokens: HashMap<Uuid, RefreshToken>, // keyed by user id
}

impl Tables {
    /// Same uniqueness rules as the `users` table; `except` is the row being updated.
    fn check_unique(&self, username: &str, email: &str, except: Option<Uuid>) -> Result<(), AppError> {
        for user in self.users.values().filter(|u| Some(u.id) != except) {
            if user.username == username {
                return Err(DatabaseError::UniqueConstraintViolation(USERNAME_CONSTRAINT.to_string()).into());
            }
            if user.email == email {
                return Err(DatabaseError::UniqueConstraintViolation(EMAIL_CONSTRAINT.to_string()).into());
            }
        }
        Ok(())
    }
}

/// Storage backed by process memory. A single lock guards both tables so
/// cross-table rules (foreign key, cascade) hold.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("in-memory store lock poisoned".to_string()))
    }

    /// Number of stored users
    pub fn user_count(&self) -> usize {
        self.lock().map(|t| t.users.len()).unwrap_or(0)
    }

    /// Number of stored refresh-token rows
    pub fn refresh_token_count(&self) -> usize {
        self.lock().map(|t| t.refresh_tokens.len()).unwrap_or(0)
    }
}

fn not_found(what: &str) -> AppError {
    DatabaseError::NotFound(what.to_string()).into()
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut tables = self.lock()?;
        tables.check_unique(&new_user.username, &new_user.email, None)?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<User, AppError> {
        self.lock()?.users.get(&id).cloned().ok_or_else(|| not_found("user"))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, AppError> {
        self.lock()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| not_found("user"))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, AppError> {
        self.lock()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| not_found("user"))
    }

    async fn update_user_by_id(&self, id: Uuid, changes: UserChanges) -> Result<User, AppError> {
        let mut tables = self.lock()?;
        let current = tables.users.get(&id).cloned().ok_or_else(|| not_found("user"))?;

        let username = changes.username.unwrap_or(current.username);
        let email = changes.email.unwrap_or(current.email);
        tables.check_unique(&username, &email, Some(id))?;

        let updated = User {
            username,
            email,
            password_hash: changes.password_hash.unwrap_or(current.password_hash),
            updated_at: Utc::now(),
            ..current
        };
        tables.users.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_user_by_id(&self, id: Uuid) -> Result<User, AppError> {
        let mut tables = self.lock()?;
        let user = tables.users.remove(&id).ok_or_else(|| not_found("user"))?;
        // ON DELETE CASCADE
        tables.refresh_tokens.remove(&id);
        Ok(user)
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryStore {
    async fn create_token_and_return_user(&self, input: RefreshTokenInput) -> Result<User, AppError> {
        let mut tables = self.lock()?;
        let user = tables
            .users
            .get(&input.user_id)
            .cloned()
            .ok_or_else(|| not_found("user"))?;
        if tables.refresh_tokens.contains_key(&input.user_id) {
            return Err(DatabaseError::UniqueConstraintViolation(
                REFRESH_TOKEN_USER_CONSTRAINT.to_string(),
            )
            .into());
        }

        let now = Utc::now();
        tables.refresh_tokens.insert(
            input.user_id,
            RefreshToken {
                id: Uuid::new_v4(),
                token: input.token,
                expiry_date: input.expiry_date,
                user_id: input.user_id,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(user)
    }

    async fn replace_token_and_return_user(&self, input: RefreshTokenInput) -> Result<User, AppError> {
        let mut tables = self.lock()?;
        let user = tables
            .users
            .get(&input.user_id)
            .cloned()
            .ok_or_else(|| not_found("user"))?;

        let now = Utc::now();
        tables.refresh_tokens.insert(
            input.user_id,
            RefreshToken {
                id: Uuid::new_v4(),
                token: input.token,
                expiry_date: input.expiry_date,
                user_id: input.user_id,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(user)
    }

    async fn get_token_by_user_id(&self, user_id: Uuid) -> Result<RefreshToken, AppError> {
        self.lock()?
            .refresh_tokens
            .get(&user_id)
            .cloned()
            .ok_or_else(|| not_found("refresh token"))
    }

    async fn update_token_by_user_id(&self, input: RefreshTokenInput) -> Result<RefreshToken, AppError> {
        let mut tables = self.lock()?;
        let row = tables
            .refresh_tokens
            .get_mut(&input.user_id)
            .ok_or_else(|| not_found("refresh token"))?;

        row.token = input.token;
        row.expiry_date = input.expiry_date;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete_token_by_user_id(&self, user_id: Uuid) -> Result<(), AppError> {
        self.lock()?.refresh_tokens.remove(&user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    fn token_for(user_id: Uuid, token: &str) -> RefreshTokenInput {
        RefreshTokenInput {
            user_id,
            token: token.to_string(),
            expiry_date: Utc::now() + Duration::days(30),
        }
    }

    fn constraint_of(err: AppError) -> String {
        match err {
            AppError::Database(DatabaseError::UniqueConstraintViolation(c)) => c,
            other => panic!("Expected unique violation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let store = InMemoryStore::new();
        let user = store.create_user(new_user("laurin", "laurin@test.de")).await.unwrap();

        assert_eq!(store.get_user_by_id(user.id).await.unwrap(), user);
        assert_eq!(store.get_user_by_email("laurin@test.de").await.unwrap(), user);
        assert_eq!(store.get_user_by_username("laurin").await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let store = InMemoryStore::new();
        store.create_user(new_user("laurin", "laurin@test.de")).await.unwrap();

        let err = store.create_user(new_user("laurin", "other@test.de")).await.unwrap_err();
        assert_eq!(constraint_of(err), USERNAME_CONSTRAINT);

        let err = store.create_user(new_user("other", "laurin@test.de")).await.unwrap_err();
        assert_eq!(constraint_of(err), EMAIL_CONSTRAINT);

        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.get_user_by_id(Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, AppError::Database(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_one_refresh_token_per_user() {
        let store = InMemoryStore::new();
        let user = store.create_user(new_user("laurin", "laurin@test.de")).await.unwrap();

        let owner = store.create_token_and_return_user(token_for(user.id, "first")).await.unwrap();
        assert_eq!(owner.id, user.id);

        let err = store
            .create_token_and_return_user(token_for(user.id, "second"))
            .await
            .unwrap_err();
        assert_eq!(constraint_of(err), REFRESH_TOKEN_USER_CONSTRAINT);
        assert_eq!(store.get_token_by_user_id(user.id).await.unwrap().token, "first");
    }

    #[tokio::test]
    async fn test_replace_token_with_and_without_row() {
        let store = InMemoryStore::new();
        let user = store.create_user(new_user("laurin", "laurin@test.de")).await.unwrap();

        let owner = store.replace_token_and_return_user(token_for(user.id, "first")).await.unwrap();
        assert_eq!(owner.id, user.id);
        let first = store.get_token_by_user_id(user.id).await.unwrap();

        store.replace_token_and_return_user(token_for(user.id, "second")).await.unwrap();
        let second = store.get_token_by_user_id(user.id).await.unwrap();

        assert_ne!(second.id, first.id);
        assert_eq!(second.token, "second");
        assert_eq!(store.refresh_token_count(), 1);

        let result = store.replace_token_and_return_user(token_for(Uuid::new_v4(), "x")).await;
        assert!(result.is_err());
        assert_eq!(store.refresh_token_count(), 1);
    }

    #[tokio::test]
    async fn test_update_token_keeps_row() {
        let store = InMemoryStore::new();
        let user = store.create_user(new_user("laurin", "laurin@test.de")).await.unwrap();
        store.create_token_and_return_user(token_for(user.id, "first")).await.unwrap();
        let before = store.get_token_by_user_id(user.id).await.unwrap();

        let after = store.update_token_by_user_id(token_for(user.id, "rotated")).await.unwrap();

        assert_eq!(after.id, before.id);
        assert_eq!(after.token, "rotated");
        assert_eq!(store.refresh_token_count(), 1);
    }

    #[tokio::test]
    async fn test_update_token_without_row_fails() {
        let store = InMemoryStore::new();
        let err = store
            .update_token_by_user_id(token_for(Uuid::new_v4(), "x"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Database(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_token_requires_existing_user() {
        let store = InMemoryStore::new();
        let result = store.create_token_and_return_user(token_for(Uuid::new_v4(), "x")).await;

        assert!(result.is_err());
        assert_eq!(store.refresh_token_count(), 0);
    }

    #[tokio::test]
    async fn test_update_user_checks_uniqueness() {
        let store = InMemoryStore::new();
        let laurin = store.create_user(new_user("laurin", "laurin@test.de")).await.unwrap();
        store.create_user(new_user("paulo", "paulo@test.de")).await.unwrap();

        let changes = UserChanges {
            username: Some("paulo".to_string()),
            ..UserChanges::default()
        };
        let err = store.update_user_by_id(laurin.id, changes).await.unwrap_err();
        assert_eq!(constraint_of(err), USERNAME_CONSTRAINT);

        let changes = UserChanges {
            email: Some("laurin@new.de".to_string()),
            ..UserChanges::default()
        };
        let updated = store.update_user_by_id(laurin.id, changes).await.unwrap();
        assert_eq!(updated.username, "laurin");
        assert_eq!(updated.email, "laurin@new.de");
    }

    #[tokio::test]
    async fn test_delete_user_cascades_token() {
        let store = InMemoryStore::new();
        let user = store.create_user(new_user("laurin", "laurin@test.de")).await.unwrap();
        store.create_token_and_return_user(token_for(user.id, "t")).await.unwrap();

        let deleted = store.delete_user_by_id(user.id).await.unwrap();

        assert_eq!(deleted.id, user.id);
        assert_eq!(store.user_count(), 0);
        assert_eq!(store.refresh_token_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_token_is_ok() {
        let store = InMemoryStore::new();
        assert!(store.delete_token_by_user_id(Uuid::new_v4()).await.is_ok());
    }
}
