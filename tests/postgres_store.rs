//! Postgres store tests. Run with `cargo test -- --ignored` against the
//! database named in configuration.yaml.

use chrono::{Duration, Utc};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use tennis_auth::configuration::{get_configuration, DatabaseSettings};
use tennis_auth::error::{AppError, DatabaseError};
use tennis_auth::store::{
    NewUser, PgStore, RefreshTokenInput, RefreshTokenStore, UserChanges, UserStore,
    EMAIL_CONSTRAINT, REFRESH_TOKEN_USER_CONSTRAINT, USERNAME_CONSTRAINT,
};
use uuid::Uuid;

async fn spawn_store() -> PgStore {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = Uuid::new_v4().to_string();
    PgStore::new(configure_database(&configuration.database).await)
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

fn new_user(username: &str, email: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: email.to_string(),
        password_hash: "$2b$04$placeholderhash".to_string(),
    }
}

fn token_input(user_id: Uuid, token: &str) -> RefreshTokenInput {
    RefreshTokenInput {
        user_id,
        token: token.to_string(),
        expiry_date: Utc::now() + Duration::days(30),
    }
}

fn violated_constraint(err: AppError) -> String {
    match err {
        AppError::Database(DatabaseError::UniqueConstraintViolation(constraint)) => constraint,
        other => panic!("expected a unique violation, got {:?}", other),
    }
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn duplicate_users_report_constraint_name() {
    let store = spawn_store().await;
    store.create_user(new_user("laurin", "laurin@test.de")).await.unwrap();

    let err = store
        .create_user(new_user("laurin", "other@test.de"))
        .await
        .unwrap_err();
    assert_eq!(violated_constraint(err), USERNAME_CONSTRAINT);

    let err = store
        .create_user(new_user("other", "laurin@test.de"))
        .await
        .unwrap_err();
    assert_eq!(violated_constraint(err), EMAIL_CONSTRAINT);
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn user_lookups_and_updates() {
    let store = spawn_store().await;
    let created = store.create_user(new_user("laurin", "laurin@test.de")).await.unwrap();

    assert_eq!(store.get_user_by_id(created.id).await.unwrap().id, created.id);
    assert_eq!(store.get_user_by_email("laurin@test.de").await.unwrap().id, created.id);
    assert_eq!(store.get_user_by_username("laurin").await.unwrap().id, created.id);

    let err = store.get_user_by_email("nobody@test.de").await.unwrap_err();
    assert!(matches!(err, AppError::Database(DatabaseError::NotFound(_))));

    let updated = store
        .update_user_by_id(
            created.id,
            UserChanges {
                username: Some("lauri".to_string()),
                email: None,
                password_hash: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.username, "lauri");
    assert_eq!(updated.email, "laurin@test.de");
    assert!(updated.updated_at >= created.updated_at);
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn refresh_token_row_lifecycle() {
    let store = spawn_store().await;
    let user = store.create_user(new_user("laurin", "laurin@test.de")).await.unwrap();

    let owner = store
        .create_token_and_return_user(token_input(user.id, "first"))
        .await
        .unwrap();
    assert_eq!(owner, user);

    let err = store
        .create_token_and_return_user(token_input(user.id, "second"))
        .await
        .unwrap_err();
    assert_eq!(violated_constraint(err), REFRESH_TOKEN_USER_CONSTRAINT);

    let before = store.get_token_by_user_id(user.id).await.unwrap();
    let after = store
        .update_token_by_user_id(token_input(user.id, "rotated"))
        .await
        .unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.token, "rotated");

    store.delete_token_by_user_id(user.id).await.unwrap();
    store.delete_token_by_user_id(user.id).await.unwrap();
    assert!(store.get_token_by_user_id(user.id).await.is_err());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn replacing_refresh_token_upserts_single_row() {
    let store = spawn_store().await;
    let user = store.create_user(new_user("laurin", "laurin@test.de")).await.unwrap();

    let owner = store
        .replace_token_and_return_user(token_input(user.id, "first"))
        .await
        .unwrap();
    assert_eq!(owner, user);
    let first = store.get_token_by_user_id(user.id).await.unwrap();

    let logins: Vec<_> = (0..4)
        .map(|i| {
            let store = store.clone();
            let input = token_input(user.id, &format!("login-{}", i));
            tokio::spawn(async move { store.replace_token_and_return_user(input).await })
        })
        .collect();
    for login in logins {
        login.await.unwrap().unwrap();
    }

    let current = store.get_token_by_user_id(user.id).await.unwrap();
    assert_ne!(current.id, first.id);
    assert!(current.token.starts_with("login-"));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM refresh_tokens")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn refresh_token_requires_existing_user() {
    let store = spawn_store().await;

    let result = store
        .create_token_and_return_user(token_input(Uuid::new_v4(), "orphan"))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn deleting_user_cascades_to_refresh_token() {
    let store = spawn_store().await;
    let user = store.create_user(new_user("laurin", "laurin@test.de")).await.unwrap();
    store
        .create_token_and_return_user(token_input(user.id, "token"))
        .await
        .unwrap();

    let deleted = store.delete_user_by_id(user.id).await.unwrap();
    assert_eq!(deleted.id, user.id);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM refresh_tokens")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
