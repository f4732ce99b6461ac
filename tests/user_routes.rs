//! Bearer-protected `/api/users` and logout routes

use std::net::TcpListener;
use std::sync::Arc;

use serde_json::{json, Value};
use tennis_auth::auth::{AuthService, JwtCodec};
use tennis_auth::configuration::{JwtSettings, PasswordSettings};
use tennis_auth::startup::run;
use tennis_auth::store::InMemoryStore;

const TEST_COST: u32 = 4;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let store = Arc::new(InMemoryStore::new());
    let auth = AuthService::new(
        store.clone(),
        store,
        Arc::new(JwtCodec::new()),
        JwtSettings {
            access_token_secret: "integration-access-secret".to_string(),
            refresh_token_secret: "integration-refresh-secret".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 3600,
        },
        PasswordSettings { cost: TEST_COST },
    );
    let server = run(listener, auth).expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    format!("http://127.0.0.1:{}", port)
}

async fn register(client: &reqwest::Client, addr: &str, username: &str) -> Value {
    let response = client
        .post(&format!("{}/api/register", addr))
        .json(&json!({
            "username": username,
            "email": format!("{}@test.de", username),
            "password": "Test",
            "confirm": "Test"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(201, response.status().as_u16());
    response.json().await.expect("Failed to parse response")
}

#[tokio::test]
async fn protected_route_requires_bearer_token() {
    let addr = spawn_app();
    let client = reqwest::Client::new();

    let test_cases = vec![
        (None, "missing header"),
        (Some("Bearer "), "empty token"),
        (Some("Basic dXNlcjpwYXNz"), "wrong scheme"),
        (Some("Bearer not.a.token"), "garbage token"),
    ];

    for (header, reason) in test_cases {
        let mut request = client.get(&format!("{}/api/users/me", addr));
        if let Some(value) = header {
            request = request.header("Authorization", value);
        }
        let response = request.send().await.expect("Failed to execute request");

        assert_eq!(401, response.status().as_u16(), "Expected 401 for {}", reason);
    }
}

#[tokio::test]
async fn current_user_is_resolved_from_token() {
    let addr = spawn_app();
    let client = reqwest::Client::new();
    let registered = register(&client, &addr, "laurin").await;
    let token = registered["accessToken"].as_str().unwrap();

    let response = client
        .get(&format!("{}/api/users/me", addr))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], registered["user"]["id"]);
    assert_eq!(body["username"], "laurin");
    assert!(body.get("passwordHash").is_none());
}

#[tokio::test]
async fn user_can_be_fetched_by_id() {
    let addr = spawn_app();
    let client = reqwest::Client::new();
    let laurin = register(&client, &addr, "laurin").await;
    let paulo = register(&client, &addr, "paulo").await;

    let response = client
        .get(&format!("{}/api/users/{}", addr, paulo["user"]["id"].as_str().unwrap()))
        .bearer_auth(laurin["accessToken"].as_str().unwrap())
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "paulo@test.de");
}

#[tokio::test]
async fn profile_update_and_account_deletion() {
    let addr = spawn_app();
    let client = reqwest::Client::new();
    register(&client, &addr, "paulo").await;
    let laurin = register(&client, &addr, "laurin").await;
    let token = laurin["accessToken"].as_str().unwrap();

    let conflict = client
        .put(&format!("{}/api/users/me", addr))
        .bearer_auth(token)
        .json(&json!({ "email": "paulo@test.de" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(409, conflict.status().as_u16());

    let empty = client
        .put(&format!("{}/api/users/me", addr))
        .bearer_auth(token)
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(400, empty.status().as_u16());

    let updated = client
        .put(&format!("{}/api/users/me", addr))
        .bearer_auth(token)
        .json(&json!({ "username": "lauri" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(200, updated.status().as_u16());
    let body: Value = updated.json().await.unwrap();
    assert_eq!(body["username"], "lauri");

    let deleted = client
        .delete(&format!("{}/api/users/me", addr))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(200, deleted.status().as_u16());

    // token still verifies but names a user that is gone
    let after = client
        .get(&format!("{}/api/users/me", addr))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(401, after.status().as_u16());
}
