/// Authentication Routes
///
/// Handles user registration, login and access-token refresh. Bodies use
/// camelCase field names.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthService, AuthSession, LoginInput, RegisterInput};
use crate::error::{AppError, ErrorContext};
use crate::store::User;

/// User registration request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm: String,
}

/// User login request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub username_or_email: String,
    #[serde(default)]
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub access_token: String,
}

/// Public view of a user; never includes the password hash
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            email: user.email,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        }
    }
}

/// Access token plus the user it belongs to
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserResponse,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            access_token: session.access_token,
            user: session.user.into(),
        }
    }
}

/// POST /api/register
///
/// # Errors
/// - 400: Missing inputs, or password and confirmation differ
/// - 409: Username or email already registered (constraint name in message)
/// - 500: Internal server error
pub async fn register(
    form: web::Json<RegisterRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");
    let form = form.into_inner();

    let session = auth
        .register(RegisterInput {
            username: form.username,
            email: form.email,
            password: form.password,
            confirm: form.confirm,
        })
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %session.user.id,
        "Registration request completed"
    );

    Ok(HttpResponse::Created().json(AuthResponse::from(session)))
}

/// POST /api/login
///
/// Accepts a username or an email (anything containing `@`).
/// Any previous session of the user is dropped.
///
/// # Errors
/// - 400: Missing inputs
/// - 401: Wrong password
/// - 500: Unknown user or internal server error
pub async fn login(
    form: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");
    let form = form.into_inner();

    let session = auth
        .login(LoginInput {
            username_or_email: form.username_or_email,
            password: form.password,
        })
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %session.user.id,
        "Login request completed"
    );

    Ok(HttpResponse::Ok().json(AuthResponse::from(session)))
}

/// POST /api/refresh
///
/// Returns the same access token while it is valid; once it has expired a
/// new one is minted as long as the stored refresh token is still valid.
///
/// # Errors
/// - 401: Refresh token expired (log in again)
/// - 500: Token missing or unreadable, or internal server error
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let session = auth.refresh(&form.access_token).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %session.user.id,
        "Refresh request completed"
    );

    Ok(HttpResponse::Ok().json(AuthResponse::from(session)))
}
