/// User Routes
///
/// All handlers here sit behind `JwtMiddleware`, which puts the
/// authenticated `User` into the request extensions.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{AuthService, ProfileUpdate};
use crate::error::{AppError, ErrorContext};
use crate::routes::UserResponse;
use crate::store::User;

/// Profile update request; omitted fields are left unchanged
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// GET /api/users/me
pub async fn get_current_user(user: web::ReqData<User>) -> HttpResponse {
    HttpResponse::Ok().json(UserResponse::from(user.into_inner()))
}

/// GET /api/users/{id}
///
/// # Errors
/// - 500: No such user
pub async fn get_user_by_id(
    path: web::Path<Uuid>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user = auth.get_user(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// PUT /api/users/me
///
/// # Errors
/// - 400: Nothing to update, or an empty field
/// - 409: Username or email taken
pub async fn update_current_user(
    user: web::ReqData<User>,
    form: web::Json<UpdateUserRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("profile_update").with_user_id(user.id.to_string());
    let form = form.into_inner();

    let updated = auth
        .update_profile(
            user.id,
            ProfileUpdate {
                username: form.username,
                email: form.email,
            },
        )
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        "Profile update request completed"
    );

    Ok(HttpResponse::Ok().json(UserResponse::from(updated)))
}

/// DELETE /api/users/me
pub async fn delete_current_user(
    user: web::ReqData<User>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("account_deletion").with_user_id(user.id.to_string());

    let deleted = auth.delete_account(user.id).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        "Account deletion request completed"
    );

    Ok(HttpResponse::Ok().json(UserResponse::from(deleted)))
}

/// POST /api/logout
///
/// Drops the stored refresh token; the access token stays valid until it
/// expires but can no longer be refreshed.
pub async fn logout(
    user: web::ReqData<User>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    auth.logout(user.id).await?;
    Ok(HttpResponse::NoContent().finish())
}
