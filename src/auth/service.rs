/// Authentication Service
///
/// Orchestrates registration, login, access-token refresh and bearer-token
/// authentication on top of injected storage and token collaborators. The
/// service holds no mutable state of its own; every call works from what the
/// stores hold.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::claims::TokenClaims;
use crate::auth::jwt::{ParsedToken, TokenCodec};
use crate::auth::password::{hash_password, verify_password};
use crate::configuration::{JwtSettings, PasswordSettings};
use crate::error::{AppError, AuthError, TokenError, ValidationError};
use crate::store::{NewUser, RefreshTokenInput, RefreshTokenStore, User, UserChanges, UserStore};

const CLAIM_PARSE_FAILURE: &str = "could not parse claim";
const PASSWORD_MISMATCH: &str = "password does not match the stored hash";

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// Result of a successful register / login / refresh
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub user: User,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    codec: Arc<dyn TokenCodec>,
    jwt: JwtSettings,
    password_cost: u32,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        codec: Arc<dyn TokenCodec>,
        jwt: JwtSettings,
        password: PasswordSettings,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            codec,
            jwt,
            password_cost: password.cost,
        }
    }

    /// Create a user, persist its refresh token and hand out an access token.
    ///
    /// # Errors
    /// - `MissingInputs` / `PasswordMismatch` before any store access
    /// - `UniqueConstraintViolation` when username or email is taken
    pub async fn register(&self, input: RegisterInput) -> Result<AuthSession, AppError> {
        if input.username.is_empty()
            || input.email.is_empty()
            || input.password.is_empty()
            || input.confirm.is_empty()
        {
            return Err(ValidationError::MissingInputs.into());
        }
        if input.password != input.confirm {
            return Err(ValidationError::PasswordMismatch.into());
        }

        let password_hash = hash_password(&input.password, self.password_cost)?;
        let user = self
            .users
            .create_user(NewUser {
                username: input.username,
                email: input.email,
                password_hash,
            })
            .await?;

        let user = self.issue_refresh_token(&user).await?;
        let access_token = self.mint_access_token(&user)?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(AuthSession { access_token, user })
    }

    /// Check credentials and start a new session, dropping any previous one.
    ///
    /// An identifier containing `@` is looked up as an email, anything else
    /// as a username.
    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, AppError> {
        if input.username_or_email.is_empty() || input.password.is_empty() {
            return Err(ValidationError::MissingInputs.into());
        }

        let user = if input.username_or_email.contains('@') {
            self.users.get_user_by_email(&input.username_or_email).await?
        } else {
            self.users.get_user_by_username(&input.username_or_email).await?
        };

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials(PASSWORD_MISMATCH.to_string()).into());
        }

        let input = self.mint_refresh_token(&user)?;
        let user = self.refresh_tokens.replace_token_and_return_user(input).await?;
        let access_token = self.mint_access_token(&user)?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(AuthSession { access_token, user })
    }

    /// Decide what to do with a presented access token:
    /// - still valid: hand it back untouched with the current user row;
    /// - otherwise: if the stored refresh token is valid, mint a new access
    ///   token and rotate the refresh token; if it expired, reject with 401.
    pub async fn refresh(&self, access_token: &str) -> Result<AuthSession, AppError> {
        let parsed = self.parse_claims(access_token, &self.jwt.access_token_secret)?;
        let user = self.users.get_user_by_id(parsed.claims.user_id).await?;

        if parsed.is_valid() {
            tracing::debug!(user_id = %user.id, "Access token still valid");
            return Ok(AuthSession {
                access_token: access_token.to_string(),
                user,
            });
        }

        self.check_refresh_token(&user).await?;

        let access_token = self.mint_access_token(&user)?;
        self.rotate_refresh_token(&user).await?;

        tracing::info!(user_id = %user.id, "Access token refreshed");
        Ok(AuthSession { access_token, user })
    }

    /// Resolve the user behind a bearer token. Any token problem is a 401.
    pub async fn authenticate(&self, access_token: &str) -> Result<User, AppError> {
        if access_token.is_empty() {
            return Err(AuthError::MissingToken.into());
        }

        let parsed = self
            .codec
            .verify(access_token, &self.jwt.access_token_secret)
            .map_err(|e| AuthError::TokenInvalid(e.to_string()))?;
        let user = self.users.get_user_by_id(parsed.claims.user_id).await?;

        match parsed.rejection {
            None => Ok(user),
            Some(TokenError::Expired(msg)) => Err(AuthError::TokenExpired(msg).into()),
            Some(other) => Err(AuthError::TokenInvalid(other.to_string()).into()),
        }
    }

    /// End the user's session by dropping its refresh token.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        self.refresh_tokens.delete_token_by_user_id(user_id).await?;
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.users.get_user_by_id(user_id).await
    }

    /// Change username and/or email. Tokens already issued keep the old values
    /// in their claims until they are replaced.
    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> Result<User, AppError> {
        let blank = |field: &Option<String>| field.as_deref().map_or(false, str::is_empty);
        if (update.username.is_none() && update.email.is_none())
            || blank(&update.username)
            || blank(&update.email)
        {
            return Err(ValidationError::MissingInputs.into());
        }

        let user = self
            .users
            .update_user_by_id(
                user_id,
                UserChanges {
                    username: update.username,
                    email: update.email,
                    password_hash: None,
                },
            )
            .await?;

        tracing::info!(user_id = %user.id, "User profile updated");
        Ok(user)
    }

    /// Delete the user and its refresh token.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<User, AppError> {
        self.refresh_tokens.delete_token_by_user_id(user_id).await?;
        let user = self.users.delete_user_by_id(user_id).await?;

        tracing::info!(user_id = %user.id, "User account deleted");
        Ok(user)
    }

    fn parse_claims(&self, token: &str, secret: &str) -> Result<ParsedToken, AppError> {
        self.codec.verify(token, secret).map_err(|e| {
            tracing::warn!(error = %e, "Token claims unreadable");
            AppError::Internal(CLAIM_PARSE_FAILURE.to_string())
        })
    }

    /// Accept the user's stored refresh token only if it is signed and unexpired.
    async fn check_refresh_token(&self, user: &User) -> Result<(), AppError> {
        let stored = self.refresh_tokens.get_token_by_user_id(user.id).await?;
        let parsed = self.parse_claims(&stored.token, &self.jwt.refresh_token_secret)?;

        match parsed.rejection {
            None => Ok(()),
            Some(TokenError::Expired(msg)) => {
                tracing::info!(user_id = %user.id, "Refresh token expired");
                Err(AuthError::TokenExpired(msg).into())
            }
            Some(other) => Err(AppError::Internal(other.to_string())),
        }
    }

    fn mint_access_token(&self, user: &User) -> Result<String, AppError> {
        let claims = TokenClaims::for_user(user, self.jwt.access_token_expiry);
        Ok(self.codec.sign(&claims, &self.jwt.access_token_secret)?)
    }

    fn mint_refresh_token(&self, user: &User) -> Result<RefreshTokenInput, AppError> {
        let claims = TokenClaims::for_user(user, self.jwt.refresh_token_expiry);
        let token = self.codec.sign(&claims, &self.jwt.refresh_token_secret)?;
        Ok(RefreshTokenInput {
            user_id: user.id,
            token,
            expiry_date: Utc::now() + Duration::seconds(self.jwt.refresh_token_expiry),
        })
    }

    async fn issue_refresh_token(&self, user: &User) -> Result<User, AppError> {
        let input = self.mint_refresh_token(user)?;
        self.refresh_tokens.create_token_and_return_user(input).await
    }

    async fn rotate_refresh_token(&self, user: &User) -> Result<(), AppError> {
        let input = self.mint_refresh_token(user)?;
        self.refresh_tokens.update_token_by_user_id(input).await?;
        Ok(())
    }
}
