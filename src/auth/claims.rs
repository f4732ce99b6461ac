/// JWT Claims structure
///
/// The signed payload shared by access and refresh tokens: the identity of
/// the user plus an expiry instant. Only the signing secret tells the two
/// token kinds apart.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::User;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Subject user id
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    /// Expiration time (Unix timestamp, seconds)
    pub exp: i64,
    /// Token id, unique per minted token
    pub jti: Uuid,
}

impl TokenClaims {
    /// Build claims for `user` that expire `expiry_seconds` from now.
    pub fn for_user(user: &User, expiry_seconds: i64) -> Self {
        let expires_at = Utc::now() + Duration::seconds(expiry_seconds);
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        }
    }
}
