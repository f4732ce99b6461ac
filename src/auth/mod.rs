/// Authentication module
///
/// Token codec, password hashing, and the service that ties them to the
/// user and refresh-token stores.

mod claims;
mod jwt;
mod password;
mod service;

pub use claims::TokenClaims;
pub use jwt::{JwtCodec, ParsedToken, TokenCodec};
pub use password::hash_password;
pub use password::verify_password;
pub use service::{AuthService, AuthSession, LoginInput, ProfileUpdate, RegisterInput};
