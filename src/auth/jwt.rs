/// JWT Token Codec
///
/// Signs and verifies compact HS256 tokens (`header.claims.signature`).
/// Verification separates "no claims could be read" from "claims were read
/// but the token is not acceptable", so callers can still identify the user
/// behind an expired token.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::TokenClaims;
use crate::error::TokenError;

/// Claims read from a token together with the verdict on the token.
#[derive(Debug, Clone)]
pub struct ParsedToken {
    pub claims: TokenClaims,
    /// `None` when signature and expiry both check out.
    pub rejection: Option<TokenError>,
}

impl ParsedToken {
    pub fn is_valid(&self) -> bool {
        self.rejection.is_none()
    }
}

pub trait TokenCodec: Send + Sync {
    /// Produce a signed token for `claims`.
    fn sign(&self, claims: &TokenClaims, secret: &str) -> Result<String, TokenError>;

    /// Read and check a token.
    ///
    /// # Errors
    /// Returns `TokenError::Malformed` only when no claims can be extracted.
    /// Signature and expiry failures are reported in `ParsedToken::rejection`.
    fn verify(&self, token: &str, secret: &str) -> Result<ParsedToken, TokenError>;
}

/// HMAC-SHA256 codec backed by `jsonwebtoken`
#[derive(Clone)]
pub struct JwtCodec {
    validation: Validation,
    unverified: Validation,
}

impl JwtCodec {
    pub fn new() -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        let mut unverified = Validation::new(Algorithm::HS256);
        unverified.insecure_disable_signature_validation();
        unverified.validate_exp = false;
        unverified.required_spec_claims.clear();

        Self {
            validation,
            unverified,
        }
    }

    fn read_claims(&self, token: &str) -> Result<TokenClaims, TokenError> {
        decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &self.unverified)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Malformed(e.to_string()))
    }
}

impl Default for JwtCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCodec for JwtCodec {
    fn sign(&self, claims: &TokenClaims, secret: &str) -> Result<String, TokenError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    fn verify(&self, token: &str, secret: &str) -> Result<ParsedToken, TokenError> {
        let claims = self.read_claims(token)?;

        let rejection = match decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &self.validation,
        ) {
            Ok(_) => None,
            Err(e) => {
                let rejection = match e.kind() {
                    ErrorKind::InvalidSignature => TokenError::InvalidSignature(e.to_string()),
                    ErrorKind::ExpiredSignature => TokenError::Expired(e.to_string()),
                    _ => TokenError::Malformed(e.to_string()),
                };
                tracing::debug!(user_id = %claims.user_id, reason = %rejection, "JWT rejected");
                Some(rejection)
            }
        };

        Ok(ParsedToken { claims, rejection })
    }
}
