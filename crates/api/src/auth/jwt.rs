//! Bearer tokens.
//!
//! The sign-in flow that links a pilot's ledger account issues an HS256 JWT
//! whose subject is the pilot's `users.id`. This server verifies signature,
//! expiry and issuer; it never mints tokens on a request path.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use minebud_core::types::DbId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default token lifetime for [`generate_access_token`].
const DEFAULT_TOKEN_TTL_MINS: i64 = 60;

/// Issuer expected unless `JWT_ISSUER` says otherwise.
const DEFAULT_ISSUER: &str = "minebud";

/// Claims carried by a pilot's access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// `users.id` of the pilot.
    pub sub: DbId,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Token id, unique per issue.
    pub jti: String,
}

/// Token signing settings.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub access_token_expiry_mins: i64,
}

impl JwtConfig {
    /// | Env Var                  | Default    |
    /// |--------------------------|------------|
    /// | `JWT_SECRET`             | (required) |
    /// | `JWT_ISSUER`             | `minebud`  |
    /// | `JWT_ACCESS_EXPIRY_MINS` | `60`       |
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .expect("JWT_SECRET must be set to a non-empty value");
        let issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.into());
        let access_token_expiry_mins = match std::env::var("JWT_ACCESS_EXPIRY_MINS") {
            Ok(raw) => raw
                .parse()
                .expect("JWT_ACCESS_EXPIRY_MINS must be a whole number of minutes"),
            Err(_) => DEFAULT_TOKEN_TTL_MINS,
        };

        Self {
            secret,
            issuer,
            access_token_expiry_mins,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation
    }
}

/// Issue a token for `user_id`. Used by tooling and tests.
pub fn generate_access_token(
    user_id: DbId,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let issued_at = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        iss: config.issuer.clone(),
        iat: issued_at,
        exp: issued_at + config.access_token_expiry_mins * 60,
        jti: Uuid::new_v4().to_string(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Verify a bearer token and return its claims.
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &config.validation(),
    )
    .map(|data| data.claims)
}
