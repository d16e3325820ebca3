use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use boxoffice_types::api::Claims;

/// Lifetime of an issued bearer token.
pub const TOKEN_TTL_HOURS: i64 = 24;

/// Issues and verifies HS256 bearer tokens carrying a username claim.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, Duration::hours(TOKEN_TTL_HOURS))
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, username: &str) -> jsonwebtoken::errors::Result<String> {
        let claims = Claims {
            username: username.to_string(),
            exp: (Utc::now() + self.ttl).timestamp() as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Returns the username the token was issued for.
    ///
    /// Fails on a bad signature, a non-HS256 header, a malformed token,
    /// a missing or non-string `username` claim, or an `exp` in the past.
    pub fn verify(&self, token: &str) -> jsonwebtoken::errors::Result<String> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims.username)
    }
}
