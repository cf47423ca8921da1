//! Stateless bearer tokens.
//!
//! Tokens are HS256 JWTs carrying the user id, username and role. Nothing is
//! stored server-side: validity is the signature plus the expiry, so there is
//! no revocation and no refresh.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::{Role, User};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a decimal string per the JWT `sub` convention
    pub sub: String,
    pub username: String,
    pub role: Role,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Invalid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Bad signature, malformed token, unexpected algorithm or claims
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
}

/// Signs and verifies tokens with the server-held secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        // Only HS256 is accepted; "none" and asymmetric algs fail validation
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Mint a token for `user`, expiring one TTL from now
    pub fn issue(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        // jsonwebtoken treats exp == now as still valid; expiry here is inclusive
        if Utc::now().timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        data.claims.user_id()?;
        Ok(data.claims)
    }
}
