//! Credential verification and bearer token handling.

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenError, TokenIssuer};

use crate::db::Role;

/// The authenticated caller, derived from verified token claims and handed
/// to handlers as a typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl TryFrom<Claims> for Identity {
    type Error = TokenError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: claims.user_id()?,
            username: claims.username,
            role: claims.role,
        })
    }
}
