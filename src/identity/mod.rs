//! Session identity
//!
//! Resolves the user identifier used to namespace generated file names from
//! the session provider's JWT. Only HS256 session tokens are supported.
//!
//! # Example
//!
//! ```
//! use media_uploadr::identity::SessionIdentity;
//!
//! let identity = SessionIdentity::new_hs256("session-secret")
//!     .with_issuer("https://auth.example.com");
//! assert!(identity.user_id("not-a-token").is_err());
//! ```

use crate::config::IdentityConfig;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Missing session token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token has an empty subject")]
    EmptySubject,
}

/// Session token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: Option<usize>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
}

/// Decodes session tokens into user identifiers
pub struct SessionIdentity {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionIdentity {
    pub fn new_hs256(secret: &str) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;

        Self {
            decoding_key,
            validation,
        }
    }

    pub fn from_config(config: &IdentityConfig) -> Self {
        let mut identity = Self::new_hs256(&config.jwt_secret);
        if let Some(issuer) = &config.issuer {
            identity = identity.with_issuer(issuer);
        }
        if let Some(audience) = &config.audience {
            identity = identity.with_audience(audience);
        }
        identity
    }

    /// Require the `iss` claim
    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Require the `aud` claim
    #[must_use]
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }

    /// The `sub` claim of a valid session token
    pub fn user_id(&self, token: &str) -> Result<String, IdentityError> {
        let token = token.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token);
        if token.is_empty() {
            return Err(IdentityError::MissingToken);
        }

        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => IdentityError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    IdentityError::InvalidSignature
                }
                _ => IdentityError::InvalidToken(e.to_string()),
            },
        )?;

        let subject = token_data.claims.sub.trim().to_string();
        if subject.is_empty() {
            return Err(IdentityError::EmptySubject);
        }

        tracing::debug!(subject = %subject, "Resolved session identity");
        Ok(subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str, exp_offset: i64, iss: Option<&str>) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset) as usize;
        let claims = Claims {
            sub: sub.to_string(),
            exp,
            iat: None,
            iss: iss.map(str::to_string),
            aud: None,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_yields_subject() {
        let identity = SessionIdentity::new_hs256("secret");
        let t = token("secret", "agent-42", 3600, None);
        assert_eq!(identity.user_id(&t).unwrap(), "agent-42");
    }

    #[test]
    fn test_bearer_prefix_is_accepted() {
        let identity = SessionIdentity::new_hs256("secret");
        let t = format!("Bearer {}", token("secret", "u1", 3600, None));
        assert_eq!(identity.user_id(&t).unwrap(), "u1");
    }

    #[test]
    fn test_missing_token() {
        let identity = SessionIdentity::new_hs256("secret");
        assert_eq!(identity.user_id("  "), Err(IdentityError::MissingToken));
    }

    #[test]
    fn test_wrong_secret() {
        let identity = SessionIdentity::new_hs256("secret");
        let t = token("other", "u1", 3600, None);
        assert_eq!(identity.user_id(&t), Err(IdentityError::InvalidSignature));
    }

    #[test]
    fn test_expired_token() {
        let identity = SessionIdentity::new_hs256("secret");
        let t = token("secret", "u1", -3600, None);
        assert_eq!(identity.user_id(&t), Err(IdentityError::TokenExpired));
    }

    #[test]
    fn test_issuer_is_enforced() {
        let identity = SessionIdentity::new_hs256("secret").with_issuer("https://auth.example.com");
        let wrong = token("secret", "u1", 3600, Some("https://evil.example.com"));
        assert!(matches!(
            identity.user_id(&wrong),
            Err(IdentityError::InvalidToken(_))
        ));

        let right = token("secret", "u1", 3600, Some("https://auth.example.com"));
        assert_eq!(identity.user_id(&right).unwrap(), "u1");
    }
}
