//! JWT (JSON Web Token) handling

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `token_type` value carried by browser/API sessions
pub const SESSION_TOKEN_TYPE: &str = "session";

/// JWT claims for an authenticated session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// User ID (UUID string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Role as known to the auth provider (admin, manager, agent, user)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_role: Option<String>,
    /// Email address of the signed-in user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Token type; only "session" tokens are accepted by the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl JwtClaims {
    pub fn new(subject: String, issuer: String, audience: String, validity: Duration) -> Self {
        let now = Utc::now();
        let exp = now + validity;

        Self {
            sub: subject,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: issuer,
            aud: audience,
            user_id: None,
            user_role: None,
            email: None,
            token_type: None,
        }
    }

    /// Session claims for a user, with `sub` and `user_id` both set to the user ID
    pub fn session(user_id: String, issuer: String, audience: String, validity: Duration) -> Self {
        Self::new(user_id.clone(), issuer, audience, validity)
            .with_user_id(user_id)
            .with_token_type(SESSION_TOKEN_TYPE.to_string())
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_user_role(mut self, role: String) -> Self {
        self.user_role = Some(role);
        self
    }

    pub fn with_email(mut self, email: String) -> Self {
        self.email = Some(email);
        self
    }

    pub fn with_token_type(mut self, token_type: String) -> Self {
        self.token_type = Some(token_type);
        self
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    pub fn is_session(&self) -> bool {
        self.token_type.as_deref() == Some(SESSION_TOKEN_TYPE)
    }

    /// Expiry as a UTC timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// JWT errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT encoding error: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,
}

/// JWT validator
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    /// Create a new JWT validator using HMAC-SHA256 (symmetric secret)
    ///
    /// Validates the signature and the expiration. Issuer and audience are
    /// only checked once configured with [`with_issuer`](Self::with_issuer)
    /// and [`with_audience`](Self::with_audience).
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.validate_nbf = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn with_audience(mut self, audience: String) -> Self {
        self.validation.set_audience(&[audience]);
        self
    }

    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, JwtError> {
        let token_data =
            decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidToken
                    | jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidToken,
                    _ => JwtError::EncodingError(e),
                }
            })?;

        if token_data.claims.is_expired() {
            return Err(JwtError::TokenExpired);
        }

        Ok(token_data.claims)
    }

    /// Encode JWT using HMAC-SHA256 (symmetric secret)
    pub fn encode(secret: &[u8], claims: &JwtClaims) -> Result<String, JwtError> {
        let header = Header::new(Algorithm::HS256);
        let encoding_key = EncodingKey::from_secret(secret);

        Ok(encode(&header, claims, &encoding_key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &[u8] = b"test_secret_key_1234567890";

    #[test]
    fn test_session_encode_decode() {
        let claims = JwtClaims::session(
            "0b9d2f7e-1111-4c4c-9a9a-000000000001".to_string(),
            "eqms".to_string(),
            "eqms-web".to_string(),
            Duration::hours(1),
        )
        .with_user_role("agent".to_string())
        .with_email("agent@example.com".to_string());

        let token = JwtValidator::encode(TEST_SECRET, &claims).unwrap();

        let validator = JwtValidator::new(TEST_SECRET)
            .with_issuer("eqms".to_string())
            .with_audience("eqms-web".to_string());

        let decoded = validator.validate(&token).unwrap();

        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.user_id, claims.user_id);
        assert_eq!(decoded.user_role.as_deref(), Some("agent"));
        assert_eq!(decoded.email.as_deref(), Some("agent@example.com"));
        assert!(decoded.is_session());
    }

    #[test]
    fn test_expired_token() {
        let claims = JwtClaims::new(
            "user-789".to_string(),
            "issuer".to_string(),
            "audience".to_string(),
            Duration::seconds(-120),
        );

        assert!(claims.is_expired());

        let token = JwtValidator::encode(TEST_SECRET, &claims).unwrap();
        let result = JwtValidator::new(TEST_SECRET).validate(&token);

        assert!(matches!(result, Err(JwtError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let claims = JwtClaims::session(
            "user-1".to_string(),
            "issuer".to_string(),
            "audience".to_string(),
            Duration::hours(1),
        );
        let token = JwtValidator::encode(TEST_SECRET, &claims).unwrap();

        let result = JwtValidator::new(b"another-secret").validate(&token);
        assert!(matches!(result, Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_issuer_mismatch_rejected() {
        let claims = JwtClaims::session(
            "user-1".to_string(),
            "someone-else".to_string(),
            "audience".to_string(),
            Duration::hours(1),
        );
        let token = JwtValidator::encode(TEST_SECRET, &claims).unwrap();

        let validator = JwtValidator::new(TEST_SECRET).with_issuer("eqms".to_string());
        assert!(validator.validate(&token).is_err());
    }

    #[test]
    fn test_optional_claims_skipped_when_none() {
        let claims = JwtClaims::new(
            "user-9".to_string(),
            "issuer".to_string(),
            "audience".to_string(),
            Duration::hours(1),
        );

        let json = serde_json::to_string(&claims).unwrap();

        assert!(!json.contains("user_role"));
        assert!(!json.contains("token_type"));
        assert!(!claims.is_session());
    }
}
