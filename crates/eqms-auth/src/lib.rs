//! Session token handling for EQMS
//!
//! Sessions are issued by the external auth provider as HS256 JWTs. This crate
//! validates them and can mint development tokens signed with the same secret.

pub mod jwt;

pub use jwt::{JwtClaims, JwtError, JwtValidator, SESSION_TOKEN_TYPE};

// Re-export useful types
pub use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Validation};
