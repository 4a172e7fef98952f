use axum::http::HeaderMap;
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use types::ids::UserId;

use crate::error::AuthError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject user id. Older tokens carry it as `id`.
    #[serde(alias = "id")]
    pub sub: String,
    pub exp: usize,
}

/// Resolves a bearer credential to the user it was issued for.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<UserId, AuthError>;
}

/// HMAC-signed JWTs shared with the REST API.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 5;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                _ => tracing::debug!(error = %e, "rejected token"),
            }
            AuthError::InvalidToken
        })?;

        UserId::parse(&data.claims.sub).map_err(|_| AuthError::InvalidToken)
    }
}

/// Query parameters accepted on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeQuery {
    pub token: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// What a client presents when opening a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
    pub claimed_user_id: Option<UserId>,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            claimed_user_id: None,
        }
    }

    pub fn claiming(mut self, user_id: UserId) -> Self {
        self.claimed_user_id = Some(user_id);
        self
    }

    /// Query string first, then the `Authorization: Bearer` header.
    pub fn from_handshake(query: HandshakeQuery, headers: &HeaderMap) -> Self {
        let token = query
            .token
            .map(|raw| raw.trim().trim_start_matches("Bearer ").trim().to_string())
            .filter(|token| !token.is_empty())
            .or_else(|| {
                headers
                    .typed_get::<Authorization<Bearer>>()
                    .map(|auth| auth.token().to_string())
            });

        let claimed_user_id = query
            .user_id
            .filter(|id| !id.trim().is_empty())
            .map(|id| UserId::new(id.trim()));

        Self {
            token,
            claimed_user_id,
        }
    }

    /// The token, if one was actually supplied
    pub fn bearer(&self) -> Result<&str, AuthError> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::NoToken)
    }
}
