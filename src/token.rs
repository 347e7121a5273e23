use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, Validation};
use uuid::Uuid;

use crate::errors::{AppError, AuthError};

/// Claims embedded in the bearer credential by the issuance service.
///
/// Only `{sub, exp, iat}` are part of the contract. Role membership is never
/// read from the token: it can change after issuance, so it is always
/// re-resolved through the role resolver.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// The verified identity a request is acting as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject {
    pub id: Uuid,
    /// Issuance time, kept for audit logging.
    pub issued_at: DateTime<Utc>,
}

/// Validates bearer credentials against the shared signing secret.
///
/// Pure and stateless: safe to call concurrently from any number of
/// request-handling tasks.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    secret: Arc<Vec<u8>>,
}

impl TokenVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret =
            std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        Ok(Self::new(secret.into_bytes()))
    }

    pub fn verify(&self, token: Option<&str>) -> Result<Subject, AuthError> {
        let token = token.filter(|value| !value.is_empty()).ok_or(AuthError::Missing)?;

        let mut validation = Validation::default();
        validation.validate_exp = true;

        let data =
            jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
                .map_err(|err| match err.kind() {
                    ErrorKind::ExpiredSignature => AuthError::Expired,
                    _ => AuthError::Invalid,
                })?;

        let issued_at = Utc
            .timestamp_opt(data.claims.iat as i64, 0)
            .single()
            .unwrap_or_else(Utc::now);

        Ok(Subject {
            id: data.claims.sub,
            issued_at,
        })
    }
}
