use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::db::models::User;

/// Payload of the short-lived token sent with each request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub id: String,
    pub username: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Payload of the long-lived token kept in the cookie and on the user row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub id: String,
    /// Makes every issued refresh token distinct, even within one second.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Signs and verifies the two session tokens (HS256, separate secrets).
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;

        Self {
            access_encoding: EncodingKey::from_secret(config.access_token_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            access_ttl: Duration::minutes(config.access_token_minutes as i64),
            refresh_ttl: Duration::hours(config.refresh_token_hours as i64),
            validation,
        }
    }

    pub fn issue_access(&self, user: &User) -> jsonwebtoken::errors::Result<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.access_encoding)
    }

    pub fn issue_refresh(&self, user_id: &str) -> jsonwebtoken::errors::Result<String> {
        let now = Utc::now();
        let claims = RefreshClaims {
            id: user_id.to_string(),
            jti: uuid::Uuid::now_v7().to_string(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.refresh_encoding)
    }

    pub fn issue_pair(&self, user: &User) -> jsonwebtoken::errors::Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue_access(user)?,
            refresh: self.issue_refresh(&user.id)?,
        })
    }

    /// Checks signature and expiry; the payload is only trustworthy after this.
    pub fn verify_access(&self, token: &str) -> jsonwebtoken::errors::Result<AccessClaims> {
        decode::<AccessClaims>(token, &self.access_decoding, &self.validation).map(|d| d.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> jsonwebtoken::errors::Result<RefreshClaims> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &self.validation).map(|d| d.claims)
    }
}
