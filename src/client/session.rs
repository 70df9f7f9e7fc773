//! Bearer-token sessions
//!
//! The HTTP client asks a [`SessionProvider`] for a token before every request. A
//! provider that has no token, or hands out an expired one, makes the request fail
//! with `Unauthenticated` without touching the network.

use crate::config::{secret_string, ApiConfig, SecretString};
use crate::domain::{Result, SowtrackError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;

/// An access token with an optional expiry
#[derive(Clone, Debug)]
pub struct BearerToken {
    token: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: secret_string(token.into()),
            expires_at: None,
        }
    }

    pub fn from_secret(token: SecretString) -> Self {
        Self {
            token,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// `Authorization` header value
    ///
    /// # Errors
    ///
    /// `Unauthenticated` for a blank or expired token
    pub fn authorization(&self, now: DateTime<Utc>) -> Result<String> {
        let token = self.token.expose_secret();
        if token.as_ref().trim().is_empty() {
            return Err(SowtrackError::Unauthenticated(
                "bearer token is empty".to_string(),
            ));
        }
        if self.is_expired_at(now) {
            return Err(SowtrackError::Unauthenticated(
                "bearer token has expired".to_string(),
            ));
        }
        Ok(format!("Bearer {}", token.as_ref()))
    }
}

/// Source of the current session's bearer token
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The token to send, or `None` when nobody is signed in
    async fn bearer_token(&self) -> Result<Option<BearerToken>>;
}

/// A session with a fixed token (or none)
#[derive(Clone, Debug, Default)]
pub struct StaticSession {
    token: Option<BearerToken>,
}

impl StaticSession {
    pub fn new(token: BearerToken) -> Self {
        Self { token: Some(token) }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Uses `api.token` when configured
    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            token: config.token.clone().map(BearerToken::from_secret),
        }
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn bearer_token(&self) -> Result<Option<BearerToken>> {
        Ok(self.token.clone())
    }
}
