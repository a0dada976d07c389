//! Identity collaborator for smartmark.
//!
//! Wraps the hosted auth endpoints: session lookup with a transparent
//! one-shot token refresh (the stand-in for the original's request-time
//! cookie refresh), session handoff from the external OAuth flow, and
//! sign-out. Session state itself lives in a [`SessionFileStore`].

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::services::session_store::SessionFileStore;
use crate::types::errors::AuthError;
use crate::types::session::{AuthSession, AuthUser, SessionContext};

/// Trait defining the identity operations the rest of the system uses.
#[async_trait]
pub trait IdentityServiceTrait: Send + Sync {
    /// Returns the current session's context, or `None` when signed out.
    async fn current_session(&self) -> Result<Option<SessionContext>, AuthError>;
    /// Accepts a token pair from the external sign-in flow and persists it.
    async fn store_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<AuthUser, AuthError>;
    /// Terminates the session, server-side and locally.
    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Claims carried by the backend's JWT access token.
///
/// Decoded without signature verification — the backend verifies on every
/// request; the client only needs the subject and the expiry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
}

/// Decodes the claims segment of a JWT access token.
pub fn decode_access_claims(token: &str) -> Result<AccessClaims, AuthError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::InvalidToken("not a JWT".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// Identity service backed by the hosted auth endpoints.
#[derive(Debug, Clone)]
pub struct IdentityService {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    sessions: SessionFileStore,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    user: AuthUser,
}

impl IdentityService {
    pub fn new(config: &BackendConfig, sessions: SessionFileStore) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            anon_key: config.anon_key.clone(),
            sessions,
        }
    }

    fn unix_now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Exchanges a refresh token for a fresh session.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let response = self
            .client
            .post(format!(
                "{}/auth/v1/token?grant_type=refresh_token",
                self.base_url
            ))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(status.as_u16(), body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        let claims = decode_access_claims(&token.access_token)?;

        Ok(AuthSession {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: claims.exp,
            user: token.user,
        })
    }

    /// Asks the backend who the bearer of `access_token` is.
    ///
    /// A 401 means the token is no longer honored and maps to `None`.
    async fn fetch_user(&self, access_token: &str) -> Result<Option<AuthUser>, AuthError> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(status.as_u16(), body));
        }
        response
            .json::<AuthUser>()
            .await
            .map(Some)
            .map_err(|e| AuthError::Network(e.to_string()))
    }

    /// Refreshes the persisted session, clearing it when the backend has
    /// revoked the refresh token.
    async fn refresh_persisted(&self, session: &AuthSession) -> Result<Option<AuthSession>, AuthError> {
        match self.refresh(&session.refresh_token).await {
            Ok(renewed) => {
                self.sessions.save(&renewed)?;
                debug!(user = %renewed.user.id, "session refreshed");
                Ok(Some(renewed))
            }
            Err(AuthError::Rejected(status, msg)) => {
                warn!(status, %msg, "refresh token rejected, clearing session");
                self.sessions.clear()?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl IdentityServiceTrait for IdentityService {
    async fn current_session(&self) -> Result<Option<SessionContext>, AuthError> {
        let Some(mut session) = self.sessions.load()? else {
            return Ok(None);
        };

        if session.is_expired(Self::unix_now()) {
            match self.refresh_persisted(&session).await? {
                Some(renewed) => session = renewed,
                None => return Ok(None),
            }
        }

        // Validate against the backend; one refresh attempt if the token
        // was invalidated between requests.
        if let Some(user) = self.fetch_user(&session.access_token).await? {
            return Ok(Some(SessionContext {
                user_id: user.id,
                access_token: session.access_token.clone(),
            }));
        }

        match self.refresh_persisted(&session).await? {
            Some(renewed) => match self.fetch_user(&renewed.access_token).await? {
                Some(user) => Ok(Some(SessionContext {
                    user_id: user.id,
                    access_token: renewed.access_token.clone(),
                })),
                None => {
                    self.sessions.clear()?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn store_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<AuthUser, AuthError> {
        let claims = decode_access_claims(access_token)?;
        let user = AuthUser {
            id: claims.sub,
            email: claims.email,
        };
        let session = AuthSession {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at: claims.exp,
            user: user.clone(),
        };
        self.sessions.save(&session)?;
        debug!(user = %user.id, "session stored");
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.sessions.load()? else {
            return Ok(());
        };

        let response = self
            .client
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        // An already-dead token still counts as signed out.
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            self.sessions.clear()?;
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(AuthError::Rejected(status.as_u16(), body))
    }
}
