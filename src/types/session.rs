use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Sessions within this margin of expiry are refreshed eagerly, so a
/// token never goes stale between a gate check and the calls it guards.
pub const EXPIRY_MARGIN_SECS: i64 = 30;

/// The authenticated user, as reported by the identity endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

/// A persisted auth session: the token pair plus the user it belongs to.
///
/// Tokens are wiped from memory when the session is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) at which `access_token` expires.
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    /// True when the access token is expired or within the refresh margin.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now + EXPIRY_MARGIN_SECS
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        self.access_token.zeroize();
        self.refresh_token.zeroize();
    }
}

/// Identity established by the session gate, passed explicitly into the
/// list controller and every store/feed call.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub user_id: String,
    pub access_token: String,
}

/// The two views of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The protected bookmark list view ("/").
    Home,
    /// The sign-in view ("/auth").
    SignIn,
}

impl Route {
    /// Path of the view as the UI addresses it.
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::SignIn => "/auth",
        }
    }
}

/// Navigation outcome of a gate check or a sign-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Remain on the current view.
    Stay,
    /// Navigate to `to`. `replace` redirects without a history entry, so
    /// back-navigation cannot return to a view the visitor may not see.
    Redirect { to: Route, replace: bool },
}

/// Result of the protected-view gate check: the navigation decision and,
/// when the visitor may stay, the established session context.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectedCheck {
    pub decision: RouteDecision,
    pub session: Option<SessionContext>,
}
