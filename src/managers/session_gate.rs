//! Session gate for smartmark.
//!
//! Decides, for each view, whether the visitor may stay: unauthenticated
//! visitors never see the protected view (the redirect replaces history,
//! so back-navigation cannot return there), and authenticated visitors
//! are bounced off the sign-in view. Also owns sign-out.

use tracing::error;

use crate::services::identity_service::IdentityServiceTrait;
use crate::types::errors::AuthError;
use crate::types::session::{ProtectedCheck, Route, RouteDecision};

/// Gate over the identity collaborator.
pub struct SessionGate<I> {
    identity: I,
}

impl<I: IdentityServiceTrait> SessionGate<I> {
    pub fn new(identity: I) -> Self {
        Self { identity }
    }

    /// The identity collaborator behind the gate.
    pub fn identity(&self) -> &I {
        &self.identity
    }

    /// Mount-time check for the protected view.
    ///
    /// A failed identity check is logged and treated as signed out, so
    /// protected content never renders without an established session.
    pub async fn check_protected(&self) -> ProtectedCheck {
        match self.identity.current_session().await {
            Ok(Some(session)) => ProtectedCheck {
                decision: RouteDecision::Stay,
                session: Some(session),
            },
            Ok(None) => ProtectedCheck {
                decision: RouteDecision::Redirect {
                    to: Route::SignIn,
                    replace: true,
                },
                session: None,
            },
            Err(e) => {
                error!("session check failed: {}", e);
                ProtectedCheck {
                    decision: RouteDecision::Redirect {
                        to: Route::SignIn,
                        replace: true,
                    },
                    session: None,
                }
            }
        }
    }

    /// Mount-time check for the sign-in view: the inverse redirect.
    pub async fn check_sign_in(&self) -> RouteDecision {
        match self.identity.current_session().await {
            Ok(Some(_)) => RouteDecision::Redirect {
                to: Route::Home,
                replace: true,
            },
            Ok(None) => RouteDecision::Stay,
            Err(e) => {
                error!("session check failed: {}", e);
                RouteDecision::Stay
            }
        }
    }

    /// Terminates the session. On success the caller navigates to the
    /// sign-in view; on failure the error propagates for logging and the
    /// view stays where it is.
    pub async fn sign_out(&self) -> Result<RouteDecision, AuthError> {
        self.identity.sign_out().await?;
        Ok(RouteDecision::Redirect {
            to: Route::SignIn,
            replace: false,
        })
    }
}
