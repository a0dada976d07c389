//! RPC method handler for the smartmark JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! `handle_method` dispatches method calls to the session gate and the
//! list controller through the [`App`] struct.

use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::error;

use crate::app::App;
use crate::managers::bookmark_list::{BookmarkListController, DeleteOutcome, SubmitOutcome};
use crate::services::bookmark_store::BookmarkStoreTrait;
use crate::services::change_feed::ChangeFeedTrait;
use crate::services::identity_service::IdentityServiceTrait;
use crate::types::bookmark::Bookmark;
use crate::types::session::RouteDecision;

/// Serializes a gate decision for the UI.
fn decision_json(decision: &RouteDecision) -> Value {
    match decision {
        RouteDecision::Stay => json!({"action": "stay"}),
        RouteDecision::Redirect { to, replace } => {
            json!({"action": "redirect", "to": to.path(), "replace": replace})
        }
    }
}

/// Serializes the list view's state for the UI.
fn state_json<S: BookmarkStoreTrait + Clone>(list: &BookmarkListController<S>) -> Value {
    json!({
        "bookmarks": list.bookmarks(),
        "loading": list.is_loading(),
        "submitting": list.is_submitting(),
        "draft_url": list.draft_url(),
        "draft_title": list.draft_title(),
    })
}

/// Dispatch a JSON-RPC method call to the appropriate handler.
///
/// `updates` is handed to the list view on `list.open`; feed-triggered
/// snapshots arrive there for the server loop to push as events.
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method<I, S, F>(
    app: &Mutex<App<I, S, F>>,
    method: &str,
    params: &Value,
    updates: &mpsc::UnboundedSender<Vec<Bookmark>>,
) -> Result<Value, String>
where
    I: IdentityServiceTrait,
    S: BookmarkStoreTrait + Clone + Send + Sync + 'static,
    F: ChangeFeedTrait,
{
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Routing ───
        "route.home" => {
            let app = app.lock().await;
            let check = app.gate().check_protected().await;
            let mut decision = decision_json(&check.decision);
            if let Some(session) = &check.session {
                decision["user_id"] = json!(session.user_id);
            }
            Ok(decision)
        }
        "route.auth" => {
            let app = app.lock().await;
            Ok(decision_json(&app.gate().check_sign_in().await))
        }

        // ─── Session ───
        "auth.set_session" => {
            let access = params
                .get("access_token")
                .and_then(|v| v.as_str())
                .ok_or("missing access_token")?;
            let refresh = params
                .get("refresh_token")
                .and_then(|v| v.as_str())
                .ok_or("missing refresh_token")?;
            let app = app.lock().await;
            let user = app
                .gate()
                .identity()
                .store_session(access, refresh)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"user": {"id": user.id, "email": user.email}}))
        }
        "auth.signout" => {
            let mut app = app.lock().await;
            // No feed task may outlive the session that authorized it.
            app.close_list().await;
            match app.gate().sign_out().await {
                Ok(decision) => Ok(decision_json(&decision)),
                Err(e) => {
                    error!("sign out failed: {}", e);
                    Err(e.to_string())
                }
            }
        }

        // ─── List view ───
        "list.open" => {
            let mut app = app.lock().await;
            let check = app.open_list(updates.clone()).await;
            if check.session.is_none() {
                return Ok(decision_json(&check.decision));
            }
            let controller = app.list().ok_or("list view not open")?;
            let state = state_json(&*controller.lock().await);
            Ok(state)
        }
        "list.state" => {
            let app = app.lock().await;
            let controller = app.list().ok_or("list view not open")?;
            let state = state_json(&*controller.lock().await);
            Ok(state)
        }
        "list.set_draft" => {
            let app = app.lock().await;
            let controller = app.list().ok_or("list view not open")?;
            let mut list = controller.lock().await;
            if let Some(url) = params.get("url").and_then(|v| v.as_str()) {
                list.set_draft_url(url);
            }
            if let Some(title) = params.get("title").and_then(|v| v.as_str()) {
                list.set_draft_title(title);
            }
            Ok(json!({"ok": true}))
        }
        "list.submit" => {
            let app = app.lock().await;
            let controller = app.list().ok_or("list view not open")?;
            let outcome = controller.lock().await.submit().await;
            Ok(match outcome {
                SubmitOutcome::Accepted => json!({"status": "accepted"}),
                SubmitOutcome::Incomplete => json!({"status": "incomplete"}),
                SubmitOutcome::Failed(alert) => json!({"status": "failed", "alert": alert}),
            })
        }
        "list.delete" => {
            let id = params
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or("missing id")?;
            let confirmed = params
                .get("confirmed")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let app = app.lock().await;
            let controller = app.list().ok_or("list view not open")?;
            let outcome = controller.lock().await.delete(id, confirmed).await;
            Ok(match outcome {
                DeleteOutcome::Accepted => json!({"status": "accepted"}),
                DeleteOutcome::Declined => json!({"status": "declined"}),
                DeleteOutcome::Failed(alert) => json!({"status": "failed", "alert": alert}),
            })
        }
        "list.close" => {
            let mut app = app.lock().await;
            app.close_list().await;
            Ok(json!({"ok": true}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
