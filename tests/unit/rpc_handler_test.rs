//! Unit tests for the RPC handler — the JSON-RPC methods dispatched by
//! `handle_method`, exercised through the same code path the real
//! `smartmark-rpc` binary uses, with in-memory collaborator fakes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use smartmark::app::App;
use smartmark::rpc_handler::handle_method;
use smartmark::services::bookmark_store::BookmarkStoreTrait;
use smartmark::services::change_feed::{ChangeFeedTrait, Subscription};
use smartmark::services::identity_service::IdentityServiceTrait;
use smartmark::types::bookmark::{Bookmark, NewBookmark};
use smartmark::types::errors::{AuthError, FeedError, StoreError};
use smartmark::types::feed::{ChangeAction, ChangeEvent};
use smartmark::types::session::{AuthUser, SessionContext};

// ─── Fakes ───

#[derive(Clone, Default)]
struct FakeIdentity {
    session: Arc<StdMutex<Option<SessionContext>>>,
    sign_out_calls: Arc<AtomicUsize>,
}

impl FakeIdentity {
    fn signed_in(user_id: &str) -> Self {
        let identity = Self::default();
        *identity.session.lock().unwrap() = Some(SessionContext {
            user_id: user_id.to_string(),
            access_token: format!("token-{}", user_id),
        });
        identity
    }
}

#[async_trait]
impl IdentityServiceTrait for FakeIdentity {
    async fn current_session(&self) -> Result<Option<SessionContext>, AuthError> {
        Ok(self.session.lock().unwrap().clone())
    }

    async fn store_session(
        &self,
        access_token: &str,
        _refresh_token: &str,
    ) -> Result<AuthUser, AuthError> {
        let user = AuthUser {
            id: "user-9".to_string(),
            email: Some("nine@example.com".to_string()),
        };
        *self.session.lock().unwrap() = Some(SessionContext {
            user_id: user.id.clone(),
            access_token: access_token.to_string(),
        });
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        *self.session.lock().unwrap() = None;
        Ok(())
    }
}

#[derive(Clone, Default)]
struct FakeStore {
    rows: Arc<StdMutex<Vec<Bookmark>>>,
    next_seq: Arc<AtomicUsize>,
}

impl FakeStore {
    fn seed(&self, url: &str, title: &str, user_id: &str) -> String {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("bm-{:04}", seq);
        self.rows.lock().unwrap().push(Bookmark {
            id: id.clone(),
            url: url.to_string(),
            title: title.to_string(),
            user_id: user_id.to_string(),
            created_at: format!("2026-01-01T00:00:00.{:09}Z", seq),
        });
        id
    }
}

#[async_trait]
impl BookmarkStoreTrait for FakeStore {
    async fn list_bookmarks(&self, ctx: &SessionContext) -> Result<Vec<Bookmark>, StoreError> {
        let mut rows: Vec<Bookmark> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.user_id == ctx.user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_bookmark(
        &self,
        _ctx: &SessionContext,
        bookmark: NewBookmark,
    ) -> Result<(), StoreError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.rows.lock().unwrap().push(Bookmark {
            id: format!("bm-{:04}", seq),
            url: bookmark.url,
            title: bookmark.title,
            user_id: bookmark.user_id,
            created_at: format!("2026-01-01T00:00:00.{:09}Z", seq),
        });
        Ok(())
    }

    async fn delete_bookmark(&self, _ctx: &SessionContext, id: &str) -> Result<(), StoreError> {
        self.rows.lock().unwrap().retain(|b| b.id != id);
        Ok(())
    }
}

/// Hands out a channel-backed subscription and keeps the sender so tests
/// can inject change events.
#[derive(Clone, Default)]
struct FakeFeed {
    event_tx: Arc<StdMutex<Option<mpsc::Sender<ChangeEvent>>>>,
    fail: bool,
}

impl FakeFeed {
    async fn notify(&self, action: ChangeAction) {
        let tx = self
            .event_tx
            .lock()
            .unwrap()
            .clone()
            .expect("no active subscription");
        tx.send(ChangeEvent {
            action,
            row_id: None,
        })
        .await
        .unwrap();
    }
}

#[async_trait]
impl ChangeFeedTrait for FakeFeed {
    async fn subscribe(
        &self,
        _table: &str,
        _ctx: &SessionContext,
    ) -> Result<Subscription, FeedError> {
        if self.fail {
            return Err(FeedError::Connect("connection refused".to_string()));
        }
        let (tx, subscription) = Subscription::channel(16);
        *self.event_tx.lock().unwrap() = Some(tx);
        Ok(subscription)
    }
}

type TestApp = Mutex<App<FakeIdentity, FakeStore, FakeFeed>>;

struct Fixture {
    app: TestApp,
    identity: FakeIdentity,
    store: FakeStore,
    feed: FakeFeed,
    updates_tx: mpsc::UnboundedSender<Vec<Bookmark>>,
    updates_rx: mpsc::UnboundedReceiver<Vec<Bookmark>>,
}

fn setup(signed_in: bool) -> Fixture {
    let identity = if signed_in {
        FakeIdentity::signed_in("user-1")
    } else {
        FakeIdentity::default()
    };
    let store = FakeStore::default();
    let feed = FakeFeed::default();
    let app = Mutex::new(App::with_services(
        identity.clone(),
        store.clone(),
        feed.clone(),
    ));
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    Fixture {
        app,
        identity,
        store,
        feed,
        updates_tx,
        updates_rx,
    }
}

// ─── Ping / unknown ───

#[tokio::test]
async fn test_ping() {
    let fx = setup(false);
    let res = handle_method(&fx.app, "ping", &json!({}), &fx.updates_tx)
        .await
        .unwrap();
    assert_eq!(res, json!({"pong": true}));
}

#[tokio::test]
async fn test_unknown_method_returns_error() {
    let fx = setup(false);
    let res = handle_method(&fx.app, "nonexistent.method", &json!({}), &fx.updates_tx).await;
    assert!(res.is_err());
    assert!(res.unwrap_err().contains("unknown method"));
}

// ─── Routing ───

#[tokio::test]
async fn test_route_home_signed_out_redirects_to_auth() {
    let fx = setup(false);
    let res = handle_method(&fx.app, "route.home", &json!({}), &fx.updates_tx)
        .await
        .unwrap();
    assert_eq!(
        res,
        json!({"action": "redirect", "to": "/auth", "replace": true})
    );
}

#[tokio::test]
async fn test_route_home_signed_in_stays_with_user_id() {
    let fx = setup(true);
    let res = handle_method(&fx.app, "route.home", &json!({}), &fx.updates_tx)
        .await
        .unwrap();
    assert_eq!(res["action"], "stay");
    assert_eq!(res["user_id"], "user-1");
}

#[tokio::test]
async fn test_route_auth_signed_in_redirects_home() {
    let fx = setup(true);
    let res = handle_method(&fx.app, "route.auth", &json!({}), &fx.updates_tx)
        .await
        .unwrap();
    assert_eq!(res, json!({"action": "redirect", "to": "/", "replace": true}));
}

#[tokio::test]
async fn test_route_auth_signed_out_stays() {
    let fx = setup(false);
    let res = handle_method(&fx.app, "route.auth", &json!({}), &fx.updates_tx)
        .await
        .unwrap();
    assert_eq!(res, json!({"action": "stay"}));
}

// ─── Session ───

#[tokio::test]
async fn test_auth_set_session_returns_the_user() {
    let fx = setup(false);
    let res = handle_method(
        &fx.app,
        "auth.set_session",
        &json!({"access_token": "access-9", "refresh_token": "refresh-9"}),
        &fx.updates_tx,
    )
    .await
    .unwrap();
    assert_eq!(res["user"]["id"], "user-9");
    assert_eq!(res["user"]["email"], "nine@example.com");
}

#[tokio::test]
async fn test_auth_set_session_missing_params() {
    let fx = setup(false);
    let res = handle_method(
        &fx.app,
        "auth.set_session",
        &json!({"access_token": "access-9"}),
        &fx.updates_tx,
    )
    .await;
    assert!(res.is_err());
}

#[tokio::test]
async fn test_auth_signout_tears_down_the_list_and_redirects() {
    let fx = setup(true);
    handle_method(&fx.app, "list.open", &json!({}), &fx.updates_tx)
        .await
        .unwrap();

    let res = handle_method(&fx.app, "auth.signout", &json!({}), &fx.updates_tx)
        .await
        .unwrap();
    assert_eq!(
        res,
        json!({"action": "redirect", "to": "/auth", "replace": false})
    );
    assert_eq!(fx.identity.sign_out_calls.load(Ordering::SeqCst), 1);

    // The view is gone.
    let state = handle_method(&fx.app, "list.state", &json!({}), &fx.updates_tx).await;
    assert!(state.is_err());
}

// ─── List view ───

#[tokio::test]
async fn test_list_open_signed_out_redirects_without_mounting() {
    let fx = setup(false);
    let res = handle_method(&fx.app, "list.open", &json!({}), &fx.updates_tx)
        .await
        .unwrap();
    assert_eq!(res["action"], "redirect");
    assert!(
        handle_method(&fx.app, "list.state", &json!({}), &fx.updates_tx)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_list_open_loads_the_initial_snapshot() {
    let fx = setup(true);
    fx.store.seed("https://example.com", "Example", "user-1");
    fx.store.seed("https://docs.example.com", "Docs", "user-1");
    fx.store.seed("https://other.example.com", "Other", "user-2");

    let res = handle_method(&fx.app, "list.open", &json!({}), &fx.updates_tx)
        .await
        .unwrap();
    let bookmarks = res["bookmarks"].as_array().unwrap();
    assert_eq!(bookmarks.len(), 2);
    assert_eq!(bookmarks[0]["title"], "Docs");
    assert_eq!(bookmarks[1]["title"], "Example");
    assert_eq!(res["loading"], false);
    assert_eq!(res["draft_url"], "");
    assert_eq!(res["draft_title"], "");
}

#[tokio::test]
async fn test_list_state_without_open_errors() {
    let fx = setup(true);
    let res = handle_method(&fx.app, "list.state", &json!({}), &fx.updates_tx).await;
    assert!(res.unwrap_err().contains("list view not open"));
}

#[tokio::test]
async fn test_submit_flow_converges_via_the_change_feed() {
    let mut fx = setup(true);
    handle_method(&fx.app, "list.open", &json!({}), &fx.updates_tx)
        .await
        .unwrap();

    handle_method(
        &fx.app,
        "list.set_draft",
        &json!({"url": "https://example.com", "title": "Example"}),
        &fx.updates_tx,
    )
    .await
    .unwrap();

    let res = handle_method(&fx.app, "list.submit", &json!({}), &fx.updates_tx)
        .await
        .unwrap();
    assert_eq!(res, json!({"status": "accepted"}));

    // The inserted row reaches the view only through the feed round-trip.
    fx.feed.notify(ChangeAction::Insert).await;
    let snapshot = fx.updates_rx.recv().await.expect("snapshot should arrive");
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].title, "Example");

    let state = handle_method(&fx.app, "list.state", &json!({}), &fx.updates_tx)
        .await
        .unwrap();
    assert_eq!(state["bookmarks"].as_array().unwrap().len(), 1);
    assert_eq!(state["draft_url"], "");
}

#[tokio::test]
async fn test_submit_with_blank_drafts_is_incomplete() {
    let fx = setup(true);
    handle_method(&fx.app, "list.open", &json!({}), &fx.updates_tx)
        .await
        .unwrap();
    handle_method(
        &fx.app,
        "list.set_draft",
        &json!({"url": "   ", "title": "Example"}),
        &fx.updates_tx,
    )
    .await
    .unwrap();

    let res = handle_method(&fx.app, "list.submit", &json!({}), &fx.updates_tx)
        .await
        .unwrap();
    assert_eq!(res, json!({"status": "incomplete"}));
    assert!(fx.store.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_requires_confirmation() {
    let fx = setup(true);
    let id = fx.store.seed("https://example.com", "Example", "user-1");
    handle_method(&fx.app, "list.open", &json!({}), &fx.updates_tx)
        .await
        .unwrap();

    let res = handle_method(
        &fx.app,
        "list.delete",
        &json!({"id": id}),
        &fx.updates_tx,
    )
    .await
    .unwrap();
    assert_eq!(res, json!({"status": "declined"}));
    assert_eq!(fx.store.rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_confirmed_delete_converges_via_the_change_feed() {
    let mut fx = setup(true);
    let id = fx.store.seed("https://example.com", "Example", "user-1");
    handle_method(&fx.app, "list.open", &json!({}), &fx.updates_tx)
        .await
        .unwrap();

    let res = handle_method(
        &fx.app,
        "list.delete",
        &json!({"id": id, "confirmed": true}),
        &fx.updates_tx,
    )
    .await
    .unwrap();
    assert_eq!(res, json!({"status": "accepted"}));

    fx.feed.notify(ChangeAction::Delete).await;
    let snapshot = fx.updates_rx.recv().await.expect("snapshot should arrive");
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn test_list_close_stops_feed_updates() {
    let mut fx = setup(true);
    handle_method(&fx.app, "list.open", &json!({}), &fx.updates_tx)
        .await
        .unwrap();
    handle_method(&fx.app, "list.close", &json!({}), &fx.updates_tx)
        .await
        .unwrap();

    // The subscription is torn down; a late event reaches nothing.
    let tx = fx.feed.event_tx.lock().unwrap().clone();
    if let Some(tx) = tx {
        let _ = tx
            .send(ChangeEvent {
                action: ChangeAction::Insert,
                row_id: None,
            })
            .await;
    }
    let result = timeout(Duration::from_millis(100), fx.updates_rx.recv()).await;
    assert!(result.is_err() || result.unwrap().is_none());
}

#[tokio::test]
async fn test_list_open_survives_a_feed_subscription_failure() {
    let mut fx = setup(true);
    fx.feed.fail = true;
    let app = Mutex::new(App::with_services(
        fx.identity.clone(),
        fx.store.clone(),
        fx.feed.clone(),
    ));
    fx.store.seed("https://example.com", "Example", "user-1");

    // The view loads; it simply will not update live.
    let res = handle_method(&app, "list.open", &json!({}), &fx.updates_tx)
        .await
        .unwrap();
    assert_eq!(res["bookmarks"].as_array().unwrap().len(), 1);
}
