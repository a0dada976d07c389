//! Application core for smartmark.
//!
//! Wires configuration into the three backend collaborators and holds the
//! at-most-one active list view. Generic over the collaborator traits,
//! with the production implementations as defaults, so tests drive the
//! same wiring with in-memory fakes.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::config::{self, BackendConfig};
use crate::managers::bookmark_list::{reload, BookmarkListController, ListSync};
use crate::managers::session_gate::SessionGate;
use crate::services::bookmark_store::{BookmarkStore, BookmarkStoreTrait};
use crate::services::change_feed::{ChangeFeed, ChangeFeedTrait};
use crate::services::identity_service::{IdentityService, IdentityServiceTrait};
use crate::services::session_store::SessionFileStore;
use crate::types::bookmark::{Bookmark, BOOKMARKS_TABLE};
use crate::types::session::ProtectedCheck;

/// A mounted list view: the shared controller plus its feed listener.
///
/// `sync` is `None` when the feed subscription failed at mount; the view
/// then shows the loaded list without live updates.
struct ActiveList<S> {
    controller: Arc<Mutex<BookmarkListController<S>>>,
    sync: Option<ListSync>,
}

/// Central application struct: the session gate, the backend
/// collaborators, and the active list view if one is mounted.
pub struct App<I = IdentityService, S = BookmarkStore, F = ChangeFeed> {
    gate: SessionGate<I>,
    store: S,
    feed: F,
    list: Option<ActiveList<S>>,
}

impl App {
    /// Production wiring from the loaded configuration. The session file
    /// lives under the configured data directory.
    pub fn new(backend: &BackendConfig) -> Self {
        let sessions = SessionFileStore::in_dir(config::data_dir());
        Self::with_services(
            IdentityService::new(backend, sessions),
            BookmarkStore::new(backend),
            ChangeFeed::new(backend),
        )
    }
}

impl<I, S, F> App<I, S, F>
where
    I: IdentityServiceTrait,
    S: BookmarkStoreTrait + Clone + Send + Sync + 'static,
    F: ChangeFeedTrait,
{
    pub fn with_services(identity: I, store: S, feed: F) -> Self {
        Self {
            gate: SessionGate::new(identity),
            store,
            feed,
            list: None,
        }
    }

    pub fn gate(&self) -> &SessionGate<I> {
        &self.gate
    }

    /// The active list view's controller, when one is mounted.
    pub fn list(&self) -> Option<&Arc<Mutex<BookmarkListController<S>>>> {
        self.list.as_ref().map(|view| &view.controller)
    }

    /// Gate-checked mount of the list view.
    ///
    /// When the gate decides `Stay`, any previously mounted view is torn
    /// down, the initial load runs, and the change feed is subscribed;
    /// snapshots applied by feed-triggered reloads are pushed into
    /// `updates`. A failed subscription is logged and the view simply
    /// stays static. A redirect decision mounts nothing.
    pub async fn open_list(
        &mut self,
        updates: mpsc::UnboundedSender<Vec<Bookmark>>,
    ) -> ProtectedCheck {
        let check = self.gate.check_protected().await;
        let Some(session) = check.session.clone() else {
            return check;
        };

        self.close_list().await;

        let controller = Arc::new(Mutex::new(BookmarkListController::new(
            self.store.clone(),
            session.clone(),
        )));
        reload(&controller).await;

        let sync = match self.feed.subscribe(BOOKMARKS_TABLE, &session).await {
            Ok(subscription) => Some(ListSync::start(controller.clone(), subscription, updates)),
            Err(e) => {
                warn!("change feed unavailable, list will not update live: {}", e);
                None
            }
        };

        self.list = Some(ActiveList { controller, sync });
        check
    }

    /// Unmount: stops the feed listener and marks the controller closed,
    /// so a load resolving after teardown cannot mutate the dead view.
    pub async fn close_list(&mut self) {
        if let Some(view) = self.list.take() {
            if let Some(sync) = view.sync {
                sync.shutdown();
            }
            view.controller.lock().await.close();
        }
    }

    /// Teardown ahead of process exit.
    pub async fn shutdown(&mut self) {
        self.close_list().await;
    }
}
