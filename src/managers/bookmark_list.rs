//! Bookmark list controller for smartmark.
//!
//! Owns the in-memory list of the signed-in user's bookmarks: initial
//! load, full reload on every change notification, and the create/delete
//! actions. The visible list is always a wholesale-replaced snapshot of
//! the store — mutations never patch it locally; they converge through
//! the change feed.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::services::bookmark_store::BookmarkStoreTrait;
use crate::services::change_feed::Subscription;
use crate::types::bookmark::{Bookmark, NewBookmark};
use crate::types::errors::StoreError;
use crate::types::session::SessionContext;

/// Alert shown when an insert fails. The drafts stay populated for retry.
pub const ADD_FAILED_ALERT: &str = "Failed to add bookmark. Please try again.";
/// Alert shown when a delete fails.
pub const DELETE_FAILED_ALERT: &str = "Failed to delete bookmark. Please try again.";

/// Outcome of a submit action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The insert was accepted; drafts cleared. The list converges via
    /// the change feed once the notification round-trips.
    Accepted,
    /// A draft field was empty after trimming; no network call was made.
    Incomplete,
    /// The insert failed; drafts kept, alert text for the user.
    Failed(&'static str),
}

/// Outcome of a delete action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The delete was issued; the row disappears via the change feed.
    Accepted,
    /// The user declined the confirmation prompt; no network call.
    Declined,
    /// The delete failed; alert text for the user.
    Failed(&'static str),
}

/// View controller for the bookmark list.
///
/// Loads are sequence-tagged: overlapping reloads (mount vs. change
/// notification) may resolve out of order, and only the highest-sequence
/// response is allowed to replace the list.
pub struct BookmarkListController<S> {
    store: S,
    session: SessionContext,
    bookmarks: Vec<Bookmark>,
    loading: bool,
    draft_url: String,
    draft_title: String,
    submitting: bool,
    issued_seq: u64,
    applied_seq: u64,
    closed: bool,
}

impl<S: BookmarkStoreTrait + Clone> BookmarkListController<S> {
    pub fn new(store: S, session: SessionContext) -> Self {
        Self {
            store,
            session,
            bookmarks: Vec::new(),
            loading: true,
            draft_url: String::new(),
            draft_title: String::new(),
            submitting: false,
            issued_seq: 0,
            applied_seq: 0,
            closed: false,
        }
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// A handle on the store, for fetching outside the controller lock.
    pub fn store(&self) -> S {
        self.store.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn draft_url(&self) -> &str {
        &self.draft_url
    }

    pub fn draft_title(&self) -> &str {
        &self.draft_title
    }

    pub fn set_draft_url(&mut self, url: &str) {
        self.draft_url = url.to_string();
    }

    pub fn set_draft_title(&mut self, title: &str) {
        self.draft_title = title.to_string();
    }

    /// Issues a new load, returning its sequence number.
    pub fn begin_load(&mut self) -> u64 {
        self.issued_seq += 1;
        self.loading = true;
        self.issued_seq
    }

    /// Applies a completed load.
    ///
    /// Clears the loading flag regardless of outcome so the view never
    /// hangs. The list is replaced only when this load's sequence number
    /// is the highest applied so far; stale responses are discarded.
    /// Failures are logged and otherwise silent. Returns whether the
    /// list was replaced.
    pub fn apply_load(&mut self, seq: u64, result: Result<Vec<Bookmark>, StoreError>) -> bool {
        if self.closed {
            return false;
        }
        self.loading = false;
        match result {
            Ok(rows) if seq > self.applied_seq => {
                self.applied_seq = seq;
                self.bookmarks = rows;
                true
            }
            Ok(_) => {
                debug!(seq, latest = self.applied_seq, "discarding stale load");
                false
            }
            Err(e) => {
                error!("failed to load bookmarks: {}", e);
                false
            }
        }
    }

    /// Submits the draft as a new bookmark.
    ///
    /// Both fields are trimmed; if either is empty the action is a no-op
    /// with no network call. On success the drafts are cleared and the
    /// list is left alone — the new row arrives via the change feed. On
    /// failure the drafts are kept so the user may retry.
    pub async fn submit(&mut self) -> SubmitOutcome {
        let url = self.draft_url.trim().to_string();
        let title = self.draft_title.trim().to_string();
        if url.is_empty() || title.is_empty() {
            return SubmitOutcome::Incomplete;
        }

        self.submitting = true;
        let result = self
            .store
            .insert_bookmark(
                &self.session,
                NewBookmark {
                    url,
                    title,
                    user_id: self.session.user_id.clone(),
                },
            )
            .await;
        self.submitting = false;

        match result {
            Ok(()) => {
                self.draft_url.clear();
                self.draft_title.clear();
                SubmitOutcome::Accepted
            }
            Err(e) => {
                error!("failed to add bookmark: {}", e);
                SubmitOutcome::Failed(ADD_FAILED_ALERT)
            }
        }
    }

    /// Deletes a bookmark by id, gated on the UI's confirmation prompt.
    ///
    /// A declined confirmation makes no network call. A confirmed delete
    /// relies on the change feed to drop the row from the visible list.
    pub async fn delete(&mut self, id: &str, confirmed: bool) -> DeleteOutcome {
        if !confirmed {
            return DeleteOutcome::Declined;
        }
        match self.store.delete_bookmark(&self.session, id).await {
            Ok(()) => DeleteOutcome::Accepted,
            Err(e) => {
                error!("failed to delete bookmark: {}", e);
                DeleteOutcome::Failed(DELETE_FAILED_ALERT)
            }
        }
    }

    /// Marks the controller as torn down. Loads resolving after this
    /// point are discarded, so a destroyed view is never mutated.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

/// Runs one full reload against the shared controller.
///
/// The fetch happens outside the controller lock, so a change
/// notification arriving mid-load can issue a newer load concurrently;
/// the sequence guard in [`BookmarkListController::apply_load`] keeps the
/// last-issued snapshot authoritative. Returns the applied snapshot, or
/// `None` when the result was stale, failed, or the controller is closed.
pub async fn reload<S>(
    controller: &Arc<Mutex<BookmarkListController<S>>>,
) -> Option<Vec<Bookmark>>
where
    S: BookmarkStoreTrait + Clone + Send + Sync + 'static,
{
    let (seq, store, session) = {
        let mut list = controller.lock().await;
        if list.is_closed() {
            return None;
        }
        (list.begin_load(), list.store(), list.session().clone())
    };

    let result = store.list_bookmarks(&session).await;

    let mut list = controller.lock().await;
    if list.apply_load(seq, result) {
        Some(list.bookmarks().to_vec())
    } else {
        None
    }
}

/// The feed-listener task for one mounted list view.
///
/// Every change notification triggers a full reload; applied snapshots
/// are pushed to the UI update channel. Shutting down aborts the task,
/// cancelling any in-flight reload and dropping the subscription.
pub struct ListSync {
    feed_task: JoinHandle<()>,
}

impl ListSync {
    pub fn start<S>(
        controller: Arc<Mutex<BookmarkListController<S>>>,
        mut subscription: Subscription,
        updates: mpsc::UnboundedSender<Vec<Bookmark>>,
    ) -> Self
    where
        S: BookmarkStoreTrait + Clone + Send + Sync + 'static,
    {
        let feed_task = tokio::spawn(async move {
            while let Some(event) = subscription.next_event().await {
                debug!(action = ?event.action, "bookmark change notification");
                if let Some(snapshot) = reload(&controller).await {
                    if updates.send(snapshot).is_err() {
                        break;
                    }
                }
            }
        });
        Self { feed_task }
    }

    /// Stops listening. Aborting also drops the subscription, which tears
    /// down its transport.
    pub fn shutdown(self) {
        self.feed_task.abort();
    }
}
