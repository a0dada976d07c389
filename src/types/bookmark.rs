use serde::{Deserialize, Serialize};

/// Name of the backing table in the hosted store.
pub const BOOKMARKS_TABLE: &str = "bookmarks";

/// A saved bookmark, as stored by the backend.
///
/// `id` and `created_at` are assigned server-side. `created_at` is an
/// RFC 3339 timestamp and is only used for newest-first ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub url: String,
    pub title: String,
    pub user_id: String,
    pub created_at: String,
}

/// Insert payload for a new bookmark. The server assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub url: String,
    pub title: String,
    pub user_id: String,
}
