use serde::{Deserialize, Serialize};

/// Kind of row change reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

/// A row-level change notification for the subscribed table.
///
/// The payload is intentionally thin: every notification triggers a full
/// reload, so only the action (and the row id, when the backend includes
/// one) is carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub action: ChangeAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_id: Option<String>,
}
