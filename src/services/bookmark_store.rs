//! Data-store collaborator for smartmark.
//!
//! Row-oriented access to the hosted `bookmarks` table. Every request
//! carries the public API key plus the session's bearer token; which rows
//! the token may touch is the backend's row-level policy, not ours.

use async_trait::async_trait;

use crate::config::BackendConfig;
use crate::types::bookmark::{Bookmark, NewBookmark, BOOKMARKS_TABLE};
use crate::types::errors::StoreError;
use crate::types::session::SessionContext;

/// Trait defining the bookmark store operations.
#[async_trait]
pub trait BookmarkStoreTrait: Send + Sync {
    /// All bookmarks owned by the context's user, newest first.
    async fn list_bookmarks(&self, ctx: &SessionContext) -> Result<Vec<Bookmark>, StoreError>;
    /// Inserts a bookmark; the server assigns id and creation timestamp.
    async fn insert_bookmark(
        &self,
        ctx: &SessionContext,
        bookmark: NewBookmark,
    ) -> Result<(), StoreError>;
    /// Deletes a bookmark by id. Matching no rows is a silent success.
    async fn delete_bookmark(&self, ctx: &SessionContext, id: &str) -> Result<(), StoreError>;
}

/// Bookmark store backed by the backend's REST surface.
#[derive(Debug, Clone)]
pub struct BookmarkStore {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl BookmarkStore {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            anon_key: config.anon_key.clone(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, BOOKMARKS_TABLE)
    }

    /// Maps a non-success response to a [`StoreError::Rejected`].
    async fn reject(response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StoreError::Rejected(status, body)
    }
}

#[async_trait]
impl BookmarkStoreTrait for BookmarkStore {
    async fn list_bookmarks(&self, ctx: &SessionContext) -> Result<Vec<Bookmark>, StoreError> {
        let response = self
            .client
            .get(self.table_url())
            .query(&[
                ("select", "*"),
                ("user_id", &format!("eq.{}", ctx.user_id)),
                ("order", "created_at.desc"),
            ])
            .header("apikey", &self.anon_key)
            .bearer_auth(&ctx.access_token)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }
        response
            .json::<Vec<Bookmark>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn insert_bookmark(
        &self,
        ctx: &SessionContext,
        bookmark: NewBookmark,
    ) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.table_url())
            .header("apikey", &self.anon_key)
            .bearer_auth(&ctx.access_token)
            .header("Prefer", "return=minimal")
            .json(&bookmark)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(())
    }

    async fn delete_bookmark(&self, ctx: &SessionContext, id: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.table_url())
            .query(&[("id", &format!("eq.{}", id))])
            .header("apikey", &self.anon_key)
            .bearer_auth(&ctx.access_token)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(())
    }
}
