//! Change-feed collaborator for smartmark.
//!
//! One subscription per list-view mount: a long-lived HTTP response whose
//! body is newline-delimited JSON change events, filtered server-side to
//! the session's rows. The [`Subscription`] owns the transport task;
//! dropping it tears the stream down exactly once. Reconnection is the
//! transport's own business — none is attempted here.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::types::errors::FeedError;
use crate::types::feed::ChangeEvent;
use crate::types::session::SessionContext;

/// Trait defining change-feed subscription.
#[async_trait]
pub trait ChangeFeedTrait: Send + Sync {
    /// Subscribes to all row changes on `table` owned by the context's
    /// user. Events arrive until the subscription is dropped.
    async fn subscribe(
        &self,
        table: &str,
        ctx: &SessionContext,
    ) -> Result<Subscription, FeedError>;
}

/// A live change-feed subscription.
///
/// Receives [`ChangeEvent`]s from the transport. Dropping the value (or
/// calling [`Subscription::unsubscribe`]) aborts the transport task, so no
/// event can be delivered after teardown.
pub struct Subscription {
    events: mpsc::Receiver<ChangeEvent>,
    transport: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wraps a receiver and the transport task feeding it.
    pub fn new(events: mpsc::Receiver<ChangeEvent>, transport: Option<JoinHandle<()>>) -> Self {
        Self { events, transport }
    }

    /// A subscription fed by hand — used by in-memory feeds in tests.
    pub fn channel(capacity: usize) -> (mpsc::Sender<ChangeEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx, None))
    }

    /// Next change event, or `None` once the feed has ended.
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Tears the subscription down.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.transport.take() {
            task.abort();
        }
    }
}

/// Change feed backed by the backend's streaming endpoint.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl ChangeFeed {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            anon_key: config.anon_key.clone(),
        }
    }
}

#[async_trait]
impl ChangeFeedTrait for ChangeFeed {
    async fn subscribe(
        &self,
        table: &str,
        ctx: &SessionContext,
    ) -> Result<Subscription, FeedError> {
        let channel = format!("{}-changes-{}", table, Uuid::new_v4());
        let response = self
            .client
            .get(format!("{}/realtime/v1/stream", self.base_url))
            .query(&[
                ("table", table),
                ("user_id", &format!("eq.{}", ctx.user_id)),
                ("events", "*"),
            ])
            .header("apikey", &self.anon_key)
            .bearer_auth(&ctx.access_token)
            .header(reqwest::header::ACCEPT, "application/x-ndjson")
            .send()
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Connect(format!("status {}", status)));
        }
        debug!(%channel, "change feed subscribed");

        let (tx, rx) = mpsc::channel(16);
        let transport = tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buf: Vec<u8> = Vec::new();
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!(%channel, "change feed stream error: {}", e);
                        break;
                    }
                };
                buf.extend_from_slice(&chunk);
                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<ChangeEvent>(line) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!(%channel, "ignoring malformed change event: {}", e),
                    }
                }
            }
            debug!(%channel, "change feed stream closed");
        });

        Ok(Subscription::new(rx, Some(transport)))
    }
}
