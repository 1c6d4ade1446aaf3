//! Unread counters shown on navigation badges.
//!
//! Counters are seeded from the backend with [`CounterStore::refresh`] and
//! bumped by one for every matching push event. The two paths are not
//! reconciled: an increment that lands while a refresh is in flight is
//! overwritten by the snapshot, and the next refresh corrects any drift.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use storedesk_shared::{api, ApiError, CallRequestCount, Event, EventKind, PendingOrdersCount};
use tokio::sync::watch;
use url::Url;

use crate::api_client::ApiClient;
use crate::credentials::CredentialProvider;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub pending_orders: u64,
    pub new_call_requests: u64,
}

/// Process-wide counters, alive for the whole process regardless of which
/// views are mounted.
pub static COUNTERS: Lazy<CounterStore> = Lazy::new(CounterStore::new);

/// Authoritative counts from the backend.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn pending_orders(&self) -> Result<u64, ApiError>;
    async fn new_call_requests(&self) -> Result<u64, ApiError>;
}

/// [`SnapshotSource`] backed by the two count endpoints, authorized with the
/// current access credential.
#[derive(Clone)]
pub struct BackendSnapshots {
    api_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl BackendSnapshots {
    pub fn new(api_url: Url, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            api_url,
            credentials,
        }
    }

    fn api(&self) -> ApiClient {
        ApiClient::new()
            .with_base_url(self.api_url.as_str())
            .with_bearer(self.credentials.access_token())
    }
}

#[async_trait]
impl SnapshotSource for BackendSnapshots {
    async fn pending_orders(&self) -> Result<u64, ApiError> {
        let count: PendingOrdersCount = self.api().get_json(api::PENDING_ORDERS_COUNT_PATH).await?;
        Ok(count.pending)
    }

    async fn new_call_requests(&self) -> Result<u64, ApiError> {
        let count: CallRequestCount = self.api().get_json(api::NEW_CALL_REQUESTS_COUNT_PATH).await?;
        Ok(count.new)
    }
}

/// Observable counter state. Clones share the same counters.
#[derive(Debug, Clone)]
pub struct CounterStore {
    tx: Arc<watch::Sender<Counters>>,
}

impl CounterStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Counters::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> Counters {
        *self.tx.borrow()
    }

    /// Receiver notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<Counters> {
        self.tx.subscribe()
    }

    /// Replace both counters.
    pub fn set(&self, counters: Counters) {
        self.tx.send_replace(counters);
    }

    pub fn increment_orders(&self) {
        self.tx.send_modify(|c| c.pending_orders = c.pending_orders.saturating_add(1));
    }

    pub fn increment_call_requests(&self) {
        self.tx
            .send_modify(|c| c.new_call_requests = c.new_call_requests.saturating_add(1));
    }

    /// Count an inbound event against its counter.
    pub fn record(&self, event: &Event) {
        match event.kind() {
            EventKind::NewOrder => self.increment_orders(),
            EventKind::NewCallRequest => self.increment_call_requests(),
        }
    }

    /// Reseed both counters from the backend.
    ///
    /// If either fetch fails the previous values stay in place. Returns
    /// whether the snapshot was applied.
    pub async fn refresh(&self, source: &dyn SnapshotSource) -> bool {
        let (orders, calls) = tokio::join!(source.pending_orders(), source.new_call_requests());
        match (orders, calls) {
            (Ok(pending_orders), Ok(new_call_requests)) => {
                self.set(Counters {
                    pending_orders,
                    new_call_requests,
                });
                true
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::debug!("Counter snapshot failed, keeping previous values: {}", e);
                false
            }
        }
    }
}

impl Default for CounterStore {
    fn default() -> Self {
        Self::new()
    }
}
