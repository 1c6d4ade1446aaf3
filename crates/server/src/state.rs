//! Application state shared across request handlers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use storedesk_shared::{CredentialPair, Event, EventKind};
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::ServerConfig;

const EVENT_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
struct AccessGrant {
    username: String,
    expires_at: Instant,
}

/// Issued credentials. Refresh tokens are single-use.
#[derive(Debug, Default)]
struct Sessions {
    access: HashMap<String, AccessGrant>,
    refresh: HashMap<String, String>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    sessions: Arc<RwLock<Sessions>>,
    events: broadcast::Sender<Event>,
    pending_orders: Arc<AtomicU64>,
    new_call_requests: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config: Arc::new(config),
            sessions: Arc::new(RwLock::new(Sessions::default())),
            events,
            pending_orders: Arc::new(AtomicU64::new(0)),
            new_call_requests: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Issue a fresh pair for `username`.
    pub async fn issue(&self, username: &str) -> CredentialPair {
        let pair = CredentialPair {
            access_token: Uuid::new_v4().simple().to_string(),
            refresh_token: Uuid::new_v4().simple().to_string(),
        };

        let mut sessions = self.sessions.write().await;
        sessions.access.insert(
            pair.access_token.clone(),
            AccessGrant {
                username: username.to_string(),
                expires_at: Instant::now() + self.config.access_ttl,
            },
        );
        sessions
            .refresh
            .insert(pair.refresh_token.clone(), username.to_string());
        pair
    }

    /// Username behind a live access credential.
    pub async fn verify_access(&self, access_token: &str) -> Option<String> {
        let sessions = self.sessions.read().await;
        let grant = sessions.access.get(access_token)?;
        (grant.expires_at > Instant::now()).then(|| grant.username.clone())
    }

    /// Trade a refresh credential for a new pair. The old refresh credential
    /// stops working; old access credentials run out on their own.
    pub async fn rotate(&self, refresh_token: &str) -> Option<CredentialPair> {
        let username = self.sessions.write().await.refresh.remove(refresh_token)?;
        Some(self.issue(&username).await)
    }

    /// Make every issued access credential expire now. Refresh credentials stay valid.
    pub async fn expire_access(&self) {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        for grant in sessions.access.values_mut() {
            grant.expires_at = now;
        }
    }

    /// Forget every issued credential.
    pub async fn revoke_all(&self) {
        let mut sessions = self.sessions.write().await;
        sessions.access.clear();
        sessions.refresh.clear();
    }

    /// Count the event and fan it out to every open stream. Returns the number
    /// of streams it was handed to.
    pub fn publish(&self, event: Event) -> usize {
        match event.kind() {
            EventKind::NewOrder => self.pending_orders.fetch_add(1, Ordering::Relaxed),
            EventKind::NewCallRequest => self.new_call_requests.fetch_add(1, Ordering::Relaxed),
        };
        self.events.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn pending_orders(&self) -> u64 {
        self.pending_orders.load(Ordering::Relaxed)
    }

    pub fn new_call_requests(&self) -> u64 {
        self.new_call_requests.load(Ordering::Relaxed)
    }

    pub fn access_ttl(&self) -> Duration {
        self.config.access_ttl
    }
}
