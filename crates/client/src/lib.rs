//! Storedesk notification client.
//!
//! Keeps a back-office operator informed of new orders and call requests:
//! a live push subscription that survives outages and credential expiry,
//! an audible cue plus toast per event, and badge counters shared across
//! the whole process.

pub mod alerts;
pub mod api_client;
pub mod config;
pub mod credentials;
pub mod logging;
pub mod storage;
pub mod stores;
pub mod stream;

#[cfg(feature = "ui")]
pub mod ui;

pub use alerts::{AlertPresenter, Alerts, AudioCue, TerminalBell, ToastQueue};
pub use api_client::ApiClient;
pub use config::ClientConfig;
pub use credentials::{CredentialProvider, StoredCredentials};
pub use storage::Storage;
pub use stores::{CounterStore, Counters, COUNTERS};
pub use stream::{ConnectionState, ConnectionStatus, Notifier, StreamManager};
