//! Live notification stream.
//!
//! This module provides:
//! - A single push subscription with linear backoff reconnect
//! - Credential refresh after repeated failures
//! - Direct writes to the global counters (views read counters, not events)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   StreamManager                     │
//! │   (start / stop, owns at most one driver task)      │
//! └─────────────────────────────────────────────────────┘
//!          │                │                 │
//!          ▼                ▼                 ▼
//!   ┌─────────────┐ ┌───────────────┐ ┌──────────────────┐
//!   │StreamMachine│ │ PushTransport │ │CredentialProvider│
//!   │ (no I/O)    │ │ (WebSocket)   │ │ (refresh)        │
//!   └─────────────┘ └───────────────┘ └──────────────────┘
//!                           │
//!                           ▼
//!                 ┌───────────────────┐
//!                 │ EventSink         │
//!                 │ (Notifier)        │
//!                 └───────────────────┘
//!                    │             │
//!                    ▼             ▼
//!            ┌─────────────┐ ┌────────────┐
//!            │ Alerts      │ │ COUNTERS   │
//!            │ sound, toast│ │            │
//!            └─────────────┘ └────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let sink = Arc::new(Notifier::new(alerts, COUNTERS.clone()));
//! let stream = StreamManager::websocket(config, credentials, sink);
//!
//! stream.start();
//! // ... on logout or teardown
//! stream.stop();
//! ```

mod cancel;
mod dispatch;
mod manager;
mod state;
mod transport;

pub use dispatch::{EventSink, Notifier};
pub use manager::StreamManager;
pub use state::{BackoffPolicy, ConnectionState, ConnectionStatus, Input, Step, StreamMachine};
pub use transport::{FrameStream, PushTransport, TransportError, WsTransport};
