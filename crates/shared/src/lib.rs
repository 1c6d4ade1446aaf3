//! Shared types for the storedesk notification client and its development backend.

pub mod api;
pub mod auth;
pub mod error;
pub mod events;

pub use auth::*;
pub use error::*;
pub use events::*;
