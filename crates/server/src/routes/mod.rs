//! API route handlers.

pub mod auth;
pub mod counts;
pub mod events;
