//! Request extractors.

pub mod bearer;
