//! HTTP surface consumed by the presentation layer.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;
