//! Client side of the clinical platform: credential lifecycle and
//! authenticated API calls.

pub mod client;
pub mod token;

pub use client::PlatformClient;
pub use token::TokenManager;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// Token acquisition exhausted: refresh failed and the fallback login
    /// failed too. Fatal for the request.
    #[error("Platform authentication failed: {0}")]
    Auth(String),

    /// The platform answered with a non-success status.
    #[error("Platform API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    /// Network-level failure reaching the platform (includes timeouts).
    #[error("Platform unreachable: {0}")]
    Transport(String),

    /// The platform returned a body we could not decode.
    #[error("Platform returned an undecodable response: {0}")]
    Decode(String),
}

/// Truncate an upstream body for error messages and logs.
pub(crate) fn truncate_detail(body: &str, max: usize) -> String {
    if body.len() <= max {
        body.to_string()
    } else {
        let mut end = max;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}
