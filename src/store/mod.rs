//! External collaborators: match lookup and lifecycle reporting

pub mod client;
pub mod games;

pub use client::GameServiceClient;
pub use games::{ConnectionState, LifecycleReporter, MatchDirectory, MatchInfo, MatchResult};

/// Game service errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(#[source] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}
