//! Game simulation modules

pub mod mailbox;
pub mod outbox;
pub mod physics;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod state;

pub use registry::SessionRegistry;
pub use session::{Attachment, Session, SessionConfig, SessionError};

/// Match identifier as assigned by the game service
pub type MatchId = i64;
/// User identifier as issued by the auth service
pub type UserId = i64;

/// A single key transition received from a player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub key: String,
    pub pressed: bool,
}
