//! Contracts with the match persistence service

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::game::state::PlayerSlot;
use crate::game::{MatchId, UserId};

use super::StoreError;

/// Match metadata as persisted by the game service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub id: MatchId,
    pub player_a_id: UserId,
    pub player_b_id: UserId,
    #[serde(default)]
    pub finished: bool,
    /// Free-form state string kept by the game service
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl MatchInfo {
    /// Which side `user_id` plays, if they are in this match
    pub fn slot_of(&self, user_id: UserId) -> Option<PlayerSlot> {
        if user_id == self.player_a_id {
            Some(PlayerSlot::A)
        } else if user_id == self.player_b_id {
            Some(PlayerSlot::B)
        } else {
            None
        }
    }

    pub fn user_in(&self, slot: PlayerSlot) -> UserId {
        match slot {
            PlayerSlot::A => self.player_a_id,
            PlayerSlot::B => self.player_b_id,
        }
    }
}

/// Final result reported when a match is won
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub match_id: MatchId,
    pub score_a: u32,
    pub score_b: u32,
    pub winner: Option<PlayerSlot>,
    pub winner_user_id: Option<UserId>,
}

/// Connection-level state changes pushed to the game service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    PlayerConnected(PlayerSlot),
    PlayerDisconnected(PlayerSlot),
    /// Match ended without a winner
    Abandoned,
}

impl ConnectionState {
    pub fn as_state_string(&self) -> String {
        match self {
            ConnectionState::PlayerConnected(slot) => format!("{slot}_connected"),
            ConnectionState::PlayerDisconnected(slot) => format!("{slot}_disconnected"),
            ConnectionState::Abandoned => "abandoned".to_string(),
        }
    }
}

/// Lookup of persisted matches
pub trait MatchDirectory: Send + Sync {
    fn find_ongoing_match(&self, user_id: UserId) -> BoxFuture<'_, Result<MatchInfo, StoreError>>;

    fn find_match_by_id(&self, match_id: MatchId) -> BoxFuture<'_, Result<MatchInfo, StoreError>>;
}

/// Fire-and-forget lifecycle notifications.
///
/// Called from inside a session tick, so implementations must return
/// immediately and handle their own failures.
pub trait LifecycleReporter: Send + Sync {
    fn match_started(&self, match_id: MatchId);

    fn match_finished(&self, result: &MatchResult);

    fn connection_state(&self, match_id: MatchId, state: ConnectionState);
}
