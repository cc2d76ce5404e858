//! In-memory collaborators for unit tests

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;

use crate::app::AppState;
use crate::config::Config;
use crate::game::{MatchId, UserId};
use crate::http::middleware::{AuthError, IdentityResolver};
use crate::store::{ConnectionState, LifecycleReporter, MatchDirectory, MatchInfo, MatchResult, StoreError};

pub fn match_info(id: MatchId, player_a_id: UserId, player_b_id: UserId) -> MatchInfo {
    MatchInfo {
        id,
        player_a_id,
        player_b_id,
        finished: false,
        state: None,
        created_at: None,
    }
}

pub fn finished(mut info: MatchInfo) -> MatchInfo {
    info.finished = true;
    info
}

/// App state over the static doubles; credentials are `user-<id>`
pub fn test_state(matches: Vec<MatchInfo>) -> AppState {
    AppState::with_parts(
        Config::for_tests(),
        Arc::new(StaticIdentity),
        Arc::new(StaticMatches::new(matches)),
        Arc::new(RecordingReporter::default()),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Started(MatchId),
    Finished(MatchResult),
    Connection(MatchId, ConnectionState),
}

#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&LifecycleEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl LifecycleReporter for RecordingReporter {
    fn match_started(&self, match_id: MatchId) {
        self.events.lock().push(LifecycleEvent::Started(match_id));
    }

    fn match_finished(&self, result: &MatchResult) {
        self.events.lock().push(LifecycleEvent::Finished(result.clone()));
    }

    fn connection_state(&self, match_id: MatchId, state: ConnectionState) {
        self.events
            .lock()
            .push(LifecycleEvent::Connection(match_id, state));
    }
}

pub struct StaticMatches {
    matches: HashMap<MatchId, MatchInfo>,
}

impl StaticMatches {
    pub fn new(matches: Vec<MatchInfo>) -> Self {
        Self {
            matches: matches.into_iter().map(|m| (m.id, m)).collect(),
        }
    }
}

impl MatchDirectory for StaticMatches {
    fn find_ongoing_match(&self, user_id: UserId) -> BoxFuture<'_, Result<MatchInfo, StoreError>> {
        let found = self
            .matches
            .values()
            .find(|m| !m.finished && m.slot_of(user_id).is_some())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("ongoing match for user {user_id}")));
        future::ready(found).boxed()
    }

    fn find_match_by_id(&self, match_id: MatchId) -> BoxFuture<'_, Result<MatchInfo, StoreError>> {
        let found = self
            .matches
            .get(&match_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("games/{match_id}")));
        future::ready(found).boxed()
    }
}

/// Accepts `user-<id>` as the credential for user `<id>`
pub struct StaticIdentity;

impl IdentityResolver for StaticIdentity {
    fn resolve_user_id(&self, credential: &str) -> Result<UserId, AuthError> {
        credential
            .strip_prefix("user-")
            .and_then(|id| id.parse().ok())
            .ok_or(AuthError::InvalidToken)
    }
}
