//! Registry of live sessions, one per match id

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::store::{LifecycleReporter, MatchInfo};
use crate::util::time::tick_interval;

use super::session::{Session, SessionConfig, TickOutcome};
use super::MatchId;

/// Process-wide map of match id to session.
///
/// Creation is atomic per match id: concurrent handshakes for the same
/// match always observe the same session instance.
pub struct SessionRegistry {
    sessions: DashMap<MatchId, Arc<Session>>,
    config: SessionConfig,
    reporter: Arc<dyn LifecycleReporter>,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig, reporter: Arc<dyn LifecycleReporter>) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
            reporter,
        }
    }

    /// Return the session for `info.id`, creating it and starting its tick
    /// driver if it does not exist yet. Must be called inside a tokio runtime.
    pub fn get_or_create(self: &Arc<Self>, info: &MatchInfo) -> Arc<Session> {
        let session = match self.sessions.entry(info.id) {
            Entry::Occupied(entry) => return entry.get().clone(),
            Entry::Vacant(entry) => {
                let session = Arc::new(Session::new(
                    info.clone(),
                    self.config.clone(),
                    self.reporter.clone(),
                ));
                entry.insert(session.clone());
                session
            }
        };

        info!(
            match_id = info.id,
            player_a = info.player_a_id,
            player_b = info.player_b_id,
            "Session created"
        );

        tokio::spawn(drive(
            Arc::downgrade(self),
            session.clone(),
            tick_interval(self.config.tick_rate_hz),
        ));
        session
    }

    pub fn get(&self, match_id: MatchId) -> Option<Arc<Session>> {
        self.sessions.get(&match_id).map(|entry| entry.value().clone())
    }

    /// Delete a session and close it; its driver stops on the next tick
    pub fn remove(&self, match_id: MatchId) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(&match_id)?;
        session.close();
        info!(match_id, "Session removed");
        Some(session)
    }

    pub fn for_each(&self, mut f: impl FnMut(&Arc<Session>)) {
        for entry in self.sessions.iter() {
            f(entry.value());
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn live_players(&self) -> usize {
        let mut total = 0;
        self.for_each(|session| total += session.live_players());
        total
    }

    /// Tick one session and unregister it once it has finished
    pub fn tick_session(&self, session: &Arc<Session>) -> TickOutcome {
        let outcome = session.tick();
        if outcome == TickOutcome::Finished {
            // Only drop the entry if it still points at this instance
            let removed = self
                .sessions
                .remove_if(&session.id(), |_, current| Arc::ptr_eq(current, session))
                .is_some();
            if removed {
                debug!(match_id = session.id(), "Finished session unregistered");
            }
        }
        outcome
    }
}

/// Per-session tick driver
async fn drive(registry: Weak<SessionRegistry>, session: Arc<Session>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(registry) = registry.upgrade() else {
            session.close();
            break;
        };
        if registry.tick_session(&session) == TickOutcome::Finished {
            break;
        }
    }

    info!(match_id = session.id(), "Tick driver stopped");
}
