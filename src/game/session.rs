//! Match session: phase state machine and the authoritative tick.
//!
//! All mutation of a match happens inside `Session::tick`, under the
//! session lock. Connections never touch the state directly; they feed
//! the per-slot mailboxes and read their outbound queue.

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::Config;
use crate::store::{ConnectionState, LifecycleReporter, MatchInfo, MatchResult};
use crate::util::time::{ticks_for, DEFAULT_TICK_RATE_HZ};
use crate::ws::protocol::ServerMsg;

use super::mailbox::{self, PlayerLink, PlayerMailbox, SlotEvents};
use super::outbox::{self, Recipients};
use super::physics;
use super::snapshot;
use super::state::{MatchPhase, PlayerSlot, SimulationState};
use super::MatchId;

/// Per-session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick_rate_hz: u32,
    pub input_queue_capacity: usize,
    pub outbound_queue_capacity: usize,
    /// Ticks a `Pending` session may spend with nobody connected
    pub pending_timeout_ticks: u64,
}

impl SessionConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_rate_hz: config.tick_rate_hz,
            input_queue_capacity: config.input_queue_capacity,
            outbound_queue_capacity: config.outbound_queue_capacity,
            pending_timeout_ticks: ticks_for(config.pending_timeout, config.tick_rate_hz),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            input_queue_capacity: 32,
            outbound_queue_capacity: 64,
            pending_timeout_ticks: 120 * DEFAULT_TICK_RATE_HZ as u64,
        }
    }
}

/// Whether the tick driver should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Finished,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("match {0} has already finished")]
    Closed(MatchId),
}

/// Handed to a connection when it takes over a player slot
#[derive(Debug)]
pub struct Attachment {
    pub link: PlayerLink,
    pub outbound: mpsc::Receiver<ServerMsg>,
}

/// One live match
pub struct Session {
    info: MatchInfo,
    config: SessionConfig,
    reporter: Arc<dyn LifecycleReporter>,
    inner: Mutex<SessionInner>,
}

struct SessionInner {
    phase: MatchPhase,
    tick: u64,
    idle_ticks: u64,
    sim: SimulationState,
    rng: ChaCha8Rng,
    mailboxes: [Option<PlayerMailbox>; 2],
    live: [bool; 2],
    recipients: Recipients,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("match_id", &self.id())
            .field("phase", &self.phase())
            .finish()
    }
}

impl SessionInner {
    fn live_count(&self) -> usize {
        self.live.iter().filter(|live| **live).count()
    }
}

impl Session {
    pub fn new(info: MatchInfo, config: SessionConfig, reporter: Arc<dyn LifecycleReporter>) -> Self {
        let inner = SessionInner {
            phase: MatchPhase::Pending,
            tick: 0,
            idle_ticks: 0,
            sim: SimulationState::default(),
            rng: ChaCha8Rng::seed_from_u64(rand::random()),
            mailboxes: [None, None],
            live: [false, false],
            recipients: Recipients::new(info.id),
        };

        Self {
            info,
            config,
            reporter,
            inner: Mutex::new(inner),
        }
    }

    pub fn id(&self) -> MatchId {
        self.info.id
    }

    pub fn phase(&self) -> MatchPhase {
        self.inner.lock().phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase() == MatchPhase::Finished
    }

    pub fn live_players(&self) -> usize {
        self.inner.lock().live_count()
    }

    /// Copy of the current simulation state
    #[cfg(test)]
    pub(crate) fn state(&self) -> SimulationState {
        self.inner.lock().sim.clone()
    }

    /// Take over a player slot with fresh queues.
    ///
    /// A previous connection on the same slot loses its queues: its writer
    /// sees the outbound channel close. The slot only counts as live once
    /// the new link's connect event has been drained by a tick.
    pub fn attach(&self, slot: PlayerSlot) -> Result<Attachment, SessionError> {
        let mut inner = self.inner.lock();
        if inner.phase == MatchPhase::Finished {
            return Err(SessionError::Closed(self.id()));
        }

        let (link, mailbox) = mailbox::channel(self.id(), slot, self.config.input_queue_capacity);
        let (outbox, outbound) = outbox::channel(slot, self.config.outbound_queue_capacity);

        let replaced = inner.mailboxes[slot.index()].replace(mailbox).is_some();
        inner.recipients.insert(outbox);
        inner.live[slot.index()] = false;

        info!(match_id = self.id(), slot = %slot, replaced, "Player slot attached");
        Ok(Attachment { link, outbound })
    }

    /// End the session without a winner. No-op once finished.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.phase != MatchPhase::Finished {
            self.abandon(&mut inner, "closed");
        }
    }

    /// Run one tick: drain mailboxes, apply input, step physics, broadcast.
    pub fn tick(&self) -> TickOutcome {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if inner.phase == MatchPhase::Finished {
            return TickOutcome::Finished;
        }
        inner.tick += 1;

        let events: [SlotEvents; 2] = PlayerSlot::ALL.map(|slot| {
            inner.mailboxes[slot.index()]
                .as_mut()
                .map(PlayerMailbox::drain)
                .unwrap_or_default()
        });

        for slot in PlayerSlot::ALL {
            if events[slot.index()].connected {
                self.on_connect(inner, slot);
            }
        }

        // Input only counts while the match runs; outside it state is frozen
        if inner.phase == MatchPhase::InProgress {
            for slot in PlayerSlot::ALL {
                if let Some(input) = &events[slot.index()].input {
                    inner.sim.apply_key(slot, &input.key, input.pressed);
                }
            }
        }

        for slot in PlayerSlot::ALL {
            if events[slot.index()].disconnected {
                self.on_disconnect(inner, slot);
            }
        }

        match inner.phase {
            MatchPhase::InProgress => {}
            MatchPhase::Pending => return self.check_pending_timeout(inner),
            MatchPhase::Paused => return TickOutcome::Continue,
            MatchPhase::Finished => return TickOutcome::Finished,
        }

        let step = physics::step(&mut inner.sim, &mut inner.rng);
        if let Some(scorer) = step.scored {
            debug!(
                match_id = self.id(),
                tick = inner.tick,
                scorer = %scorer,
                score_a = inner.sim.score.player_a,
                score_b = inner.sim.score.player_b,
                "Point scored"
            );
        }

        inner.recipients.broadcast(&snapshot::build(&inner.sim));

        match step.winner {
            Some(winner) => {
                self.finish(inner, winner);
                TickOutcome::Finished
            }
            None => TickOutcome::Continue,
        }
    }

    fn on_connect(&self, inner: &mut SessionInner, slot: PlayerSlot) {
        inner.live[slot.index()] = true;
        inner.idle_ticks = 0;
        self.reporter
            .connection_state(self.id(), ConnectionState::PlayerConnected(slot));
        info!(
            match_id = self.id(),
            slot = %slot,
            live_players = inner.live_count(),
            "Player connected"
        );

        match inner.phase {
            MatchPhase::Pending if inner.live_count() == 2 => self.start(inner),
            // Replacement connection mid-match still needs to learn its side
            MatchPhase::InProgress => {
                inner
                    .recipients
                    .send_to(slot, ServerMsg::MatchStarted { player: slot });
            }
            _ => {}
        }
    }

    fn start(&self, inner: &mut SessionInner) {
        inner.phase = MatchPhase::InProgress;
        self.reporter.match_started(self.id());

        for slot in PlayerSlot::ALL {
            inner
                .recipients
                .send_to(slot, ServerMsg::MatchStarted { player: slot });
        }

        info!(match_id = self.id(), tick = inner.tick, "Match started");
    }

    fn on_disconnect(&self, inner: &mut SessionInner, slot: PlayerSlot) {
        inner.mailboxes[slot.index()] = None;
        inner.recipients.remove(slot);
        inner.live[slot.index()] = false;
        self.reporter
            .connection_state(self.id(), ConnectionState::PlayerDisconnected(slot));
        info!(match_id = self.id(), slot = %slot, "Player disconnected");

        if inner.phase != MatchPhase::Finished && inner.live_count() < 2 {
            self.abandon(inner, "player left");
        }
    }

    fn check_pending_timeout(&self, inner: &mut SessionInner) -> TickOutcome {
        if inner.live_count() > 0 {
            inner.idle_ticks = 0;
            return TickOutcome::Continue;
        }

        inner.idle_ticks += 1;
        if inner.idle_ticks >= self.config.pending_timeout_ticks {
            self.abandon(inner, "nobody joined");
            return TickOutcome::Finished;
        }
        TickOutcome::Continue
    }

    fn finish(&self, inner: &mut SessionInner, winner: PlayerSlot) {
        inner.phase = MatchPhase::Finished;
        inner.recipients.broadcast(&ServerMsg::GameOver {
            winner: winner.number(),
        });

        let score = inner.sim.score;
        self.reporter.match_finished(&MatchResult {
            match_id: self.id(),
            score_a: score.player_a,
            score_b: score.player_b,
            winner: Some(winner),
            winner_user_id: Some(self.info.user_in(winner)),
        });

        self.release(inner);
        info!(
            match_id = self.id(),
            tick = inner.tick,
            winner = %winner,
            score_a = score.player_a,
            score_b = score.player_b,
            "Match finished"
        );
    }

    fn abandon(&self, inner: &mut SessionInner, reason: &'static str) {
        inner.phase = MatchPhase::Finished;
        self.reporter
            .connection_state(self.id(), ConnectionState::Abandoned);
        self.release(inner);
        info!(match_id = self.id(), tick = inner.tick, reason, "Match abandoned");
    }

    /// Close every queue; writers flush what is already enqueued
    fn release(&self, inner: &mut SessionInner) {
        inner.recipients.close_all();
        inner.mailboxes = [None, None];
        inner.live = [false, false];
    }

    #[cfg(test)]
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut SimulationState) -> R) -> R {
        f(&mut self.inner.lock().sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Score, Vec3, Velocity};
    use crate::game::KeyInput;
    use crate::test_support::{match_info, LifecycleEvent, RecordingReporter};
    use tokio::sync::mpsc::error::TryRecvError;

    fn session_with(config: SessionConfig) -> (Session, Arc<RecordingReporter>) {
        let reporter = Arc::new(RecordingReporter::default());
        let session = Session::new(match_info(7, 100, 200), config, reporter.clone());
        (session, reporter)
    }

    fn session() -> (Session, Arc<RecordingReporter>) {
        session_with(SessionConfig::default())
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn started(session: &Session) -> (Attachment, Attachment) {
        let a = session.attach(PlayerSlot::A).unwrap();
        let b = session.attach(PlayerSlot::B).unwrap();
        a.link.connect().unwrap();
        b.link.connect().unwrap();
        assert_eq!(session.tick(), TickOutcome::Continue);
        (a, b)
    }

    #[test]
    fn test_both_connect_starts_match() {
        let (session, reporter) = session();
        let (mut a, mut b) = started(&session);

        assert_eq!(session.phase(), MatchPhase::InProgress);
        assert_eq!(session.live_players(), 2);
        assert_eq!(
            drain(&mut a.outbound).first(),
            Some(&ServerMsg::MatchStarted {
                player: PlayerSlot::A
            })
        );
        assert_eq!(
            drain(&mut b.outbound).first(),
            Some(&ServerMsg::MatchStarted {
                player: PlayerSlot::B
            })
        );
        assert_eq!(reporter.count(|e| matches!(e, LifecycleEvent::Started(7))), 1);
    }

    #[test]
    fn test_one_player_keeps_pending_and_frozen() {
        let (session, reporter) = session();
        let a = session.attach(PlayerSlot::A).unwrap();
        a.link.connect().unwrap();
        a.link
            .push_input(KeyInput {
                key: "ArrowLeft".to_string(),
                pressed: true,
            })
            .unwrap();

        let before = session.state();
        for _ in 0..10 {
            assert_eq!(session.tick(), TickOutcome::Continue);
        }

        assert_eq!(session.phase(), MatchPhase::Pending);
        assert_eq!(session.state(), before);
        assert_eq!(reporter.count(|e| matches!(e, LifecycleEvent::Started(_))), 0);
    }

    #[test]
    fn test_connect_recognised_on_next_tick_only() {
        let (session, _) = session();
        let a = session.attach(PlayerSlot::A).unwrap();
        let b = session.attach(PlayerSlot::B).unwrap();
        a.link.connect().unwrap();
        assert_eq!(session.live_players(), 0);

        session.tick();
        assert_eq!(session.phase(), MatchPhase::Pending);

        b.link.connect().unwrap();
        session.tick();
        assert_eq!(session.phase(), MatchPhase::InProgress);
    }

    #[test]
    fn test_input_moves_own_paddle() {
        let (session, _) = session();
        let (a, _b) = started(&session);

        a.link
            .push_input(KeyInput {
                key: "ArrowRight".to_string(),
                pressed: true,
            })
            .unwrap();
        session.tick();

        let state = session.state();
        assert!((state.paddle_a.x - physics::PADDLE_SPEED).abs() < 1e-6);
        assert_eq!(state.paddle_b.x, 0.0);
    }

    #[test]
    fn test_snapshot_broadcast_each_tick() {
        let (session, _) = session();
        let (mut a, mut b) = started(&session);
        drain(&mut a.outbound);
        drain(&mut b.outbound);

        session.tick();
        session.tick();

        for rx in [&mut a.outbound, &mut b.outbound] {
            let msgs = drain(rx);
            assert_eq!(msgs.len(), 2);
            assert!(msgs
                .iter()
                .all(|m| matches!(m, ServerMsg::UpdateState { .. })));
        }
    }

    #[test]
    fn test_win_ends_match_once() {
        let (session, reporter) = session();
        let (mut a, mut b) = started(&session);
        drain(&mut a.outbound);
        drain(&mut b.outbound);

        session.with_state(|sim| {
            sim.score = Score {
                player_a: 9,
                player_b: 3,
            };
            sim.paddle_b.x = -4.0;
            sim.ball = Vec3::new(2.0, 0.5, 9.95);
            sim.ball_velocity = Velocity { x: 0.0, z: 0.15 };
        });

        assert_eq!(session.tick(), TickOutcome::Finished);
        assert_eq!(session.phase(), MatchPhase::Finished);

        let msgs = drain(&mut a.outbound);
        assert!(matches!(msgs[0], ServerMsg::UpdateState { points: Score { player_a: 10, player_b: 3 }, .. }));
        assert_eq!(msgs[1], ServerMsg::GameOver { winner: 1 });
        assert_eq!(msgs.len(), 2);
        assert_eq!(drain(&mut b.outbound).last(), Some(&ServerMsg::GameOver { winner: 1 }));

        // Queues closed after the final messages
        assert_eq!(a.outbound.try_recv(), Err(TryRecvError::Disconnected));

        let finished: Vec<_> = reporter
            .events()
            .into_iter()
            .filter_map(|e| match e {
                LifecycleEvent::Finished(result) => Some(result),
                _ => None,
            })
            .collect();
        assert_eq!(
            finished,
            vec![MatchResult {
                match_id: 7,
                score_a: 10,
                score_b: 3,
                winner: Some(PlayerSlot::A),
                winner_user_id: Some(100),
            }]
        );

        // Further ticks are no-ops
        let frozen = session.state();
        assert_eq!(session.tick(), TickOutcome::Finished);
        assert_eq!(session.state(), frozen);
    }

    #[test]
    fn test_disconnect_abandons_without_winner() {
        let (session, reporter) = session();
        let (a, mut b) = started(&session);
        drain(&mut b.outbound);

        a.link.disconnect().unwrap();
        assert_eq!(session.tick(), TickOutcome::Finished);
        assert_eq!(session.phase(), MatchPhase::Finished);

        let msgs = drain(&mut b.outbound);
        assert!(!msgs.iter().any(|m| matches!(m, ServerMsg::GameOver { .. })));
        assert_eq!(b.outbound.try_recv(), Err(TryRecvError::Disconnected));

        assert_eq!(reporter.count(|e| matches!(e, LifecycleEvent::Finished(_))), 0);
        assert_eq!(
            reporter.count(|e| matches!(e, LifecycleEvent::Connection(7, ConnectionState::Abandoned))),
            1
        );
    }

    #[test]
    fn test_dropped_link_counts_as_disconnect() {
        let (session, _) = session();
        let (a, _b) = started(&session);
        drop(a);

        assert_eq!(session.tick(), TickOutcome::Finished);
    }

    #[test]
    fn test_attach_after_finish_is_rejected() {
        let (session, _) = session();
        session.close();
        assert!(matches!(
            session.attach(PlayerSlot::A),
            Err(SessionError::Closed(7))
        ));
    }

    #[test]
    fn test_replacement_connection_learns_side() {
        let (session, _) = session();
        let (mut first, _b) = started(&session);
        drain(&mut first.outbound);

        let mut second = session.attach(PlayerSlot::A).unwrap();
        assert_eq!(first.outbound.try_recv(), Err(TryRecvError::Disconnected));

        second.link.connect().unwrap();
        session.tick();

        assert_eq!(session.phase(), MatchPhase::InProgress);
        assert_eq!(
            drain(&mut second.outbound).first(),
            Some(&ServerMsg::MatchStarted {
                player: PlayerSlot::A
            })
        );
    }

    #[test]
    fn test_idle_pending_session_times_out() {
        let (session, reporter) = session_with(SessionConfig {
            pending_timeout_ticks: 3,
            ..SessionConfig::default()
        });

        assert_eq!(session.tick(), TickOutcome::Continue);
        assert_eq!(session.tick(), TickOutcome::Continue);
        assert_eq!(session.tick(), TickOutcome::Finished);
        assert!(session.is_finished());
        assert_eq!(
            reporter.count(|e| matches!(e, LifecycleEvent::Connection(_, ConnectionState::Abandoned))),
            1
        );
    }
}
