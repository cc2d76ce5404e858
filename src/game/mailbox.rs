//! Bounded per-slot mailboxes between a connection and its session's tick.
//!
//! Producers never block: a full queue drops the event and logs. The tick
//! drains at most one event per queue per slot, so bursty input can never
//! stall the shared simulation.

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::warn;

use super::state::PlayerSlot;
use super::{KeyInput, MatchId};

/// Connect/disconnect are single-shot signals
const SIGNAL_CAPACITY: usize = 1;

/// Producer side, owned by the player's connection task
#[derive(Debug)]
pub struct PlayerLink {
    match_id: MatchId,
    slot: PlayerSlot,
    input_tx: mpsc::Sender<KeyInput>,
    connect_tx: mpsc::Sender<()>,
    disconnect_tx: mpsc::Sender<()>,
}

/// Consumer side, owned by the session and drained inside its tick
#[derive(Debug)]
pub struct PlayerMailbox {
    input_rx: mpsc::Receiver<KeyInput>,
    connect_rx: mpsc::Receiver<()>,
    disconnect_rx: mpsc::Receiver<()>,
}

/// Events drained from one slot during one tick
#[derive(Debug, Default, PartialEq)]
pub struct SlotEvents {
    pub connected: bool,
    pub input: Option<KeyInput>,
    pub disconnected: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MailboxError {
    #[error("mailbox queue full, event dropped")]
    QueueFull,

    #[error("session no longer reads this mailbox")]
    Closed,
}

impl<T> From<TrySendError<T>> for MailboxError {
    fn from(err: TrySendError<T>) -> Self {
        match err {
            TrySendError::Full(_) => MailboxError::QueueFull,
            TrySendError::Closed(_) => MailboxError::Closed,
        }
    }
}

/// Create a linked producer/consumer pair for one player slot
pub fn channel(match_id: MatchId, slot: PlayerSlot, input_capacity: usize) -> (PlayerLink, PlayerMailbox) {
    let (input_tx, input_rx) = mpsc::channel(input_capacity.max(1));
    let (connect_tx, connect_rx) = mpsc::channel(SIGNAL_CAPACITY);
    let (disconnect_tx, disconnect_rx) = mpsc::channel(SIGNAL_CAPACITY);

    (
        PlayerLink {
            match_id,
            slot,
            input_tx,
            connect_tx,
            disconnect_tx,
        },
        PlayerMailbox {
            input_rx,
            connect_rx,
            disconnect_rx,
        },
    )
}

impl PlayerLink {
    /// Announce that the transport is up
    pub fn connect(&self) -> Result<(), MailboxError> {
        self.signal(&self.connect_tx, "connect")
    }

    /// Announce that the transport is gone (closed, errored or replaced)
    pub fn disconnect(&self) -> Result<(), MailboxError> {
        self.signal(&self.disconnect_tx, "disconnect")
    }

    /// Queue a key transition for the next tick; dropped if the queue is full
    pub fn push_input(&self, input: KeyInput) -> Result<(), MailboxError> {
        self.input_tx.try_send(input).map_err(|err| {
            let err = MailboxError::from(err);
            if err == MailboxError::QueueFull {
                warn!(
                    match_id = self.match_id,
                    slot = %self.slot,
                    "Input queue full, dropping key state"
                );
            }
            err
        })
    }

    fn signal(&self, tx: &mpsc::Sender<()>, what: &'static str) -> Result<(), MailboxError> {
        tx.try_send(()).map_err(|err| {
            let err = MailboxError::from(err);
            if err == MailboxError::QueueFull {
                // An identical signal is already pending
                warn!(match_id = self.match_id, slot = %self.slot, signal = what, "Duplicate signal dropped");
            }
            err
        })
    }
}

impl PlayerMailbox {
    /// Take at most one event from each queue without blocking.
    ///
    /// A mailbox whose link was dropped without an explicit disconnect
    /// reports `disconnected` as well.
    pub fn drain(&mut self) -> SlotEvents {
        SlotEvents {
            connected: self.connect_rx.try_recv().is_ok(),
            input: self.input_rx.try_recv().ok(),
            disconnected: match self.disconnect_rx.try_recv() {
                Ok(()) => true,
                Err(TryRecvError::Disconnected) => true,
                Err(TryRecvError::Empty) => false,
            },
        }
    }
}
