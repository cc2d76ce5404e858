//! Outbound fan-out from a session to its players.
//!
//! Delivery is a `try_send` onto a bounded per-player queue; a full queue
//! drops the message so a slow client can never hold up the tick.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::ws::protocol::ServerMsg;

use super::state::PlayerSlot;
use super::MatchId;

/// Sending half of one player's outbound queue
#[derive(Debug)]
pub struct Outbox {
    slot: PlayerSlot,
    tx: mpsc::Sender<ServerMsg>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("outbound queue full")]
    QueueFull,

    #[error("connection writer is gone")]
    Closed,
}

/// Create an outbox and the receiver drained by the connection writer
pub fn channel(slot: PlayerSlot, capacity: usize) -> (Outbox, mpsc::Receiver<ServerMsg>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Outbox { slot, tx }, rx)
}

impl Outbox {
    pub fn slot(&self) -> PlayerSlot {
        self.slot
    }

    pub fn send(&self, msg: ServerMsg) -> Result<(), DeliveryError> {
        self.tx.try_send(msg).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::QueueFull,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// The set of players a session currently delivers to
#[derive(Debug)]
pub struct Recipients {
    match_id: MatchId,
    outboxes: [Option<Outbox>; 2],
}

impl Recipients {
    pub fn new(match_id: MatchId) -> Self {
        Self {
            match_id,
            outboxes: [None, None],
        }
    }

    /// Install a player's outbox, replacing (and closing) any previous one
    pub fn insert(&mut self, outbox: Outbox) -> Option<Outbox> {
        let index = outbox.slot().index();
        self.outboxes[index].replace(outbox)
    }

    pub fn remove(&mut self, slot: PlayerSlot) -> Option<Outbox> {
        self.outboxes[slot.index()].take()
    }

    /// Send to one player. Returns whether the message was enqueued.
    pub fn send_to(&self, slot: PlayerSlot, msg: ServerMsg) -> bool {
        match &self.outboxes[slot.index()] {
            Some(outbox) => self.deliver(outbox, msg),
            None => {
                debug!(match_id = self.match_id, slot = %slot, "No outbox for slot, message skipped");
                false
            }
        }
    }

    /// Send the same message to every attached player. Returns the number
    /// of players it was enqueued for.
    pub fn broadcast(&self, msg: &ServerMsg) -> usize {
        self.outboxes
            .iter()
            .flatten()
            .filter(|outbox| self.deliver(outbox, msg.clone()))
            .count()
    }

    /// Drop every outbox. Writers flush what is already queued, then see
    /// the channel close.
    pub fn close_all(&mut self) {
        self.outboxes = [None, None];
    }

    fn deliver(&self, outbox: &Outbox, msg: ServerMsg) -> bool {
        match outbox.send(msg) {
            Ok(()) => true,
            Err(DeliveryError::QueueFull) => {
                warn!(
                    match_id = self.match_id,
                    slot = %outbox.slot(),
                    "Outbound queue full, dropping message"
                );
                false
            }
            Err(DeliveryError::Closed) => {
                debug!(match_id = self.match_id, slot = %outbox.slot(), "Outbound queue closed");
                false
            }
        }
    }
}
