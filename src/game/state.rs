//! Authoritative match state owned by a single session

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Court half-width; the ball and paddles live in `[-COURT_HALF_WIDTH, COURT_HALF_WIDTH]`
pub const COURT_HALF_WIDTH: f32 = 4.5;
/// Goal line z for player A's paddle (player B's is the mirror)
pub const PADDLE_LINE_Z: f32 = 9.0;
/// Cosmetic ball height
pub const BALL_Y: f32 = 0.5;
/// Initial per-tick ball speed along each axis
pub const INITIAL_BALL_SPEED: f32 = 0.15;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchPhase {
    /// Waiting for both players
    Pending,
    /// Simulation running
    InProgress,
    /// Reserved; no transition leads here yet
    Paused,
    /// Terminal
    Finished,
}

/// Side of the court a player controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerSlot {
    #[serde(rename = "player_a")]
    A,
    #[serde(rename = "player_b")]
    B,
}

impl PlayerSlot {
    pub const ALL: [PlayerSlot; 2] = [PlayerSlot::A, PlayerSlot::B];

    pub fn index(self) -> usize {
        match self {
            PlayerSlot::A => 0,
            PlayerSlot::B => 1,
        }
    }

    /// Wire number used in `gameOver` (1 = A, 2 = B)
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlayerSlot::A => "player_a",
            PlayerSlot::B => "player_b",
        }
    }
}

impl std::fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position on the court
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Per-tick ball displacement on the court plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f32,
    pub z: f32,
}

/// Points per side; never decrease during a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    #[serde(rename = "player1")]
    pub player_a: u32,
    #[serde(rename = "player2")]
    pub player_b: u32,
}

impl Score {
    pub fn get(&self, slot: PlayerSlot) -> u32 {
        match slot {
            PlayerSlot::A => self.player_a,
            PlayerSlot::B => self.player_b,
        }
    }

    pub fn increment(&mut self, slot: PlayerSlot) {
        match slot {
            PlayerSlot::A => self.player_a += 1,
            PlayerSlot::B => self.player_b += 1,
        }
    }
}

/// Horizontal intent derived from a player's held keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steer {
    Left,
    Right,
}

impl Steer {
    /// Map a browser key name to a direction. Either arrow keys or `a`/`d`
    /// steer, always the sender's own paddle.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" | "a" | "A" => Some(Steer::Left),
            "ArrowRight" | "d" | "D" => Some(Steer::Right),
            _ => None,
        }
    }
}

/// Last known key-down state of one player; absent keys are not held
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyState {
    keys: HashMap<String, bool>,
}

impl KeyState {
    /// Record a transition for a steering key; other keys are ignored
    pub fn set(&mut self, key: &str, pressed: bool) {
        if Steer::from_key(key).is_none() {
            return;
        }
        self.keys.insert(key.to_string(), pressed);
    }

    /// True if any key mapped to `steer` is held
    pub fn steering(&self, steer: Steer) -> bool {
        self.keys
            .iter()
            .any(|(key, &pressed)| pressed && Steer::from_key(key) == Some(steer))
    }
}

/// Full simulation state for one match
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub ball: Vec3,
    pub ball_velocity: Velocity,
    pub paddle_a: Vec3,
    pub paddle_b: Vec3,
    pub score: Score,
    /// Sign of the ball's z-velocity at the last bounce or reset
    pub direction: i8,
    /// Indexed by `PlayerSlot::index`
    pub pending_input: [KeyState; 2],
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            ball: Vec3::new(0.0, BALL_Y, 0.0),
            ball_velocity: Velocity {
                x: INITIAL_BALL_SPEED,
                z: INITIAL_BALL_SPEED,
            },
            paddle_a: Vec3::new(0.0, 0.0, -PADDLE_LINE_Z),
            paddle_b: Vec3::new(0.0, 0.0, PADDLE_LINE_Z),
            score: Score::default(),
            direction: 1,
            pending_input: Default::default(),
        }
    }
}

impl SimulationState {
    pub fn paddle(&self, slot: PlayerSlot) -> &Vec3 {
        match slot {
            PlayerSlot::A => &self.paddle_a,
            PlayerSlot::B => &self.paddle_b,
        }
    }

    pub fn paddle_mut(&mut self, slot: PlayerSlot) -> &mut Vec3 {
        match slot {
            PlayerSlot::A => &mut self.paddle_a,
            PlayerSlot::B => &mut self.paddle_b,
        }
    }

    pub fn input(&self, slot: PlayerSlot) -> &KeyState {
        &self.pending_input[slot.index()]
    }

    /// Record a key transition; last write wins per key, other keys untouched
    pub fn apply_key(&mut self, slot: PlayerSlot, key: &str, pressed: bool) {
        self.pending_input[slot.index()].set(key, pressed);
    }
}
