//! Fixed-step Pong physics: paddles, ball integration, bounces and scoring

use rand::Rng;

use super::state::{
    PlayerSlot, SimulationState, Steer, Vec3, Velocity, BALL_Y, COURT_HALF_WIDTH,
    INITIAL_BALL_SPEED,
};

/// Paddle displacement per tick while a steering key is held
pub const PADDLE_SPEED: f32 = 0.1;
/// Half the paddle width along x
pub const PADDLE_HALF_WIDTH: f32 = 1.0;
/// Contact band in front of each goal line, as distance from the center line
pub const PADDLE_BAND_NEAR: f32 = 8.5;
pub const PADDLE_BAND_FAR: f32 = 9.0;
/// Crossing this |z| scores for the opposite side
pub const GOAL_Z: f32 = 10.0;
/// Extra x-velocity per unit of off-center paddle contact
pub const SPIN_FACTOR: f32 = 0.05;
/// Maximum deviation of a serve from straight down the court (25 degrees)
pub const MAX_ANGLE_VARIATION: f64 = 25.0 * std::f64::consts::PI / 180.0;
/// First side to reach this many points wins
pub const WINNING_SCORE: u32 = 10;

/// What happened during one step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepEvents {
    /// Side that scored this tick
    pub scored: Option<PlayerSlot>,
    /// Side that reached the winning score this tick
    pub winner: Option<PlayerSlot>,
}

/// Advance the simulation by one tick.
///
/// Order: paddles, ball integration, wall bounce, paddle bounce, scoring.
/// At most one side can score per tick.
pub fn step<R: Rng + ?Sized>(state: &mut SimulationState, rng: &mut R) -> StepEvents {
    move_paddles(state);

    state.ball.x += state.ball_velocity.x;
    state.ball.z += state.ball_velocity.z;

    bounce_walls(state);
    for slot in PlayerSlot::ALL {
        bounce_paddle(state, slot);
    }

    let scored = if state.ball.z <= -GOAL_Z {
        Some(PlayerSlot::B)
    } else if state.ball.z >= GOAL_Z {
        Some(PlayerSlot::A)
    } else {
        None
    };

    let Some(scorer) = scored else {
        return StepEvents::default();
    };

    state.score.increment(scorer);
    reset_ball(state, rng);
    state.paddle_a.x = 0.0;
    state.paddle_b.x = 0.0;

    StepEvents {
        scored,
        winner: (state.score.get(scorer) >= WINNING_SCORE).then_some(scorer),
    }
}

/// Move each paddle by its own player's held keys, clamped to the court
fn move_paddles(state: &mut SimulationState) {
    for slot in PlayerSlot::ALL {
        let keys = state.input(slot);
        let mut dx = 0.0;
        if keys.steering(Steer::Left) {
            dx -= PADDLE_SPEED;
        }
        if keys.steering(Steer::Right) {
            dx += PADDLE_SPEED;
        }

        let paddle = state.paddle_mut(slot);
        paddle.x = (paddle.x + dx).clamp(-COURT_HALF_WIDTH, COURT_HALF_WIDTH);
    }
}

/// Reflect x-velocity off the side walls. Only an outward-moving ball is
/// reflected, so one contact flips the velocity exactly once.
fn bounce_walls(state: &mut SimulationState) {
    let ball = &mut state.ball;
    let vel = &mut state.ball_velocity;
    if (ball.x <= -COURT_HALF_WIDTH && vel.x < 0.0) || (ball.x >= COURT_HALF_WIDTH && vel.x > 0.0) {
        vel.x = -vel.x;
        ball.x = ball.x.clamp(-COURT_HALF_WIDTH, COURT_HALF_WIDTH);
    }
}

fn bounce_paddle(state: &mut SimulationState, slot: PlayerSlot) {
    let paddle = *state.paddle(slot);
    let ball = state.ball;
    let vel = state.ball_velocity;

    // Paddle A guards negative z, paddle B positive z
    let (in_band, approaching) = match slot {
        PlayerSlot::A => (
            ball.z >= -PADDLE_BAND_FAR && ball.z <= -PADDLE_BAND_NEAR,
            vel.z < 0.0,
        ),
        PlayerSlot::B => (
            ball.z >= PADDLE_BAND_NEAR && ball.z <= PADDLE_BAND_FAR,
            vel.z > 0.0,
        ),
    };
    let on_paddle = (ball.x - paddle.x).abs() <= PADDLE_HALF_WIDTH;

    if in_band && approaching && on_paddle {
        let impact = ball.x - paddle.x;
        state.ball_velocity = Velocity {
            x: vel.x + impact * SPIN_FACTOR,
            z: -vel.z,
        };
        state.direction = direction_of(state.ball_velocity.z);
    }
}

/// Serve from the center line: random x, angle within `MAX_ANGLE_VARIATION`
/// of straight towards either goal
pub fn reset_ball<R: Rng + ?Sized>(state: &mut SimulationState, rng: &mut R) {
    let x = (rng.gen::<f32>() - 0.5) * 2.0 * COURT_HALF_WIDTH;
    state.ball = Vec3::new(x, BALL_Y, 0.0);

    let base = if rng.gen_bool(0.5) {
        std::f64::consts::FRAC_PI_2
    } else {
        -std::f64::consts::FRAC_PI_2
    };
    let angle = base + (rng.gen::<f64>() * 2.0 - 1.0) * MAX_ANGLE_VARIATION;

    state.ball_velocity = Velocity {
        x: INITIAL_BALL_SPEED * angle.cos() as f32,
        z: INITIAL_BALL_SPEED * angle.sin() as f32,
    };
    state.direction = direction_of(state.ball_velocity.z);
}

fn direction_of(z_velocity: f32) -> i8 {
    if z_velocity < 0.0 {
        -1
    } else {
        1
    }
}
