//! Snapshot building for network transmission

use crate::ws::protocol::ServerMsg;

use super::state::SimulationState;

/// Build the per-tick `updateState` message
pub fn build(state: &SimulationState) -> ServerMsg {
    ServerMsg::UpdateState {
        ball: state.ball,
        paddle1: state.paddle_a,
        paddle2: state.paddle_b,
        points: state.score,
        direction: state.direction,
    }
}
