//! WebSocket transport for players

pub mod handler;
pub mod protocol;
