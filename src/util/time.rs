//! Time utilities for the session tick loop

use std::time::{Duration, Instant};

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const DEFAULT_TICK_RATE_HZ: u32 = 20;
pub const MAX_TICK_RATE_HZ: u32 = 120;

/// Wall-clock length of one tick at the given rate
pub fn tick_interval(tick_rate_hz: u32) -> Duration {
    Duration::from_micros(1_000_000 / tick_rate_hz.max(1) as u64)
}

/// Number of ticks covering `duration`, rounded up
pub fn ticks_for(duration: Duration, tick_rate_hz: u32) -> u64 {
    let tick = tick_interval(tick_rate_hz).as_micros().max(1);
    duration.as_micros().div_ceil(tick) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_interval() {
        assert_eq!(tick_interval(20), Duration::from_millis(50));
        assert_eq!(tick_interval(0), Duration::from_secs(1));
    }

    #[test]
    fn test_ticks_for_rounds_up() {
        assert_eq!(ticks_for(Duration::from_secs(2), 20), 40);
        assert_eq!(ticks_for(Duration::from_millis(51), 20), 2);
        assert_eq!(ticks_for(Duration::ZERO, 20), 0);
    }
}
