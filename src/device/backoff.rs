use std::time::Duration;

/// Bounded exponential backoff for re-establishing a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl ReconnectPolicy {
    pub fn new(attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            attempts,
            base,
            max,
        }
    }

    /// Delay before reconnect attempt `attempt` (0-based): base * 2^attempt, capped at max.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}
