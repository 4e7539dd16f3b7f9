use std::time::Duration;

use tokio::time::Instant;

/// Tracks a server-enforced cooldown as an absolute availability instant.
/// `remaining` never goes negative and hits zero exactly when the deadline
/// passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CooldownClock {
    available_at: Option<Instant>,
}

impl CooldownClock {
    pub fn start(&mut self, cooldown: Duration) {
        self.available_at = Some(Instant::now() + cooldown);
    }

    pub fn clear(&mut self) {
        self.available_at = None;
    }

    pub fn remaining(&self) -> Duration {
        match self.available_at {
            Some(at) => at.saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down_monotonically() {
        let mut clock = CooldownClock::default();
        clock.start(Duration::from_secs(5));

        let first = clock.remaining();
        tokio::time::advance(Duration::from_secs(2)).await;
        let second = clock.remaining();

        assert!(second <= first);
        assert_eq!(second, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_is_zero_after_deadline() {
        let mut clock = CooldownClock::default();
        clock.start(Duration::from_secs(2));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(clock.expired());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(clock.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_unset_clock_is_expired() {
        assert!(CooldownClock::default().expired());
    }
}
