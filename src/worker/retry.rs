#![deny(warnings, rust_2018_idioms)]

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

/// Exponential backoff: base delay doubling per retry, capped, jittered.
///
/// Stateless; the retry count lives on the queue entry so backoff position
/// survives restarts.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    config: BackoffConfig,
}

impl BackoffPolicy {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    pub fn delay_for(&self, retry_count: u32) -> Duration {
        // Exponent clamped so the multiplication cannot overflow before the cap.
        let exponent = retry_count.saturating_sub(1).min(20);
        let multiplier = 2_u64.pow(exponent);
        let raw = Duration::from_millis(
            (self.config.base_delay.as_millis() as u64).saturating_mul(multiplier),
        );

        let capped = std::cmp::min(raw, self.config.max_delay);

        if self.config.jitter {
            Self::apply_jitter(capped)
        } else {
            capped
        }
    }

    fn apply_jitter(delay: Duration) -> Duration {
        let mut rng = rand::rng();
        let jitter_factor = rng.random_range(0.5..1.5); // +/-50% jitter
        let jittered_millis = (delay.as_millis() as f64 * jitter_factor) as u64;
        Duration::from_millis(jittered_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_retry() {
        let policy = BackoffPolicy::new(BackoffConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            jitter: false,
        });

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
    }

    #[test]
    fn delay_is_capped() {
        let policy = BackoffPolicy::new(BackoffConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter: false,
        });

        assert_eq!(policy.delay_for(30), Duration::from_secs(5));
    }

    #[test]
    fn jitter_stays_in_range() {
        let policy = BackoffPolicy::new(BackoffConfig {
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            jitter: true,
        });

        for _ in 0..50 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(300));
        }
    }
}
