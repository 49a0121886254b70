//! Latency injection.

use std::time::Duration;

use rand::Rng;

use crate::config::LatencyRange;

impl LatencyRange {
    /// Draw a delay uniformly from `min_ms..=max_ms`.
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }
}

/// Sleeps the current task for a sampled delay.
#[derive(Debug, Clone, Copy)]
pub struct LatencyInjector {
    range: LatencyRange,
}

impl LatencyInjector {
    pub fn new(range: LatencyRange) -> Self {
        Self { range }
    }

    /// Sleep and return the delay that was applied.
    pub async fn apply(&self) -> Duration {
        if self.range.is_zero() {
            return Duration::ZERO;
        }
        let delay = self.range.sample();
        tokio::time::sleep(delay).await;
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_within_range() {
        let range = LatencyRange { min_ms: 10, max_ms: 20 };
        for _ in 0..200 {
            let d = range.sample().as_millis();
            assert!((10..=20).contains(&d));
        }
        assert_eq!(LatencyRange::fixed(7).sample(), Duration::from_millis(7));
    }

    #[tokio::test]
    async fn test_apply_sleeps() {
        let start = tokio::time::Instant::now();
        let delay = LatencyInjector::new(LatencyRange::fixed(30)).apply().await;
        assert_eq!(delay, Duration::from_millis(30));
        assert!(start.elapsed() >= Duration::from_millis(30));

        let delay = LatencyInjector::new(LatencyRange::default()).apply().await;
        assert_eq!(delay, Duration::ZERO);
    }
}
