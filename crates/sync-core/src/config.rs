use std::time::Duration;

/// Construction-time configuration for the sync loop, analogous to the
/// small plain-data `Configure` the teacher threads through its store
/// rather than reaching for process-global state.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_factor: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(10_000),
            backoff_factor: 1.5,
        }
    }
}

impl SyncConfig {
    /// Exponential back-off, clamped to `max_backoff` (spec §4.5).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt as i32);
        let millis = self.initial_backoff.as_secs_f64() * 1000.0 * factor;
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_then_clamps() {
        let cfg = SyncConfig::default();
        let d0 = cfg.retry_delay(0);
        let d1 = cfg.retry_delay(1);
        let d10 = cfg.retry_delay(10);
        assert_eq!(d0, Duration::from_millis(1000));
        assert!(d1 > d0);
        assert_eq!(d10, cfg.max_backoff);
    }
}
