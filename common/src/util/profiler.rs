use std::time::{Duration, Instant};

/// Logs how long a scope took when it is dropped. Scopes that finish below
/// `quiet_below` are only logged at debug level.
pub struct ScopedTimer {
    label: String,
    start: Instant,
    quiet_below: Duration,
}

impl ScopedTimer {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_threshold(label, Duration::ZERO)
    }

    pub fn with_threshold(label: impl Into<String>, quiet_below: Duration) -> Self {
        Self {
            label: label.into(),
            start: Instant::now(),
            quiet_below,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed = self.elapsed();
        if elapsed < self.quiet_below {
            log::debug!("{} took {:?}", self.label, elapsed);
        } else {
            log::info!("{} took {:?}", self.label, elapsed);
        }
    }
}
