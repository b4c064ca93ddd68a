use std::collections::{HashSet, VecDeque};

/// Passes averaged for plateau detection.
pub const PLATEAU_WINDOW: usize = 20;
/// Average trace changes per pass below which further passes are unlikely to help.
pub const PLATEAU_THRESHOLD: f64 = 20.0;

/// Watches the outer pass loop for repeated board states and for passes that
/// barely change anything.
#[derive(Debug, Default)]
pub struct StallMonitor {
    seen: HashSet<String>,
    changes: VecDeque<usize>,
}

impl StallMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a previous pass already started from this exact board.
    pub fn is_repeated(&self, fingerprint: &str) -> bool {
        self.seen.contains(fingerprint)
    }

    pub fn remember(&mut self, fingerprint: String) {
        self.seen.insert(fingerprint);
    }

    /// Records the number of changed traces of one pass. Returns the window
    /// average when the window is full and the average is below the threshold.
    pub fn record_pass_changes(&mut self, changed_traces: usize) -> Option<f64> {
        self.changes.push_back(changed_traces);
        while self.changes.len() > PLATEAU_WINDOW {
            self.changes.pop_front();
        }

        let average = self.window_average()?;
        if average < PLATEAU_THRESHOLD {
            log::warn!(
                "There were only {:.1} changes per pass in the last {} passes, so it's very likely that the autorouter can't improve the result much further. Consider stopping it and finishing the board manually.",
                average,
                PLATEAU_WINDOW
            );
            Some(average)
        } else {
            None
        }
    }

    /// Average of the window, once it holds `PLATEAU_WINDOW` passes.
    pub fn window_average(&self) -> Option<f64> {
        if self.changes.len() < PLATEAU_WINDOW {
            return None;
        }
        let sum: usize = self.changes.iter().sum();
        Some(sum as f64 / self.changes.len() as f64)
    }

    pub fn fingerprint_count(&self) -> usize {
        self.seen.len()
    }

    pub fn clear_fingerprints(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_fingerprint_is_detected() {
        let mut monitor = StallMonitor::new();
        assert!(!monitor.is_repeated("abc"));
        monitor.remember("abc".to_string());
        assert!(monitor.is_repeated("abc"));
        monitor.clear_fingerprints();
        assert!(!monitor.is_repeated("abc"));
    }

    #[test]
    fn test_plateau_needs_full_window() {
        let mut monitor = StallMonitor::new();
        for _ in 0..PLATEAU_WINDOW - 1 {
            assert_eq!(monitor.record_pass_changes(0), None);
        }
        assert_eq!(monitor.record_pass_changes(0), Some(0.0));
    }

    #[test]
    fn test_window_evicts_oldest_pass() {
        let mut monitor = StallMonitor::new();
        monitor.record_pass_changes(1000);
        for _ in 0..PLATEAU_WINDOW - 1 {
            monitor.record_pass_changes(10);
        }
        // 1000 is still inside the window: (1000 + 19 * 10) / 20 = 59.5
        assert_eq!(monitor.window_average(), Some(59.5));
        assert_eq!(monitor.record_pass_changes(10), Some(10.0));
    }

    #[test]
    fn test_busy_passes_do_not_warn() {
        let mut monitor = StallMonitor::new();
        for _ in 0..PLATEAU_WINDOW * 2 {
            assert_eq!(monitor.record_pass_changes(25), None);
        }
        assert_eq!(monitor.window_average(), Some(25.0));
    }
}
