use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters of one batch run, shared by all workers.
#[derive(Debug, Default)]
pub struct AutorouteStats {
    items_to_go: AtomicUsize,
    routed: AtomicUsize,
    not_found: AtomicUsize,
    ripped_items: AtomicUsize,
}

/// Point-in-time copy of the counters, as published to a `ProgressSink`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchInfo {
    pub items_to_go: usize,
    pub routed: usize,
    pub ripped_items: usize,
    pub not_found: usize,
}

impl AutorouteStats {
    pub fn set_items_to_go(&self, count: usize) {
        self.items_to_go.store(count, Ordering::Relaxed);
    }

    pub fn decrement_items_to_go(&self) {
        let _ = self
            .items_to_go
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }

    pub fn increment_routed(&self) {
        self.routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_ripped_items(&self, count: usize) {
        self.ripped_items.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BatchInfo {
        BatchInfo {
            items_to_go: self.items_to_go.load(Ordering::Relaxed),
            routed: self.routed.load(Ordering::Relaxed),
            ripped_items: self.ripped_items.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
        }
    }
}

/// Receives progress of a batch run. Called from worker threads.
pub trait ProgressSink: Send + Sync {
    fn status(&self, _pass_no: u32) {}
    fn batch_info(&self, info: BatchInfo);
}

/// Reports through the `log` facade.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn status(&self, pass_no: u32) {
        log::info!("Batch autorouter pass {}", pass_no);
    }

    fn batch_info(&self, info: BatchInfo) {
        log::debug!(
            "to go: {}, routed: {}, ripped: {}, failed: {}",
            info.items_to_go,
            info.routed,
            info.ripped_items,
            info.not_found
        );
    }
}

pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn batch_info(&self, _info: BatchInfo) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let stats = Arc::new(AutorouteStats::default());
        stats.set_items_to_go(4000);
        rayon::scope(|s| {
            for _ in 0..4 {
                let stats = Arc::clone(&stats);
                s.spawn(move |_| {
                    for i in 0..1000 {
                        if i % 2 == 0 {
                            stats.increment_routed();
                        } else {
                            stats.increment_not_found();
                        }
                        stats.add_ripped_items(2);
                        stats.decrement_items_to_go();
                    }
                });
            }
        });
        assert_eq!(
            stats.snapshot(),
            BatchInfo {
                items_to_go: 0,
                routed: 2000,
                ripped_items: 8000,
                not_found: 2000,
            }
        );
    }

    #[test]
    fn test_items_to_go_does_not_wrap() {
        let stats = AutorouteStats::default();
        stats.decrement_items_to_go();
        assert_eq!(stats.snapshot().items_to_go, 0);
    }
}
