use crate::error::{PassError, panic_message};
use std::ops::Range;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Contiguous index range of worker `index` out of `workers` over `total` lists.
/// Slices have `ceil(total / workers)` entries; trailing workers may get none.
pub fn worker_range(total: usize, workers: usize, index: usize) -> Range<usize> {
    let workers = workers.max(1);
    let slice_size = total.div_ceil(workers);
    let start = (index * slice_size).min(total);
    let end = (start + slice_size).min(total);
    start..end
}

/// Runs `body` once per worker on a fresh pool of `workers` threads, handing
/// each its own slice of `work`. Returns after every worker has finished.
pub fn run_sliced<T, F>(work: &[T], workers: usize, body: F) -> Result<(), PassError>
where
    T: Sync,
    F: Fn(usize, &[T]) + Sync,
{
    let workers = workers.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("autoroute-{}", i))
        .build()?;

    let body = &body;
    let joined = catch_unwind(AssertUnwindSafe(|| {
        pool.scope(|s| {
            for index in 0..workers {
                let range = worker_range(work.len(), workers, index);
                if range.is_empty() {
                    continue;
                }
                let slice = &work[range];
                s.spawn(move |_| body(index, slice));
            }
        })
    }));

    joined.map_err(|payload| PassError::WorkerPanicked(panic_message(payload.as_ref())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_ranges_cover_everything_once() {
        for total in 0..40 {
            for workers in 1..12 {
                let mut covered = vec![0u32; total];
                for w in 0..workers {
                    for i in worker_range(total, workers, w) {
                        covered[i] += 1;
                    }
                }
                assert!(covered.iter().all(|&c| c == 1), "{} / {}", total, workers);
            }
        }
    }

    #[test]
    fn test_ranges_are_disjoint_and_sized() {
        let ranges: Vec<_> = (0..8).map(|w| worker_range(10, 8, w)).collect();
        assert_eq!(ranges[0], 0..2);
        assert_eq!(ranges[4], 8..10);
        assert!(ranges[5].is_empty());
        assert!(ranges[7].is_empty());
        for (i, a) in ranges.iter().enumerate() {
            for b in &ranges[i + 1..] {
                assert!(a.end <= b.start || b.is_empty() || a.is_empty());
            }
        }
    }

    #[test]
    fn test_every_element_is_visited_by_its_worker() {
        let work: Vec<usize> = (0..23).collect();
        let seen = Mutex::new(Vec::new());
        run_sliced(&work, 4, |worker, slice| {
            let mut seen = seen.lock().unwrap();
            for &w in slice {
                seen.push((worker, w));
            }
        })
        .unwrap();

        let mut seen = seen.into_inner().unwrap();
        seen.sort_by_key(|&(_, w)| w);
        assert_eq!(seen.len(), 23);
        for (worker, w) in seen {
            assert!(worker_range(23, 4, worker).contains(&w));
        }
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let work = vec![1, 2, 3];
        let result = run_sliced(&work, 2, |_, slice| {
            if slice.contains(&3) {
                panic!("boom");
            }
        });
        assert!(matches!(result, Err(PassError::WorkerPanicked(msg)) if msg == "boom"));
    }
}
