use crate::attempt::{read_board, write_board};
use crate::board::RoutingBoard;
use crate::control::{TIME_LIMIT_TO_PREVENT_ENDLESS_LOOP, trace_cost_table};
use crate::engine::PathSearch;
use crate::error::PassError;
use crate::partition::{self, NetWorkList};
use crate::pool;
use crate::stall::StallMonitor;
use crate::stats::{AutorouteStats, BatchInfo, LogProgress, ProgressSink, SilentProgress};
use pcb_common::db::core::ExpansionCostFactor;
use pcb_common::db::item::StopConnectionOption;
use pcb_common::geom::line::FloatLine;
use pcb_common::util::config::AutorouteConfig;
use pcb_common::util::profiler::ScopedTimer;
use pcb_common::util::time_limit::{StopSignal, TimeLimit};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Passes faster than this are timed at debug level only.
const QUIET_PASS: Duration = Duration::from_millis(250);

/// Why `autoroute_passes` returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// A pass found nothing left to route.
    Converged,
    /// Stopped by the caller.
    Interrupted,
    /// A pass would have started from a board already seen in this run.
    Stalled,
    PassLimitReached,
}

impl RunOutcome {
    pub fn is_completed(self) -> bool {
        self == RunOutcome::Converged
    }
}

/// Runs ripup-and-reroute passes over a shared board. Workers route in
/// parallel but enter path search one at a time.
pub struct BatchAutorouter<'a, B, E> {
    pub(crate) board: &'a RwLock<B>,
    pub(crate) engine: &'a E,
    pub(crate) stop: StopSignal,
    pub(crate) config: AutorouteConfig,
    pub(crate) trace_costs: Arc<[ExpansionCostFactor]>,
    pub(crate) stats: AutorouteStats,
    pub(crate) progress: Arc<dyn ProgressSink>,
    interrupted: AtomicBool,
    air_lines: Mutex<Vec<FloatLine>>,
    stall: StallMonitor,
    pass_no: u32,
}

impl<'a, B, E> BatchAutorouter<'a, B, E>
where
    B: RoutingBoard,
    E: PathSearch<B>,
{
    pub fn new(
        board: &'a RwLock<B>,
        engine: &'a E,
        stop: StopSignal,
        config: &AutorouteConfig,
    ) -> Self {
        let trace_costs = trace_cost_table(&read_board(board).layer_directions(), config);
        Self {
            board,
            engine,
            stop,
            config: config.clone(),
            trace_costs,
            stats: AutorouteStats::default(),
            progress: Arc::new(LogProgress),
            interrupted: AtomicBool::new(false),
            air_lines: Mutex::new(Vec::new()),
            stall: StallMonitor::new(),
            pass_no: config.start_pass_no.max(1),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs passes until nothing is left to route, the caller stops the run,
    /// the board stops changing or the pass limit is exceeded.
    pub fn autoroute_passes(&mut self) -> RunOutcome {
        log::info!(
            "Starting batch autorouter at pass {} ({} threads)",
            self.pass_no,
            self.config.thread_count
        );
        let run_timer = ScopedTimer::new("Batch autorouter run");
        let mut still_unrouted = true;

        let outcome = loop {
            if self.is_interrupted() {
                break RunOutcome::Interrupted;
            }
            if !still_unrouted {
                break RunOutcome::Converged;
            }
            if self.stop.is_stop_requested() {
                self.set_interrupted();
                break RunOutcome::Interrupted;
            }

            let fingerprint = read_board(self.board).fingerprint();
            if self.stall.is_repeated(&fingerprint) {
                log::warn!(
                    "Board state before pass {} was already seen, stopping the autorouter",
                    self.pass_no
                );
                self.stop.request_stop();
                self.set_interrupted();
                break RunOutcome::Stalled;
            }
            if self.pass_no > self.config.stop_pass_no {
                log::warn!(
                    "Pass limit {} reached, stopping the autorouter",
                    self.config.stop_pass_no
                );
                self.stop.request_stop();
                break RunOutcome::PassLimitReached;
            }

            self.progress.status(self.pass_no);
            let before = read_board(self.board).snapshot();
            self.stall.remember(fingerprint);

            still_unrouted = self.autoroute_pass(self.pass_no);

            let changed = read_board(self.board).diff_traces(&before);
            log::debug!("Pass {} changed {} traces", self.pass_no, changed);
            self.stall.record_pass_changes(changed);

            if still_unrouted && !self.is_interrupted() {
                self.pass_no += 1;
            }
        };

        if !(self.config.remove_unconnected_vias || still_unrouted || self.is_interrupted()) {
            self.remove_tails(StopConnectionOption::None);
        }
        self.stall.clear_fingerprints();
        self.clear_air_lines();

        log::info!(
            "Batch autorouter finished at pass {} after {:?}: {:?}",
            self.pass_no,
            run_timer.elapsed(),
            outcome
        );
        outcome
    }

    /// Runs one pass. Returns true if the pass found items to route; a pass
    /// that fails internally reports false.
    pub fn autoroute_pass(&self, pass_no: u32) -> bool {
        let _timer =
            ScopedTimer::with_threshold(format!("Autoroute pass {}", pass_no), QUIET_PASS);
        let result = self.try_autoroute_pass(pass_no);
        self.clear_air_lines();
        match result {
            Ok(found_work) => found_work,
            Err(e) => {
                log::error!("Autoroute pass {} aborted: {}", pass_no, e);
                false
            }
        }
    }

    fn try_autoroute_pass(&self, pass_no: u32) -> Result<bool, PassError> {
        let work = partition::collect_work(&*read_board(self.board));
        if work.is_empty() {
            return Ok(false);
        }

        let total = partition::total_items(&work);
        self.stats.set_items_to_go(total);
        log::info!(
            "Pass {}: {} items to route on {} nets",
            pass_no,
            total,
            work.len()
        );

        pool::run_sliced(&work, self.config.thread_count, |_, lists| {
            self.route_slice(lists, pass_no)
        })?;

        let tail_option = if self.config.remove_unconnected_vias {
            StopConnectionOption::None
        } else {
            StopConnectionOption::FanoutVia
        };
        self.remove_tails(tail_option);
        Ok(true)
    }

    fn route_slice(&self, lists: &[NetWorkList], pass_no: u32) {
        for list in lists {
            for &item in &list.items {
                if self.stop.is_stop_requested() || self.is_interrupted() {
                    self.set_interrupted();
                    return;
                }
                // Failures are already counted and logged by the attempt.
                let _ = self.route_item(item, list.net, pass_no);
            }
        }
    }

    fn remove_tails(&self, stop_option: StopConnectionOption) {
        let mut board = write_board(self.board);
        board.start_marking_changed_area();
        board.remove_trace_tails(None, stop_option);
        board.opt_changed_area(
            self.config.trace_pull_tight_accuracy,
            &self.trace_costs,
            &self.stop,
            TimeLimit::from_millis(TIME_LIMIT_TO_PREVENT_ENDLESS_LOOP),
        );
    }

    /// Bounded run for optimizing a single item: at most `max_pass_count`
    /// passes with the given ripup cost base and no progress output. Returns
    /// the number of passes needed, or `max_pass_count + 1` if the board did
    /// not complete, including when the run was stopped.
    pub fn autoroute_passes_for_optimizing_item(
        board: &'a RwLock<B>,
        engine: &'a E,
        stop: &StopSignal,
        config: &AutorouteConfig,
        max_pass_count: u32,
        ripup_costs: u32,
        with_preferred_directions: bool,
    ) -> u32 {
        let mut config = config.clone();
        config.start_ripup_costs = ripup_costs;
        config.with_preferred_directions = with_preferred_directions;
        config.remove_unconnected_vias = true;
        config.progress_messages = false;

        let router = BatchAutorouter::new(board, engine, stop.clone(), &config)
            .with_progress(Arc::new(SilentProgress));

        let mut curr_pass_no = 1;
        let mut still_unrouted = true;
        while still_unrouted && !router.is_interrupted() && curr_pass_no <= max_pass_count {
            if stop.is_stop_requested() {
                router.set_interrupted();
                break;
            }
            still_unrouted = router.autoroute_pass(curr_pass_no);
            curr_pass_no += 1;
        }

        router.remove_tails(StopConnectionOption::None);
        if still_unrouted {
            max_pass_count.saturating_add(1)
        } else {
            curr_pass_no - 1
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub fn set_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn pass_no(&self) -> u32 {
        self.pass_no
    }

    pub fn stats(&self) -> BatchInfo {
        self.stats.snapshot()
    }

    pub(crate) fn add_air_line(&self, line: FloatLine) {
        self.air_lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    /// Air lines recorded since the last call or the last pass end.
    pub fn take_air_lines(&self) -> Vec<FloatLine> {
        std::mem::take(&mut *self.air_lines.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn clear_air_lines(&self) {
        self.air_lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
