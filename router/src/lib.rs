pub mod attempt;
pub mod batch;
pub mod board;
pub mod control;
pub mod engine;
pub mod error;
pub mod partition;
pub mod pool;
pub mod stall;
pub mod stats;

use batch::{BatchAutorouter, RunOutcome};
use engine::direct::DirectSearch;
use pcb_common::db::core::BoardDb;
use pcb_common::geom::line::FloatLine;
use pcb_common::util::config::AutorouteConfig;
use pcb_common::util::time_limit::StopSignal;
use stats::ProgressSink;
use std::sync::{Arc, PoisonError, RwLock};

/// Runs ripup passes over `db` with the reference engine until the board is
/// complete, stalls, hits the pass limit or is stopped.
pub fn route(
    db: &mut BoardDb,
    config: &AutorouteConfig,
    stop: &StopSignal,
    progress: Arc<dyn ProgressSink>,
) -> RunOutcome {
    let engine = DirectSearch::new(config.ripup_budget);
    let lock = RwLock::new(std::mem::take(db));
    let outcome = {
        let mut router =
            BatchAutorouter::new(&lock, &engine, stop.clone(), config).with_progress(progress);
        router.autoroute_passes()
    };
    *db = lock.into_inner().unwrap_or_else(PoisonError::into_inner);
    outcome
}

/// Bounded run used when optimizing a single item. Returns the number of passes
/// needed, or `max_pass_count + 1` if the board did not complete.
pub fn optimize(
    db: &mut BoardDb,
    config: &AutorouteConfig,
    stop: &StopSignal,
    max_pass_count: u32,
    ripup_costs: u32,
) -> u32 {
    let engine = DirectSearch::new(config.ripup_budget);
    let lock = RwLock::new(std::mem::take(db));
    let passes = BatchAutorouter::autoroute_passes_for_optimizing_item(
        &lock,
        &engine,
        stop,
        config,
        max_pass_count,
        ripup_costs,
        config.with_preferred_directions,
    );
    *db = lock.into_inner().unwrap_or_else(PoisonError::into_inner);
    passes
}

/// One air line per incomplete net, for display after a run.
pub fn remaining_air_lines(db: &BoardDb) -> Vec<FloatLine> {
    db.nets
        .keys()
        .filter_map(|&net| {
            let first = db.net_items(net).into_iter().find(|&id| {
                db.item(id).is_some_and(|it| !it.is_route())
            })?;
            let unconnected = db.unconnected_set(first, net);
            if unconnected.is_empty() {
                return None;
            }
            let connected = db.connected_set(first, net);
            attempt::calc_air_line(db, &unconnected, &connected)
        })
        .collect()
}
