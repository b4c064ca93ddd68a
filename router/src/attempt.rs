use crate::batch::BatchAutorouter;
use crate::board::{ItemSet, RoutingBoard};
use crate::control::{
    AutorouteControl, TIME_LIMIT_TO_PREVENT_ENDLESS_LOOP, ripup_costs_for_pass,
    search_time_budget,
};
use crate::engine::{AttemptParams, AutorouteResult, ConnectionSearch, PathSearch};
use crate::error::{AttemptError, panic_message};
use pcb_common::db::indices::{ItemId, NetId};
use pcb_common::geom::line::FloatLine;
use pcb_common::geom::point::Point;
use pcb_common::util::time_limit::TimeLimit;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Serializes path search and board mutation across every batch run in the
/// process, whatever the number of workers.
static ROUTE_LOCK: Mutex<()> = Mutex::new(());

/// How a successful attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Nothing of the net was left unconnected; the engine was not called.
    AlreadyRouted,
    /// The item already reaches the net's plane; the engine was not called.
    ConnectedToPlane,
    Routed,
    AlreadyConnected,
}

pub(crate) fn read_board<B>(lock: &RwLock<B>) -> RwLockReadGuard<'_, B> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_board<B>(lock: &RwLock<B>) -> RwLockWriteGuard<'_, B> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Shortest line between a drill item of `from` and one of `to`.
pub fn calc_air_line<B: RoutingBoard + ?Sized>(
    board: &B,
    from: &ItemSet,
    to: &ItemSet,
) -> Option<FloatLine> {
    let targets: Vec<Point<f64>> = to.iter().filter_map(|&id| board.drill_center(id)).collect();
    let mut best: Option<(f64, FloatLine)> = None;
    for a in from.iter().filter_map(|&id| board.drill_center(id)) {
        for &b in &targets {
            let dist = a.distance_square(b);
            if best.as_ref().is_none_or(|(d, _)| dist < *d) {
                best = Some((dist, FloatLine::new(a, b)));
            }
        }
    }
    best.map(|(_, line)| line)
}

struct Prepared {
    control: AutorouteControl,
    start: ItemSet,
    dest: ItemSet,
}

impl<B, E> BatchAutorouter<'_, B, E>
where
    B: RoutingBoard,
    E: PathSearch<B>,
{
    /// Tries to connect `item` to the rest of `net` and books the outcome in
    /// the run's counters. A panic inside the attempt is reported as
    /// `AttemptError::Internal`.
    pub fn route_item(
        &self,
        item: ItemId,
        net: NetId,
        pass_no: u32,
    ) -> Result<AttemptOutcome, AttemptError> {
        let mut ripped = ItemSet::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.autoroute_item(item, net, pass_no, &mut ripped)
        }))
        .unwrap_or_else(|payload| {
            Err(AttemptError::Internal {
                item,
                net,
                message: panic_message(payload.as_ref()),
            })
        });

        match &result {
            Ok(_) => self.stats.increment_routed(),
            Err(e) => {
                if e.is_search_failure() {
                    log::debug!("{}", e);
                } else {
                    log::error!("{}", e);
                }
                self.stats.increment_not_found();
            }
        }
        self.stats.decrement_items_to_go();
        self.stats.add_ripped_items(ripped.len());
        if self.config.progress_messages {
            self.progress.batch_info(self.stats.snapshot());
        }
        result
    }

    fn autoroute_item(
        &self,
        item: ItemId,
        net: NetId,
        pass_no: u32,
        ripped: &mut ItemSet,
    ) -> Result<AttemptOutcome, AttemptError> {
        let prepared = match self.prepare(item, net, pass_no) {
            Ok(prepared) => prepared,
            Err(outcome) => return Ok(outcome),
        };

        let result = {
            let _route_guard = ROUTE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            let mut board = write_board(self.board);
            board.start_marking_changed_area();
            // The search budget starts once the lock is held.
            let params = AttemptParams {
                net,
                clearance_class: prepared.control.trace_clearance_class_no,
                stop: self.stop.clone(),
                time_limit: TimeLimit::new(search_time_budget(pass_no)),
                retain_database: self.config.retain_autoroute_database,
            };
            let mut attempt = self.engine.init_attempt(&board, params);
            let result = attempt
                .autoroute_connection(
                    &mut board,
                    &prepared.start,
                    &prepared.dest,
                    &prepared.control,
                    ripped,
                )
                .map_err(|source| AttemptError::Search { item, net, source })?;
            if result == AutorouteResult::Routed {
                board.opt_changed_area(
                    self.config.trace_pull_tight_accuracy,
                    &self.trace_costs,
                    &self.stop,
                    TimeLimit::from_millis(TIME_LIMIT_TO_PREVENT_ENDLESS_LOOP),
                );
            }
            result
        };

        match result {
            AutorouteResult::Routed => Ok(AttemptOutcome::Routed),
            AutorouteResult::AlreadyConnected => Ok(AttemptOutcome::AlreadyConnected),
            other => Err(AttemptError::NotFound {
                item,
                net,
                result: other,
            }),
        }
    }

    /// Everything that only reads the board. `Err` carries an outcome that
    /// makes the search unnecessary.
    fn prepare(&self, item: ItemId, net: NetId, pass_no: u32) -> Result<Prepared, AttemptOutcome> {
        let board = read_board(self.board);

        let contains_plane = board.net_contains_plane(net);
        let via_costs = if contains_plane {
            self.config.plane_via_costs
        } else {
            self.config.via_costs
        };
        let clearance_class = board.clearance_class(net);
        let mut control = AutorouteControl::new(
            net,
            clearance_class,
            via_costs,
            self.config.trace_width,
            Arc::clone(&self.trace_costs),
        );
        control.ripup_allowed = true;
        control.ripup_costs = ripup_costs_for_pass(self.config.start_ripup_costs, pass_no);
        control.remove_unconnected_vias = self.config.remove_unconnected_vias;

        let unconnected = board.unconnected_set(item, net);
        if unconnected.is_empty() {
            return Err(AttemptOutcome::AlreadyRouted);
        }
        let connected = board.connected_set(item, net);
        if contains_plane && connected.iter().any(|&id| board.is_conduction_area(id)) {
            return Err(AttemptOutcome::ConnectedToPlane);
        }

        // Plane nets grow out of what already touches the plane.
        let (start, dest) = if contains_plane {
            (connected, unconnected)
        } else {
            (unconnected, connected)
        };
        if let Some(line) = calc_air_line(&*board, &start, &dest) {
            self.add_air_line(line);
        }

        Ok(Prepared {
            control,
            start,
            dest,
        })
    }
}
