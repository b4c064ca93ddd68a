use super::{AttemptParams, AutorouteResult, ConnectionSearch, PathSearch, SearchError};
use crate::board::ItemSet;
use crate::control::AutorouteControl;
use pcb_common::db::core::BoardDb;
use pcb_common::db::indices::{ItemId, NetId};
use pcb_common::db::item::ItemShape;
use pcb_common::geom::line::FloatLine;
use pcb_common::geom::point::Point;
use std::collections::BTreeSet;

const MAX_CANDIDATE_PAIRS: usize = 4;

/// Reference engine. Joins the nearest terminals of the two sides with a single
/// straight trace on the cheapest layer, adding vias where a terminal does not
/// reach that layer. Foreign traces in the way are ripped while the accumulated
/// ripup cost stays within `ripup_budget`.
pub struct DirectSearch {
    ripup_budget: u32,
}

impl DirectSearch {
    pub fn new(ripup_budget: u32) -> Self {
        Self { ripup_budget }
    }
}

impl PathSearch<BoardDb> for DirectSearch {
    type Attempt = DirectAttempt;

    fn init_attempt(&self, board: &BoardDb, params: AttemptParams) -> DirectAttempt {
        DirectAttempt {
            clearance: board.clearance(params.clearance_class),
            ripup_budget: self.ripup_budget,
            params,
        }
    }
}

/// Stateless between connections, so `retain_database` has no effect.
pub struct DirectAttempt {
    params: AttemptParams,
    clearance: f64,
    ripup_budget: u32,
}

#[derive(Clone, Copy, Debug)]
struct Anchor {
    point: Point<f64>,
    first_layer: u8,
    last_layer: u8,
}

impl Anchor {
    fn on_layer(point: Point<f64>, layer: u8) -> Self {
        Self {
            point,
            first_layer: layer,
            last_layer: layer,
        }
    }

    fn is_on(&self, layer: u8) -> bool {
        (self.first_layer..=self.last_layer).contains(&layer)
    }

    fn via_span(&self, layer: u8) -> (u8, u8) {
        (self.first_layer.min(layer), self.last_layer.max(layer))
    }
}

#[derive(Debug)]
struct Candidate {
    layer: u8,
    line: FloatLine,
    vias: Vec<(Point<f64>, u8, u8)>,
    conflicts: Vec<ItemId>,
    cost: f64,
}

impl DirectAttempt {
    fn evaluate(
        &self,
        board: &BoardDb,
        from: Anchor,
        to: Anchor,
        layer: u8,
        control: &AutorouteControl,
    ) -> Option<Candidate> {
        let net = control.net_no;
        let line = FloatLine::new(from.point, to.point);

        if !line.is_point() {
            let keepout = self.clearance + control.trace_width * 0.5;
            if !board
                .fixed_obstacles_near(&line, layer, net, keepout)
                .is_empty()
            {
                return None;
            }
        }

        let mut vias = Vec::new();
        for anchor in [from, to] {
            if anchor.is_on(layer) {
                continue;
            }
            let (first, last) = anchor.via_span(layer);
            let spot = FloatLine::new(anchor.point, anchor.point);
            let blocked = (first..=last).any(|l| {
                !board
                    .fixed_obstacles_near(&spot, l, net, self.clearance)
                    .is_empty()
            });
            if blocked {
                return None;
            }
            vias.push((anchor.point, first, last));
        }
        if line.is_point() && vias.is_empty() {
            return None;
        }

        let conflicts = if line.is_point() {
            Vec::new()
        } else {
            board.traces_crossing(&line, layer, net)
        };

        let mut cost = control.layer_costs(layer).line_cost(&line)
            + control.via_costs as f64 * vias.len() as f64;
        if !conflicts.is_empty() {
            let ripup = control
                .ripup_costs
                .saturating_mul(conflicts.len() as u32);
            if !control.ripup_allowed || ripup > self.ripup_budget {
                return None;
            }
            cost += ripup as f64;
        }

        Some(Candidate {
            layer,
            line,
            vias,
            conflicts,
            cost,
        })
    }

    fn commit(
        &self,
        board: &mut BoardDb,
        candidate: Candidate,
        control: &AutorouteControl,
        ripped: &mut ItemSet,
    ) {
        let net = control.net_no;
        let mut ripped_nets: BTreeSet<NetId> = BTreeSet::new();
        for id in candidate.conflicts {
            if let Some(item) = board.remove_item(id) {
                ripped_nets.extend(item.nets.iter().copied());
                ripped.insert(id);
            }
        }
        if control.remove_unconnected_vias {
            for other in ripped_nets {
                board.remove_isolated_vias(other);
            }
        }

        for (point, first, last) in candidate.vias {
            board.add_via(net, point, first, last);
        }
        if !candidate.line.is_point() {
            board.add_trace(net, candidate.line, candidate.layer, control.trace_width);
        }
        log::trace!(
            "{:?}: trace on layer {} cost {:.1}",
            net,
            candidate.layer,
            candidate.cost
        );
    }
}

/// Pins, vias and trace ends give fixed anchors. Conduction areas contribute
/// the point of the area closest to each of `toward`.
fn anchors(board: &BoardDb, items: &ItemSet, toward: &[Point<f64>]) -> Vec<Anchor> {
    let mut out = Vec::new();
    for item in items.iter().filter_map(|&id| board.item(id)) {
        match item.shape {
            ItemShape::Pin {
                center,
                first_layer,
                last_layer,
            }
            | ItemShape::Via {
                center,
                first_layer,
                last_layer,
            } => out.push(Anchor {
                point: center,
                first_layer,
                last_layer,
            }),
            ItemShape::Trace { line, layer, .. } => {
                out.push(Anchor::on_layer(line.a, layer));
                out.push(Anchor::on_layer(line.b, layer));
            }
            ItemShape::ConductionArea { area, layer } => {
                if toward.is_empty() {
                    out.push(Anchor::on_layer(area.center(), layer));
                }
                for &p in toward {
                    out.push(Anchor::on_layer(area.clamp(p), layer));
                }
            }
        }
    }
    out
}

fn fixed_points(board: &BoardDb, items: &ItemSet) -> Vec<Point<f64>> {
    anchors(board, items, &[])
        .into_iter()
        .map(|a| a.point)
        .collect()
}

impl ConnectionSearch<BoardDb> for DirectAttempt {
    fn autoroute_connection(
        &mut self,
        board: &mut BoardDb,
        start: &ItemSet,
        dest: &ItemSet,
        control: &AutorouteControl,
        ripped: &mut ItemSet,
    ) -> Result<AutorouteResult, SearchError> {
        if self.params.stop.is_stop_requested() {
            return Ok(AutorouteResult::NotRouted);
        }
        if self.params.time_limit.limit_exceeded() {
            return Ok(AutorouteResult::TimedOut);
        }
        if let Some(&missing) = start.iter().chain(dest).find(|&&id| board.item(id).is_none()) {
            return Err(SearchError::UnknownItem(missing));
        }
        let (Some(&first), false) = (start.first(), dest.is_empty()) else {
            return Ok(AutorouteResult::NotRouted);
        };

        let connected = board.connected_set(first, control.net_no);
        if dest.iter().any(|d| connected.contains(d)) {
            return Ok(AutorouteResult::AlreadyConnected);
        }

        let from = anchors(board, start, &fixed_points(board, dest));
        let to = anchors(board, dest, &fixed_points(board, start));

        let mut pairs: Vec<(f64, Anchor, Anchor)> = from
            .iter()
            .flat_map(|s| to.iter().map(move |d| (s.point.distance_square(d.point), *s, *d)))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut best: Option<Candidate> = None;
        for (_, s, d) in pairs.into_iter().take(MAX_CANDIDATE_PAIRS) {
            if self.params.time_limit.limit_exceeded() {
                break;
            }
            for layer in 0..board.layer_count() {
                let Some(candidate) = self.evaluate(board, s, d, layer, control) else {
                    continue;
                };
                if best.as_ref().is_none_or(|b| candidate.cost < b.cost) {
                    best = Some(candidate);
                }
            }
        }

        match best {
            Some(candidate) => {
                self.commit(board, candidate, control, ripped);
                Ok(AutorouteResult::Routed)
            }
            None if self.params.time_limit.limit_exceeded() => Ok(AutorouteResult::TimedOut),
            None => Ok(AutorouteResult::NotRouted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::trace_cost_table;
    use pcb_common::db::core::LayerDirection;
    use pcb_common::util::config::AutorouteConfig;
    use pcb_common::util::time_limit::{StopSignal, TimeLimit};

    fn board(layers: usize) -> BoardDb {
        let mut db = BoardDb::new();
        let dirs = [LayerDirection::Horizontal, LayerDirection::Vertical];
        for i in 0..layers {
            db.add_layer(format!("L{}", i), dirs[i % 2]);
        }
        db.add_net(NetId(1), "A".to_string(), 0);
        db.add_net(NetId(2), "B".to_string(), 0);
        db
    }

    fn pin(db: &mut BoardDb, net: u32, x: f64, y: f64, first: u8, last: u8) -> ItemId {
        db.add_item(
            vec![NetId(net)],
            ItemShape::Pin {
                center: Point::new(x, y),
                first_layer: first,
                last_layer: last,
            },
        )
    }

    fn control(db: &BoardDb) -> AutorouteControl {
        let dirs: Vec<_> = db.layers.iter().map(|l| l.direction).collect();
        let costs = trace_cost_table(&dirs, &AutorouteConfig::default());
        AutorouteControl::new(NetId(1), 0, 50, 0.2, costs)
    }

    fn attempt(db: &BoardDb, stop: StopSignal) -> DirectAttempt {
        DirectSearch::new(1000).init_attempt(
            db,
            AttemptParams {
                net: NetId(1),
                clearance_class: 0,
                stop,
                time_limit: TimeLimit::from_millis(60_000),
                retain_database: false,
            },
        )
    }

    fn route(
        db: &mut BoardDb,
        a: ItemId,
        b: ItemId,
        control: &AutorouteControl,
    ) -> (Result<AutorouteResult, SearchError>, ItemSet) {
        let mut ripped = ItemSet::new();
        let result = attempt(db, StopSignal::new()).autoroute_connection(
            db,
            &ItemSet::from([a]),
            &ItemSet::from([b]),
            control,
            &mut ripped,
        );
        (result, ripped)
    }

    #[test]
    fn test_routes_on_preferred_layer() {
        let mut db = board(2);
        let a = pin(&mut db, 1, 0.0, 0.0, 0, 1);
        let b = pin(&mut db, 1, 10.0, 0.0, 0, 1);
        let ctrl = control(&db);

        let (result, ripped) = route(&mut db, a, b, &ctrl);
        assert_eq!(result.unwrap(), AutorouteResult::Routed);
        assert!(ripped.is_empty());
        assert!(db.is_net_connected(NetId(1)));
        let traces = db.trace_segments();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].2, 0);
    }

    #[test]
    fn test_second_call_reports_already_connected() {
        let mut db = board(2);
        let a = pin(&mut db, 1, 0.0, 0.0, 0, 1);
        let b = pin(&mut db, 1, 10.0, 0.0, 0, 1);
        let ctrl = control(&db);

        route(&mut db, a, b, &ctrl).0.unwrap();
        let (again, _) = route(&mut db, a, b, &ctrl);
        assert_eq!(again.unwrap(), AutorouteResult::AlreadyConnected);
    }

    #[test]
    fn test_inserts_via_for_terminal_on_other_layer() {
        let mut db = board(2);
        let a = pin(&mut db, 1, 0.0, 0.0, 0, 0);
        let b = pin(&mut db, 1, 10.0, 0.0, 1, 1);
        let ctrl = control(&db);

        assert_eq!(route(&mut db, a, b, &ctrl).0.unwrap(), AutorouteResult::Routed);
        let vias = db
            .items()
            .filter(|it| matches!(it.shape, ItemShape::Via { .. }))
            .count();
        assert_eq!(vias, 1);
        assert!(db.is_net_connected(NetId(1)));
    }

    #[test]
    fn test_crossing_needs_ripup_permission_and_budget() {
        let mut db = board(1);
        let a = pin(&mut db, 1, 0.0, 0.0, 0, 0);
        let b = pin(&mut db, 1, 10.0, 0.0, 0, 0);
        let foreign = db.add_trace(
            NetId(2),
            FloatLine::new(Point::new(5.0, -5.0), Point::new(5.0, 5.0)),
            0,
            0.2,
        );
        let mut ctrl = control(&db);

        assert_eq!(route(&mut db, a, b, &ctrl).0.unwrap(), AutorouteResult::NotRouted);

        ctrl.ripup_allowed = true;
        ctrl.ripup_costs = 5000;
        assert_eq!(route(&mut db, a, b, &ctrl).0.unwrap(), AutorouteResult::NotRouted);

        ctrl.ripup_costs = 100;
        let (result, ripped) = route(&mut db, a, b, &ctrl);
        assert_eq!(result.unwrap(), AutorouteResult::Routed);
        assert_eq!(ripped, ItemSet::from([foreign]));
        assert!(db.item(foreign).is_none());
    }

    #[test]
    fn test_foreign_pin_blocks_the_line() {
        let mut db = board(1);
        let a = pin(&mut db, 1, 0.0, 0.0, 0, 0);
        let b = pin(&mut db, 1, 10.0, 0.0, 0, 0);
        pin(&mut db, 2, 5.0, 0.0, 0, 0);
        let mut ctrl = control(&db);
        ctrl.ripup_allowed = true;
        ctrl.ripup_costs = 100;

        assert_eq!(route(&mut db, a, b, &ctrl).0.unwrap(), AutorouteResult::NotRouted);
        assert!(db.trace_segments().is_empty());
    }

    #[test]
    fn test_reaches_plane_at_nearest_point() {
        let mut db = board(2);
        let p = pin(&mut db, 1, 5.0, 5.0, 0, 1);
        let plane = db.add_item(
            vec![NetId(1)],
            ItemShape::ConductionArea {
                area: pcb_common::geom::rect::Rect::new(
                    Point::new(0.0, -3.0),
                    Point::new(10.0, -1.0),
                ),
                layer: 1,
            },
        );
        let ctrl = control(&db);

        assert_eq!(route(&mut db, plane, p, &ctrl).0.unwrap(), AutorouteResult::Routed);
        assert!(db.is_net_connected(NetId(1)));
        let traces = db.trace_segments();
        assert_eq!(traces.len(), 1);
        assert!(traces[0].3.has_endpoint(Point::new(5.0, -1.0)));
    }

    #[test]
    fn test_unknown_item_and_stop() {
        let mut db = board(1);
        let a = pin(&mut db, 1, 0.0, 0.0, 0, 0);
        let b = pin(&mut db, 1, 10.0, 0.0, 0, 0);
        let ctrl = control(&db);

        let (result, _) = route(&mut db, a, ItemId(99), &ctrl);
        assert!(matches!(result, Err(SearchError::UnknownItem(ItemId(99)))));

        let stop = StopSignal::new();
        stop.request_stop();
        let result = attempt(&db, stop).autoroute_connection(
            &mut db,
            &ItemSet::from([a]),
            &ItemSet::from([b]),
            &ctrl,
            &mut ItemSet::new(),
        );
        assert_eq!(result.unwrap(), AutorouteResult::NotRouted);
    }
}
