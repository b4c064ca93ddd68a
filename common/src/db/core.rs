use crate::db::indices::*;
use crate::db::item::{Item, ItemKind, ItemShape, StopConnectionOption, ordered_endpoints};
use crate::geom::line::{FloatLine, GEOM_TOLERANCE};
use crate::geom::point::Point;
use crate::geom::rect::Rect;
use crate::geom::rtree::SpatialIndex;
use crate::util::time_limit::{StopSignal, TimeLimit};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Layer indices are `u8`; the last value is kept free so `layer_count` fits too.
pub const MAX_LAYERS: usize = u8::MAX as usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerDirection {
    Vertical,
    Horizontal,
    Unknown,
}

#[derive(Clone, Debug)]
pub struct LayerData {
    pub name: String,
    pub index: u8,
    pub direction: LayerDirection,
}

#[derive(Clone, Debug)]
pub struct NetData {
    pub name: String,
    pub clearance_class: usize,
}

/// Trace cost per unit length in the two axis directions of one layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExpansionCostFactor {
    pub horizontal: f64,
    pub vertical: f64,
}

impl ExpansionCostFactor {
    pub fn new(horizontal: f64, vertical: f64) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    pub fn line_cost(&self, line: &FloatLine) -> f64 {
        line.dx() * self.horizontal + line.dy() * self.vertical
    }
}

#[derive(Clone, Debug)]
pub struct BoardDb {
    pub layers: Vec<LayerData>,
    pub clearance_classes: Vec<f64>,
    pub nets: BTreeMap<NetId, NetData>,
    items: BTreeMap<ItemId, Item>,
    next_item_id: ItemId,
    changed_area: Option<Rect>,
    optimize_runs: usize,
}

impl BoardDb {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            clearance_classes: vec![0.0],
            nets: BTreeMap::new(),
            items: BTreeMap::new(),
            next_item_id: ItemId::FIRST,
            changed_area: None,
            optimize_runs: 0,
        }
    }

    pub fn layer_count(&self) -> u8 {
        u8::try_from(self.layers.len()).unwrap_or(u8::MAX)
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    /// Appends a layer and returns its index, or `None` once `MAX_LAYERS` are in use.
    pub fn add_layer(&mut self, name: String, direction: LayerDirection) -> Option<u8> {
        let idx = u8::try_from(self.layers.len())
            .ok()
            .filter(|&i| usize::from(i) < MAX_LAYERS)?;
        self.layers.push(LayerData {
            name,
            index: idx,
            direction,
        });
        Some(idx)
    }

    pub fn add_net(&mut self, number: NetId, name: String, clearance_class: usize) -> NetId {
        self.nets.entry(number).or_insert(NetData {
            name,
            clearance_class,
        });
        number
    }

    pub fn clearance(&self, class: usize) -> f64 {
        self.clearance_classes.get(class).copied().unwrap_or(0.0)
    }

    /// Inserts an item with a fresh id. Does not touch the changed area.
    pub fn add_item(&mut self, nets: Vec<NetId>, shape: ItemShape) -> ItemId {
        let id = self.next_item_id;
        self.next_item_id = id.next();
        self.items.insert(id, Item { id, nets, shape });
        id
    }

    /// Inserts an item keeping its id, as read from a board file.
    pub fn insert_item(&mut self, item: Item) {
        self.next_item_id = self.next_item_id.max(item.id.next());
        self.items.insert(item.id, item);
    }

    pub fn add_trace(&mut self, net: NetId, line: FloatLine, layer: u8, width: f64) -> ItemId {
        self.mark_changed(line.bounding_box().expand(width * 0.5));
        self.add_item(vec![net], ItemShape::Trace { line, layer, width })
    }

    pub fn add_via(
        &mut self,
        net: NetId,
        center: Point<f64>,
        first_layer: u8,
        last_layer: u8,
    ) -> ItemId {
        self.mark_changed(Rect::new(center, center));
        self.add_item(
            vec![net],
            ItemShape::Via {
                center,
                first_layer: first_layer.min(last_layer),
                last_layer: first_layer.max(last_layer),
            },
        )
    }

    pub fn remove_item(&mut self, id: ItemId) -> Option<Item> {
        let removed = self.items.remove(&id)?;
        self.mark_changed(removed.bounding_box());
        Some(removed)
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Items of `net` in storage order.
    pub fn net_items(&self, net: NetId) -> Vec<ItemId> {
        self.items
            .values()
            .filter(|it| it.contains_net(net))
            .map(|it| it.id)
            .collect()
    }

    pub fn contains_plane(&self, net: NetId) -> bool {
        self.items
            .values()
            .any(|it| it.is_conduction_area() && it.contains_net(net))
    }

    pub fn connectable_item_count(&self, net: NetId) -> usize {
        self.items.values().filter(|it| it.contains_net(net)).count()
    }

    /// Items of `net` electrically joined to `start`, including `start` itself.
    pub fn connected_set(&self, start: ItemId, net: NetId) -> BTreeSet<ItemId> {
        let mut visited = BTreeSet::new();
        let Some(first) = self.items.get(&start) else {
            return visited;
        };
        if !first.contains_net(net) {
            return visited;
        }

        let candidates: Vec<&Item> = self
            .items
            .values()
            .filter(|it| it.contains_net(net))
            .collect();

        let mut queue = VecDeque::new();
        visited.insert(start);
        queue.push_back(first);

        while let Some(curr) = queue.pop_front() {
            for &cand in &candidates {
                if visited.contains(&cand.id) {
                    continue;
                }
                if curr.touches(cand) {
                    visited.insert(cand.id);
                    queue.push_back(cand);
                }
            }
        }
        visited
    }

    pub fn unconnected_set(&self, start: ItemId, net: NetId) -> BTreeSet<ItemId> {
        let connected = self.connected_set(start, net);
        self.items
            .values()
            .filter(|it| it.contains_net(net) && !connected.contains(&it.id))
            .map(|it| it.id)
            .collect()
    }

    pub fn is_net_connected(&self, net: NetId) -> bool {
        let members = self.net_items(net);
        match members.first() {
            Some(&first) => self.connected_set(first, net).len() == members.len(),
            None => true,
        }
    }

    /// Traces on `layer` not belonging to `net` that cross `line`.
    pub fn traces_crossing(&self, line: &FloatLine, layer: u8, net: NetId) -> Vec<ItemId> {
        self.items
            .values()
            .filter(|it| !it.contains_net(net))
            .filter_map(|it| {
                let (other, other_layer) = it.trace_line()?;
                (other_layer == layer && other.intersects(line)).then_some(it.id)
            })
            .collect()
    }

    /// Non-route items of other nets on `layer` within `clearance` of `line`.
    pub fn fixed_obstacles_near(
        &self,
        line: &FloatLine,
        layer: u8,
        net: NetId,
        clearance: f64,
    ) -> Vec<ItemId> {
        let limit = (clearance + GEOM_TOLERANCE).powi(2);
        self.items
            .values()
            .filter(|it| !it.is_route() && !it.contains_net(net) && it.is_on_layer(layer))
            .filter(|it| match it.shape {
                ItemShape::ConductionArea { area, .. } => area.expand(clearance).intersects_line(line),
                _ => it
                    .center()
                    .is_some_and(|c| line.distance_square_to(c) <= limit),
            })
            .map(|it| it.id)
            .collect()
    }

    pub fn start_marking_changed_area(&mut self) {
        self.changed_area = None;
    }

    pub fn mark_changed(&mut self, rect: Rect) {
        self.changed_area = Some(match self.changed_area {
            Some(prev) => prev.union(&rect),
            None => rect,
        });
    }

    pub fn changed_area(&self) -> Option<Rect> {
        self.changed_area
    }

    pub fn optimize_run_count(&self) -> usize {
        self.optimize_runs
    }

    fn contacts_at(&self, item: &Item, p: Point<f64>, layer: u8) -> usize {
        self.items
            .values()
            .filter(|o| o.id != item.id && o.shares_net(item) && o.touches_point(p, layer))
            .count()
    }

    fn contact_count(&self, item: &Item) -> usize {
        self.items
            .values()
            .filter(|o| o.id != item.id && o.shares_net(item) && o.touches(item))
            .count()
    }

    fn is_tail(&self, item: &Item, stop: StopConnectionOption) -> bool {
        match item.shape {
            ItemShape::Trace { line, layer, .. } => {
                self.contacts_at(item, line.a, layer) == 0
                    || self.contacts_at(item, line.b, layer) == 0
            }
            ItemShape::Via { .. } => match self.contact_count(item) {
                0 => true,
                1 => stop == StopConnectionOption::None,
                _ => false,
            },
            _ => false,
        }
    }

    /// Removes dangling traces and vias until none remain. `net == None` scans all nets.
    pub fn remove_trace_tails(&mut self, net: Option<NetId>, stop: StopConnectionOption) -> usize {
        let mut removed = 0;
        loop {
            let tails: Vec<ItemId> = self
                .items
                .values()
                .filter(|it| it.is_route())
                .filter(|it| net.is_none_or(|n| it.contains_net(n)))
                .filter(|it| self.is_tail(it, stop))
                .map(|it| it.id)
                .collect();
            if tails.is_empty() {
                break;
            }
            for id in tails {
                if self.remove_item(id).is_some() {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            log::debug!("Removed {} trace tails", removed);
        }
        removed
    }

    /// Drops vias of `net` that touch nothing of their net.
    pub fn remove_isolated_vias(&mut self, net: NetId) -> usize {
        let isolated: Vec<ItemId> = self
            .items
            .values()
            .filter(|it| it.kind() == ItemKind::Via && it.contains_net(net))
            .filter(|it| self.contact_count(it) == 0)
            .map(|it| it.id)
            .collect();
        isolated
            .into_iter()
            .filter(|&id| self.remove_item(id).is_some())
            .count()
    }

    fn trace_cost(&self, ids: &[ItemId], costs: &[ExpansionCostFactor]) -> f64 {
        ids.iter()
            .filter_map(|id| self.items.get(id)?.trace_line())
            .map(|(line, layer)| {
                costs
                    .get(layer as usize)
                    .map_or(line.length(), |c| c.line_cost(&line))
            })
            .sum()
    }

    /// Tightens the traces inside the changed area: drops degenerate and duplicate
    /// traces and merges collinear neighbours. Returns the number of edits.
    ///
    /// `accuracy` widens the optimized region in units of 1e-4 board units.
    pub fn opt_changed_area(
        &mut self,
        accuracy: u32,
        costs: &[ExpansionCostFactor],
        stop: &StopSignal,
        time_limit: TimeLimit,
    ) -> usize {
        self.optimize_runs += 1;
        let Some(area) = self.changed_area else {
            return 0;
        };
        let region = area.expand(accuracy as f64 * 1e-4);

        let index = SpatialIndex::bulk_load(
            self.items
                .values()
                .filter(|it| it.kind() == ItemKind::Trace)
                .map(|it| (it.bounding_box(), it.id)),
        );
        let in_region = index.query(region);
        let cost_before = self.trace_cost(&in_region, costs);

        let mut edits = 0;
        loop {
            if time_limit.limit_exceeded() || stop.is_stop_requested() {
                log::debug!("Changed area optimization cut short after {} edits", edits);
                break;
            }
            let round = self.remove_degenerate_traces(region) + self.merge_one_collinear(region);
            if round == 0 {
                break;
            }
            edits += round;
        }

        if edits > 0 {
            let after: Vec<ItemId> = SpatialIndex::bulk_load(
                self.items
                    .values()
                    .filter(|it| it.kind() == ItemKind::Trace)
                    .map(|it| (it.bounding_box(), it.id)),
            )
            .query(region);
            log::debug!(
                "Optimized changed area: {} edits, trace cost {:.1} -> {:.1}",
                edits,
                cost_before,
                self.trace_cost(&after, costs)
            );
        }
        edits
    }

    fn traces_in(&self, region: Rect) -> Vec<&Item> {
        self.items
            .values()
            .filter(|it| it.kind() == ItemKind::Trace && region.overlaps(&it.bounding_box()))
            .collect()
    }

    fn remove_degenerate_traces(&mut self, region: Rect) -> usize {
        let mut seen: HashMap<String, ItemId> = HashMap::new();
        let mut doomed = Vec::new();
        for it in self.traces_in(region) {
            let Some((line, _)) = it.trace_line() else {
                continue;
            };
            if line.is_point() {
                doomed.push(it.id);
                continue;
            }
            if seen.insert(it.canonical(), it.id).is_some() {
                doomed.push(it.id);
            }
        }
        doomed
            .into_iter()
            .filter(|&id| self.remove_item(id).is_some())
            .count()
    }

    fn merge_one_collinear(&mut self, region: Rect) -> usize {
        let mut merge: Option<(ItemId, ItemId, FloatLine, u8, f64)> = None;

        'outer: for first in self.traces_in(region) {
            let ItemShape::Trace { line, layer, width } = first.shape else {
                continue;
            };
            for joint in [line.a, line.b] {
                let touching: Vec<&Item> = self
                    .items
                    .values()
                    .filter(|o| {
                        o.id != first.id && o.shares_net(first) && o.touches_point(joint, layer)
                    })
                    .collect();
                let [second] = touching.as_slice() else {
                    continue;
                };
                let ItemShape::Trace {
                    line: other,
                    width: other_width,
                    ..
                } = second.shape
                else {
                    continue;
                };
                if second.nets != first.nets || !line.is_collinear_with(&other) {
                    continue;
                }
                let far_self = if line.a.approx_eq(joint, GEOM_TOLERANCE) {
                    line.b
                } else {
                    line.a
                };
                let far_other = if other.a.approx_eq(joint, GEOM_TOLERANCE) {
                    other.b
                } else {
                    other.a
                };
                // Folding back onto itself is not a straight continuation.
                let dir_self = far_self - joint;
                let dir_other = far_other - joint;
                if dir_self.x * dir_other.x + dir_self.y * dir_other.y >= 0.0 {
                    continue;
                }
                merge = Some((
                    first.id,
                    second.id,
                    FloatLine::new(far_self, far_other),
                    layer,
                    width.max(other_width),
                ));
                break 'outer;
            }
        }

        let Some((a, b, line, layer, width)) = merge else {
            return 0;
        };
        let nets = self.items.get(&a).map(|it| it.nets.clone()).unwrap_or_default();
        self.remove_item(a);
        self.remove_item(b);
        self.mark_changed(line.bounding_box());
        self.add_item(nets, ItemShape::Trace { line, layer, width });
        1
    }

    /// SHA-256 over the canonical item listing. Item ids do not contribute.
    pub fn fingerprint(&self) -> String {
        let mut lines: Vec<String> = self.items.values().map(Item::canonical).collect();
        lines.sort_unstable();
        let mut hasher = Sha256::new();
        hasher.update(self.layers.len().to_le_bytes());
        for line in &lines {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    /// Number of traces present on only one of the two boards.
    pub fn diff_traces(&self, before: &BoardDb) -> usize {
        let mut counts: HashMap<String, i64> = HashMap::new();
        for it in self.items.values().filter(|it| it.kind() == ItemKind::Trace) {
            *counts.entry(it.canonical()).or_insert(0) += 1;
        }
        for it in before.items.values().filter(|it| it.kind() == ItemKind::Trace) {
            *counts.entry(it.canonical()).or_insert(0) -= 1;
        }
        counts.values().map(|c| c.unsigned_abs() as usize).sum()
    }

    /// Trace endpoints in a stable order, used by verification.
    pub fn trace_segments(&self) -> Vec<(ItemId, NetId, u8, FloatLine)> {
        self.items
            .values()
            .filter_map(|it| {
                let (line, layer) = it.trace_line()?;
                let (a, b) = ordered_endpoints(&line);
                Some((it.id, *it.nets.first()?, layer, FloatLine::new(a, b)))
            })
            .collect()
    }
}

impl Default for BoardDb {
    fn default() -> Self {
        Self::new()
    }
}
