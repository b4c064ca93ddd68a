use super::{ItemSet, RoutingBoard};
use pcb_common::db::core::{BoardDb, ExpansionCostFactor, LayerDirection};
use pcb_common::db::indices::{ItemId, NetId};
use pcb_common::db::item::StopConnectionOption;
use pcb_common::geom::point::Point;
use pcb_common::util::time_limit::{StopSignal, TimeLimit};

impl RoutingBoard for BoardDb {
    type Snapshot = BoardDb;

    fn nets(&self) -> Vec<NetId> {
        self.nets.keys().copied().collect()
    }

    fn items_of_net(&self, net: NetId) -> Vec<ItemId> {
        self.net_items(net)
    }

    fn layer_directions(&self) -> Vec<LayerDirection> {
        self.layers.iter().map(|l| l.direction).collect()
    }

    fn net_count(&self, item: ItemId) -> usize {
        self.item(item).map_or(0, |it| it.net_count())
    }

    fn is_route(&self, item: ItemId) -> bool {
        self.item(item).is_some_and(|it| it.is_route())
    }

    fn is_conduction_area(&self, item: ItemId) -> bool {
        self.item(item).is_some_and(|it| it.is_conduction_area())
    }

    fn drill_center(&self, item: ItemId) -> Option<Point<f64>> {
        self.item(item)?.center()
    }

    fn net_contains_plane(&self, net: NetId) -> bool {
        self.contains_plane(net)
    }

    fn clearance_class(&self, net: NetId) -> usize {
        self.nets.get(&net).map_or(0, |n| n.clearance_class)
    }

    fn connected_set(&self, item: ItemId, net: NetId) -> ItemSet {
        BoardDb::connected_set(self, item, net)
    }

    fn unconnected_set(&self, item: ItemId, net: NetId) -> ItemSet {
        BoardDb::unconnected_set(self, item, net)
    }

    fn connectable_item_count(&self, net: NetId) -> usize {
        BoardDb::connectable_item_count(self, net)
    }

    fn start_marking_changed_area(&mut self) {
        BoardDb::start_marking_changed_area(self)
    }

    fn remove_trace_tails(&mut self, net: Option<NetId>, stop: StopConnectionOption) -> usize {
        BoardDb::remove_trace_tails(self, net, stop)
    }

    fn opt_changed_area(
        &mut self,
        accuracy: u32,
        costs: &[ExpansionCostFactor],
        stop: &StopSignal,
        time_limit: TimeLimit,
    ) -> usize {
        BoardDb::opt_changed_area(self, accuracy, costs, stop, time_limit)
    }

    fn snapshot(&self) -> BoardDb {
        self.clone()
    }

    fn fingerprint(&self) -> String {
        BoardDb::fingerprint(self)
    }

    fn diff_traces(&self, before: &BoardDb) -> usize {
        BoardDb::diff_traces(self, before)
    }
}
