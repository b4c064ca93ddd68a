pub mod db;

use pcb_common::db::core::{ExpansionCostFactor, LayerDirection};
use pcb_common::db::indices::{ItemId, NetId};
use pcb_common::db::item::StopConnectionOption;
use pcb_common::geom::point::Point;
use pcb_common::util::time_limit::{StopSignal, TimeLimit};
use std::collections::BTreeSet;

pub type ItemSet = BTreeSet<ItemId>;

/// The board as seen by the batch scheduler. Reads may run on several workers at
/// once; mutation only happens through `&mut self` inside the route critical
/// section or during single-threaded cleanup.
pub trait RoutingBoard: Send + Sync {
    type Snapshot: Send;

    /// Net numbers in ascending order.
    fn nets(&self) -> Vec<NetId>;
    fn items_of_net(&self, net: NetId) -> Vec<ItemId>;
    fn layer_directions(&self) -> Vec<LayerDirection>;

    fn net_count(&self, item: ItemId) -> usize;
    fn is_route(&self, item: ItemId) -> bool;
    fn is_conduction_area(&self, item: ItemId) -> bool;
    /// Centre of a pin or via; `None` for everything else.
    fn drill_center(&self, item: ItemId) -> Option<Point<f64>>;

    fn net_contains_plane(&self, net: NetId) -> bool;
    fn clearance_class(&self, net: NetId) -> usize;

    fn connected_set(&self, item: ItemId, net: NetId) -> ItemSet;
    fn unconnected_set(&self, item: ItemId, net: NetId) -> ItemSet;
    fn connectable_item_count(&self, net: NetId) -> usize;

    fn start_marking_changed_area(&mut self);
    fn remove_trace_tails(&mut self, net: Option<NetId>, stop: StopConnectionOption) -> usize;
    fn opt_changed_area(
        &mut self,
        accuracy: u32,
        costs: &[ExpansionCostFactor],
        stop: &StopSignal,
        time_limit: TimeLimit,
    ) -> usize;

    fn snapshot(&self) -> Self::Snapshot;
    fn fingerprint(&self) -> String;
    /// Count of trace segments that differ between `before` and now.
    fn diff_traces(&self, before: &Self::Snapshot) -> usize;
}
