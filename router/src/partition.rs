use crate::board::RoutingBoard;
use pcb_common::db::indices::{ItemId, NetId};
use std::collections::{BTreeMap, BTreeSet};

/// Items of one net that still have to be connected in the current pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetWorkList {
    pub net: NetId,
    pub items: Vec<ItemId>,
}

/// Scans every net once and collects the terminals not yet joined to the rest
/// of their net. Nets without work are left out; the result is ordered by
/// ascending net number.
pub fn collect_work<B: RoutingBoard + ?Sized>(board: &B) -> Vec<NetWorkList> {
    let mut lists: BTreeMap<NetId, Vec<ItemId>> = BTreeMap::new();
    // Single-net items already covered by a connected set. They would only
    // rediscover the same unconnected part of their net.
    let mut handled: BTreeSet<ItemId> = BTreeSet::new();

    for net in board.nets() {
        let net_item_count = board.connectable_item_count(net);
        for item in board.items_of_net(net) {
            if board.is_route(item) || handled.contains(&item) {
                continue;
            }
            let connected = board.connected_set(item, net);
            for &member in &connected {
                if board.net_count(member) <= 1 {
                    handled.insert(member);
                }
            }
            if connected.len() < net_item_count {
                lists.entry(net).or_default().push(item);
            }
        }
    }

    lists
        .into_iter()
        .map(|(net, items)| NetWorkList { net, items })
        .collect()
}

pub fn total_items(work: &[NetWorkList]) -> usize {
    work.iter().map(|w| w.items.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcb_common::db::core::{BoardDb, LayerDirection};
    use pcb_common::db::item::ItemShape;
    use pcb_common::geom::line::FloatLine;
    use pcb_common::geom::point::Point;
    use std::collections::HashSet;

    fn board() -> BoardDb {
        let mut db = BoardDb::new();
        db.add_layer("Top".to_string(), LayerDirection::Horizontal);
        db.add_layer("Bottom".to_string(), LayerDirection::Vertical);
        db
    }

    fn pin(db: &mut BoardDb, nets: &[u32], x: f64, y: f64) -> ItemId {
        db.add_item(
            nets.iter().map(|&n| NetId(n)).collect(),
            ItemShape::Pin {
                center: Point::new(x, y),
                first_layer: 0,
                last_layer: 1,
            },
        )
    }

    fn line(ax: f64, ay: f64, bx: f64, by: f64) -> FloatLine {
        FloatLine::new(Point::new(ax, ay), Point::new(bx, by))
    }

    #[test]
    fn test_connected_group_enqueues_one_representative() {
        let mut db = board();
        db.add_net(NetId(1), "A".to_string(), 0);
        let a = pin(&mut db, &[1], 0.0, 0.0);
        pin(&mut db, &[1], 10.0, 0.0);
        let c = pin(&mut db, &[1], 50.0, 50.0);
        db.add_trace(NetId(1), line(0.0, 0.0, 10.0, 0.0), 0, 0.2);

        let work = collect_work(&db);
        assert_eq!(
            work,
            vec![NetWorkList {
                net: NetId(1),
                items: vec![a, c],
            }]
        );
    }

    #[test]
    fn test_routed_board_yields_no_work() {
        let mut db = board();
        db.add_net(NetId(1), "A".to_string(), 0);
        db.add_net(NetId(2), "B".to_string(), 0);
        pin(&mut db, &[1], 0.0, 0.0);
        pin(&mut db, &[1], 10.0, 0.0);
        pin(&mut db, &[2], 0.0, 5.0);
        pin(&mut db, &[2], 0.0, 9.0);
        db.add_trace(NetId(1), line(0.0, 0.0, 10.0, 0.0), 0, 0.2);
        db.add_trace(NetId(2), line(0.0, 5.0, 0.0, 9.0), 1, 0.2);

        assert!(collect_work(&db).is_empty());
    }

    #[test]
    fn test_multi_net_item_is_listed_per_net_without_duplicates() {
        let mut db = board();
        for n in 1..=3 {
            db.add_net(NetId(n), format!("N{}", n), 0);
        }
        let shared = pin(&mut db, &[1, 2], 0.0, 0.0);
        let p1 = pin(&mut db, &[1], 10.0, 0.0);
        let p2 = pin(&mut db, &[2], 0.0, 10.0);
        let q1 = pin(&mut db, &[3], 20.0, 20.0);
        let q2 = pin(&mut db, &[3], 30.0, 20.0);

        let work = collect_work(&db);
        assert_eq!(work.iter().map(|w| w.net).collect::<Vec<_>>(), vec![
            NetId(1),
            NetId(2),
            NetId(3)
        ]);

        let mut pairs = HashSet::new();
        for list in &work {
            for &item in &list.items {
                assert!(pairs.insert((item, list.net)), "duplicate {:?}", item);
            }
        }
        for expected in [
            (shared, NetId(1)),
            (p1, NetId(1)),
            (shared, NetId(2)),
            (p2, NetId(2)),
            (q1, NetId(3)),
            (q2, NetId(3)),
        ] {
            assert!(pairs.contains(&expected), "missing {:?}", expected);
        }
        assert_eq!(total_items(&work), 6);
    }

    #[test]
    fn test_traces_are_never_starting_points() {
        let mut db = board();
        db.add_net(NetId(1), "A".to_string(), 0);
        let a = pin(&mut db, &[1], 0.0, 0.0);
        let b = pin(&mut db, &[1], 40.0, 0.0);
        db.add_trace(NetId(1), line(0.0, 0.0, 10.0, 0.0), 0, 0.2);

        let work = collect_work(&db);
        assert_eq!(work.len(), 1);
        assert_eq!(work[0].items, vec![a, b]);
    }
}
