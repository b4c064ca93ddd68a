use crate::db::core::{BoardDb, LayerDirection};
use crate::db::indices::NetId;
use crate::db::item::ItemShape;
use crate::geom::point::Point;
use crate::geom::rect::Rect;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

const GRID_STEP: f64 = 2.5;

/// Builds an unrouted two-layer board with `num_nets` nets of `pins_per_net`
/// pins on a square grid. With `with_plane` the first net also owns a
/// conduction area on the bottom layer.
pub fn generate_random_board(num_nets: usize, pins_per_net: usize, with_plane: bool) -> BoardDb {
    let mut rng = rand::thread_rng();

    let pins_per_net = pins_per_net.max(2);
    let total_pins = num_nets * pins_per_net;
    // Keep the pin density around one in four grid sites.
    let side = ((total_pins * 4) as f64).sqrt().ceil().max(4.0) as u32;

    log::info!(
        "Generating Board: {} nets x {} pins on a {}x{} grid",
        num_nets,
        pins_per_net,
        side,
        side
    );

    let mut db = BoardDb::new();
    db.add_layer("F.Cu".to_string(), LayerDirection::Horizontal);
    db.add_layer("B.Cu".to_string(), LayerDirection::Vertical);
    db.clearance_classes = vec![0.0, 0.2];

    let mut sites: Vec<(u32, u32)> = (0..side)
        .flat_map(|x| (0..side).map(move |y| (x, y)))
        .collect();
    sites.shuffle(&mut rng);
    let mut used = HashSet::new();
    let mut next_site = sites.into_iter();

    for n in 0..num_nets {
        let Some(net) = NetId::from_index(n) else {
            break;
        };
        db.add_net(net, format!("net{}", net.0), rng.gen_range(0..2));
        for _ in 0..pins_per_net {
            let Some((x, y)) = next_site.by_ref().find(|s| used.insert(*s)) else {
                break;
            };
            db.add_item(
                vec![net],
                ItemShape::Pin {
                    center: Point::new(x as f64 * GRID_STEP, y as f64 * GRID_STEP),
                    first_layer: 0,
                    last_layer: 1,
                },
            );
        }
    }

    if with_plane && num_nets > 0 {
        let extent = side as f64 * GRID_STEP;
        let band = Rect::new(Point::new(0.0, -GRID_STEP), Point::new(extent, -0.5 * GRID_STEP));
        db.add_item(
            vec![NetId(1)],
            ItemShape::ConductionArea {
                area: band,
                layer: 1,
            },
        );
    }

    db
}
