use crate::db::core::BoardDb;
use crate::db::indices::NetId;
use rayon::prelude::*;

const MAX_REPORTED: usize = 10;

pub fn run(db: &BoardDb) -> Result<(), String> {
    log::info!("Starting Board Verification (shorts / opens)");

    let (shorts_result, opens_result) = rayon::join(|| check_shorts(db), || check_opens(db));

    let mut valid = true;
    let mut msgs = Vec::new();

    match shorts_result {
        Err(e) => {
            log::error!("\x1b[31mFAIL\x1b[0m: Crossing traces of different nets");
            log::error!("{}", e);
            msgs.push(e);
            valid = false;
        }
        Ok(_) => log::info!("\x1b[32mPASS\x1b[0m: No shorts found."),
    }

    match opens_result {
        Err(e) => {
            log::error!("\x1b[31mFAIL\x1b[0m: Open net (disconnected) detected");
            log::error!("{}", e);
            msgs.push(e);
            valid = false;
        }
        Ok(_) => log::info!("\x1b[32mPASS\x1b[0m: All nets are fully connected."),
    }

    if valid {
        log::info!("\x1b[32mSUCCESS\x1b[0m: BOARD COMPLETE");
        Ok(())
    } else {
        log::error!(
            "\x1b[31mFAILURE\x1b[0m: BOARD INCOMPLETE ({} Errors)",
            msgs.len()
        );
        Err(msgs.join("; "))
    }
}

/// Nets whose items are not all joined, in ascending order.
pub fn unrouted_nets(db: &BoardDb) -> Vec<NetId> {
    let nets: Vec<NetId> = db.nets.keys().copied().collect();
    let mut open: Vec<NetId> = nets
        .par_iter()
        .filter(|&&net| !db.is_net_connected(net))
        .copied()
        .collect();
    open.sort_unstable();
    open
}

fn check_opens(db: &BoardDb) -> Result<(), String> {
    let open = unrouted_nets(db);
    if open.is_empty() {
        return Ok(());
    }
    let names: Vec<String> = open
        .iter()
        .take(MAX_REPORTED)
        .map(|id| {
            db.nets
                .get(id)
                .map_or_else(|| format!("{:?}", id), |n| n.name.clone())
        })
        .collect();
    Err(format!(
        "{} open nets (first: {})",
        open.len(),
        names.join(", ")
    ))
}

fn check_shorts(db: &BoardDb) -> Result<(), String> {
    let segments = db.trace_segments();

    let mut shorts: Vec<String> = (0..segments.len())
        .into_par_iter()
        .flat_map_iter(|i| {
            let (id_a, net_a, layer_a, line_a) = segments[i];
            segments[i + 1..]
                .iter()
                .filter(move |(_, net_b, layer_b, line_b)| {
                    *net_b != net_a && *layer_b == layer_a && line_a.intersects(line_b)
                })
                .map(move |(id_b, _, _, _)| format!("{:?} x {:?}", id_a, id_b))
        })
        .collect();

    if shorts.is_empty() {
        return Ok(());
    }
    let total = shorts.len();
    shorts.truncate(MAX_REPORTED);
    Err(format!("{} shorts ({})", total, shorts.join(", ")))
}
