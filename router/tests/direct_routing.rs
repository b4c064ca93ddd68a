use pcb_common::db::core::{BoardDb, LayerDirection};
use pcb_common::db::indices::NetId;
use pcb_common::db::item::ItemShape;
use pcb_common::geom::point::Point;
use pcb_common::util::check;
use pcb_common::util::config::AutorouteConfig;
use pcb_common::util::time_limit::StopSignal;
use pcb_router::batch::{BatchAutorouter, RunOutcome};
use pcb_router::board::ItemSet;
use pcb_router::control::AutorouteControl;
use pcb_router::engine::direct::{DirectAttempt, DirectSearch};
use pcb_router::engine::{AttemptParams, AutorouteResult, ConnectionSearch, PathSearch, SearchError};
use pcb_router::stats::SilentProgress;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Probe {
    inside: AtomicUsize,
    max_inside: AtomicUsize,
    intervals: Mutex<Vec<(Instant, Instant)>>,
}

/// Reference engine that records when each search enters and leaves.
struct Instrumented {
    inner: DirectSearch,
    probe: Arc<Probe>,
}

struct InstrumentedAttempt {
    inner: DirectAttempt,
    probe: Arc<Probe>,
}

impl PathSearch<BoardDb> for Instrumented {
    type Attempt = InstrumentedAttempt;

    fn init_attempt(&self, board: &BoardDb, params: AttemptParams) -> InstrumentedAttempt {
        InstrumentedAttempt {
            inner: self.inner.init_attempt(board, params),
            probe: Arc::clone(&self.probe),
        }
    }
}

impl ConnectionSearch<BoardDb> for InstrumentedAttempt {
    fn autoroute_connection(
        &mut self,
        board: &mut BoardDb,
        start: &ItemSet,
        dest: &ItemSet,
        control: &AutorouteControl,
        ripped: &mut ItemSet,
    ) -> Result<AutorouteResult, SearchError> {
        let entered = Instant::now();
        let before = self.probe.inside.fetch_add(1, Ordering::SeqCst);
        self.probe.max_inside.fetch_max(before + 1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(2));

        let result = self
            .inner
            .autoroute_connection(board, start, dest, control, ripped);

        self.probe.inside.fetch_sub(1, Ordering::SeqCst);
        self.probe
            .intervals
            .lock()
            .unwrap()
            .push((entered, Instant::now()));
        result
    }
}

fn board(layers: usize) -> BoardDb {
    let mut db = BoardDb::new();
    let dirs = [LayerDirection::Horizontal, LayerDirection::Vertical];
    for i in 0..layers {
        db.add_layer(format!("L{}", i), dirs[i % 2]);
    }
    db
}

fn pin(db: &mut BoardDb, net: u32, x: f64, y: f64) -> pcb_common::db::indices::ItemId {
    let last_layer = db.layer_count() - 1;
    db.add_item(
        vec![NetId(net)],
        ItemShape::Pin {
            center: Point::new(x, y),
            first_layer: 0,
            last_layer,
        },
    )
}

/// Parallel rows that route without any conflict.
fn rows(nets: u32) -> BoardDb {
    let mut db = board(2);
    for n in 1..=nets {
        db.add_net(NetId(n), format!("N{}", n), 0);
        let y = 3.0 * n as f64;
        pin(&mut db, n, 0.0, y);
        pin(&mut db, n, 10.0, y);
        pin(&mut db, n, 20.0, y);
    }
    db
}

#[test]
fn test_route_and_commit_never_overlap() {
    let lock = RwLock::new(rows(12));
    let engine = Instrumented {
        inner: DirectSearch::new(1000),
        probe: Arc::new(Probe::default()),
    };
    let config = AutorouteConfig {
        thread_count: 6,
        ..AutorouteConfig::default()
    };

    let outcome = BatchAutorouter::new(&lock, &engine, StopSignal::new(), &config)
        .with_progress(Arc::new(SilentProgress))
        .autoroute_passes();
    assert_eq!(outcome, RunOutcome::Converged);

    assert_eq!(engine.probe.max_inside.load(Ordering::SeqCst), 1);
    let mut intervals = engine.probe.intervals.lock().unwrap().clone();
    assert!(intervals.len() >= 12);
    intervals.sort_by_key(|&(enter, _)| enter);
    for pair in intervals.windows(2) {
        assert!(pair[1].0 >= pair[0].1, "critical sections overlap");
    }

    let db = lock.into_inner().unwrap();
    assert!(check::unrouted_nets(&db).is_empty());
    assert!(check::run(&db).is_ok());
}

#[test]
fn test_route_completes_a_simple_board() {
    let mut db = rows(5);
    let config = AutorouteConfig {
        thread_count: 2,
        ..AutorouteConfig::default()
    };

    let outcome = pcb_router::route(&mut db, &config, &StopSignal::new(), Arc::new(SilentProgress));

    assert_eq!(outcome, RunOutcome::Converged);
    assert!(outcome.is_completed());
    assert!(check::run(&db).is_ok());
    assert!(pcb_router::remaining_air_lines(&db).is_empty());
    // The middle pin keeps the two traces of a row from merging.
    assert_eq!(db.trace_segments().len(), 10);
}

#[test]
fn test_crossing_nets_on_one_layer_stall() {
    let mut db = board(1);
    db.add_net(NetId(1), "H".to_string(), 0);
    db.add_net(NetId(2), "V".to_string(), 0);
    pin(&mut db, 1, 0.0, 5.0);
    pin(&mut db, 1, 10.0, 5.0);
    pin(&mut db, 2, 5.0, 0.0);
    pin(&mut db, 2, 5.0, 10.0);
    let config = AutorouteConfig {
        thread_count: 1,
        ..AutorouteConfig::default()
    };
    let stop = StopSignal::new();

    let outcome = pcb_router::route(&mut db, &config, &stop, Arc::new(SilentProgress));

    assert_eq!(outcome, RunOutcome::Stalled);
    assert!(stop.is_stop_requested());
    assert_eq!(check::unrouted_nets(&db).len(), 1);
    assert_eq!(pcb_router::remaining_air_lines(&db).len(), 1);
    assert!(check::run(&db).is_err());
}

#[test]
fn test_optimize_counts_the_confirming_pass() {
    let mut db = rows(3);
    let config = AutorouteConfig::default();

    let passes = pcb_router::optimize(&mut db, &config, &StopSignal::new(), 5, 100);

    assert_eq!(passes, 2);
    assert!(check::unrouted_nets(&db).is_empty());
}

#[test]
fn test_optimize_gives_up_after_max_passes() {
    let mut db = board(1);
    db.add_net(NetId(1), "A".to_string(), 0);
    db.add_net(NetId(2), "B".to_string(), 0);
    pin(&mut db, 1, 0.0, 0.0);
    pin(&mut db, 1, 10.0, 0.0);
    // Blocks the only straight line between the two pins of net 1.
    pin(&mut db, 2, 5.0, 0.0);
    pin(&mut db, 2, 5.0, 30.0);
    let config = AutorouteConfig::default();

    let passes = pcb_router::optimize(&mut db, &config, &StopSignal::new(), 2, 100);

    assert_eq!(passes, 3);
    assert_eq!(check::unrouted_nets(&db), vec![NetId(1)]);
}
