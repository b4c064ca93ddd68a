use pcb_common::db::core::{ExpansionCostFactor, LayerDirection};
use pcb_common::db::indices::NetId;
use pcb_common::util::config::AutorouteConfig;
use std::sync::Arc;
use std::time::Duration;

/// Cap for the local pull-tight run after a routed connection and for cleanup,
/// in milliseconds.
pub const TIME_LIMIT_TO_PREVENT_ENDLESS_LOOP: u64 = 1000;

const BASE_SEARCH_MILLIS: f64 = 100_000.0;

/// `start_ripup_costs * pass_no`, saturating.
pub fn ripup_costs_for_pass(start_ripup_costs: u32, pass_no: u32) -> u32 {
    start_ripup_costs.saturating_mul(pass_no)
}

/// Search budget of one attempt: 100 s doubled for every pass after the first,
/// capped at `i32::MAX` milliseconds.
pub fn search_time_budget(pass_no: u32) -> Duration {
    let exponent = pass_no.saturating_sub(1).min(64) as i32;
    let millis = (BASE_SEARCH_MILLIS * 2f64.powi(exponent)).min(i32::MAX as f64);
    Duration::from_millis(millis as u64)
}

/// Per-layer trace costs. Without preferred directions every layer is equally
/// cheap in both directions.
pub fn trace_cost_table(
    layers: &[LayerDirection],
    config: &AutorouteConfig,
) -> Arc<[ExpansionCostFactor]> {
    let preferred = config.preferred_direction_trace_costs;
    let against = config.against_preferred_direction_trace_costs;
    layers
        .iter()
        .map(|direction| {
            if !config.with_preferred_directions {
                return ExpansionCostFactor::new(preferred, preferred);
            }
            match direction {
                LayerDirection::Horizontal => ExpansionCostFactor::new(preferred, against),
                LayerDirection::Vertical => ExpansionCostFactor::new(against, preferred),
                LayerDirection::Unknown => ExpansionCostFactor::new(preferred, preferred),
            }
        })
        .collect()
}

/// Parameters of a single route attempt. Built fresh for every item.
#[derive(Clone, Debug)]
pub struct AutorouteControl {
    pub net_no: NetId,
    pub ripup_allowed: bool,
    pub ripup_costs: u32,
    pub remove_unconnected_vias: bool,
    pub via_costs: u32,
    pub trace_clearance_class_no: usize,
    pub trace_width: f64,
    pub trace_costs: Arc<[ExpansionCostFactor]>,
}

impl AutorouteControl {
    pub fn new(
        net_no: NetId,
        trace_clearance_class_no: usize,
        via_costs: u32,
        trace_width: f64,
        trace_costs: Arc<[ExpansionCostFactor]>,
    ) -> Self {
        Self {
            net_no,
            ripup_allowed: false,
            ripup_costs: 0,
            remove_unconnected_vias: true,
            via_costs,
            trace_clearance_class_no,
            trace_width,
            trace_costs,
        }
    }

    pub fn layer_costs(&self, layer: u8) -> ExpansionCostFactor {
        self.trace_costs
            .get(layer as usize)
            .copied()
            .unwrap_or(ExpansionCostFactor::new(1.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ripup_costs_grow_linearly() {
        assert_eq!(ripup_costs_for_pass(100, 1), 100);
        assert_eq!(ripup_costs_for_pass(100, 7), 700);
        for pass in 1..50 {
            assert!(ripup_costs_for_pass(100, pass + 1) > ripup_costs_for_pass(100, pass));
        }
    }

    #[test]
    fn test_search_budget_doubles_then_caps() {
        assert_eq!(search_time_budget(1), Duration::from_millis(100_000));
        assert_eq!(search_time_budget(2), Duration::from_millis(200_000));
        assert_eq!(search_time_budget(5), Duration::from_millis(1_600_000));

        let cap = Duration::from_millis(i32::MAX as u64);
        let mut prev = Duration::ZERO;
        for pass in 1..200 {
            let budget = search_time_budget(pass);
            assert!(budget >= prev);
            assert!(budget <= cap);
            prev = budget;
        }
        assert_eq!(search_time_budget(u32::MAX), cap);
    }

    #[test]
    fn test_cost_table_without_preferred_directions_is_flat() {
        let layers = [LayerDirection::Horizontal, LayerDirection::Vertical];
        let mut config = AutorouteConfig::default();

        let table = trace_cost_table(&layers, &config);
        assert_eq!(table[0], ExpansionCostFactor::new(1.0, 2.5));
        assert_eq!(table[1], ExpansionCostFactor::new(2.5, 1.0));

        config.with_preferred_directions = false;
        let flat = trace_cost_table(&layers, &config);
        assert!(flat.iter().all(|c| *c == ExpansionCostFactor::new(1.0, 1.0)));
    }
}
