use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub autoroute: AutorouteConfig,
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AutorouteConfig {
    #[serde(default = "default_start_pass_no")]
    pub start_pass_no: u32,
    #[serde(default = "default_stop_pass_no")]
    pub stop_pass_no: u32,
    #[serde(default = "default_start_ripup_costs")]
    pub start_ripup_costs: u32,
    #[serde(default = "default_via_costs")]
    pub via_costs: u32,
    #[serde(default = "default_plane_via_costs")]
    pub plane_via_costs: u32,
    #[serde(default = "default_preferred_direction_trace_costs")]
    pub preferred_direction_trace_costs: f64,
    #[serde(default = "default_against_preferred_direction_trace_costs")]
    pub against_preferred_direction_trace_costs: f64,
    #[serde(default = "default_true")]
    pub with_preferred_directions: bool,
    #[serde(default = "default_true")]
    pub remove_unconnected_vias: bool,
    #[serde(default)]
    pub retain_autoroute_database: bool,
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,
    #[serde(default = "default_trace_pull_tight_accuracy")]
    pub trace_pull_tight_accuracy: u32,
    #[serde(default = "default_true")]
    pub progress_messages: bool,
    #[serde(default = "default_ripup_budget")]
    pub ripup_budget: u32,
    #[serde(default = "default_trace_width")]
    pub trace_width: f64,
}

impl Default for AutorouteConfig {
    fn default() -> Self {
        Self {
            start_pass_no: default_start_pass_no(),
            stop_pass_no: default_stop_pass_no(),
            start_ripup_costs: default_start_ripup_costs(),
            via_costs: default_via_costs(),
            plane_via_costs: default_plane_via_costs(),
            preferred_direction_trace_costs: default_preferred_direction_trace_costs(),
            against_preferred_direction_trace_costs:
                default_against_preferred_direction_trace_costs(),
            with_preferred_directions: true,
            remove_unconnected_vias: true,
            retain_autoroute_database: false,
            thread_count: default_thread_count(),
            trace_pull_tight_accuracy: default_trace_pull_tight_accuracy(),
            progress_messages: true,
            ripup_budget: default_ripup_budget(),
            trace_width: default_trace_width(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_board_file")]
    pub board_file: String,
    #[serde(default = "default_output_board")]
    pub output_board: String,
    #[serde(default)]
    pub visualization: Option<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            board_file: default_board_file(),
            output_board: default_output_board(),
            visualization: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_start_pass_no() -> u32 {
    1
}

fn default_stop_pass_no() -> u32 {
    99
}

fn default_start_ripup_costs() -> u32 {
    100
}

fn default_via_costs() -> u32 {
    50
}

fn default_plane_via_costs() -> u32 {
    5
}

fn default_preferred_direction_trace_costs() -> f64 {
    1.0
}

fn default_against_preferred_direction_trace_costs() -> f64 {
    2.5
}

fn default_thread_count() -> usize {
    8
}

fn default_trace_pull_tight_accuracy() -> u32 {
    500
}

fn default_ripup_budget() -> u32 {
    1000
}

fn default_trace_width() -> f64 {
    0.25
}

fn default_board_file() -> String {
    "inputs/board.toml".to_string()
}

fn default_output_board() -> String {
    "output/routed.toml".to_string()
}
