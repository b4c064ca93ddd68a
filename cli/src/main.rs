use clap::{Parser, Subcommand};
use pcb_common::db::core::BoardDb;
use pcb_common::db::parser::board;
use pcb_common::util::config::Config;
use pcb_common::util::time_limit::StopSignal;
use pcb_common::util::{check, generator, logger, visualization};
use pcb_router::stats::{BatchInfo, LogProgress, ProgressSink};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ripup-and-reroute the input board until it is complete or stops improving.
    Route,
    /// Bounded run with a fixed ripup cost base; prints the passes needed.
    Optimize {
        #[arg(long, default_value_t = 6)]
        max_passes: u32,
        #[arg(long, default_value_t = 100)]
        ripup_costs: u32,
    },
    Generate {
        #[arg(long, default_value_t = 40)]
        nets: usize,
        #[arg(long, default_value_t = 3)]
        pins_per_net: usize,
        #[arg(long)]
        plane: bool,
        #[arg(long, default_value = "inputs/board.toml")]
        output: String,
    },
    /// Verify the routed board for shorts and open nets.
    Check,
}

/// Redraws a single status line on stderr.
struct TerminalProgress;

impl ProgressSink for TerminalProgress {
    fn status(&self, pass_no: u32) {
        LogProgress.status(pass_no);
    }

    fn batch_info(&self, info: BatchInfo) {
        eprint!(
            "\r\x1b[36mto go: {:>6} | routed: {:>6} | ripped: {:>6} | failed: {:>6}\x1b[0m",
            info.items_to_go, info.routed, info.ripped_items, info.not_found
        );
        let _ = std::io::stderr().flush();
    }
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let config_str = std::fs::read_to_string(&args.config)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };

    match args.command.unwrap_or(Commands::Route) {
        Commands::Generate {
            nets,
            pins_per_net,
            plane,
            output,
        } => {
            prepare_output_dir(&output)?;
            let db = generator::generate_random_board(nets, pins_per_net, plane);
            board::save(&db, &output)?;
            log::info!("Generated: {}", output);
        }
        Commands::Route => {
            let mut db = load_board(&config.input.board_file)?;
            let stop = install_stop_handler();
            let outcome = pcb_router::route(
                &mut db,
                &config.autoroute,
                &stop,
                Arc::new(TerminalProgress),
            );
            eprintln!();
            log::info!("Routing ended: {:?}", outcome);
            finish(&db, &config)?;
            if !outcome.is_completed() {
                std::process::exit(1);
            }
        }
        Commands::Optimize {
            max_passes,
            ripup_costs,
        } => {
            let mut db = load_board(&config.input.board_file)?;
            let stop = install_stop_handler();
            let passes = pcb_router::optimize(
                &mut db,
                &config.autoroute,
                &stop,
                max_passes,
                ripup_costs,
            );
            if passes > max_passes {
                log::warn!("Board not complete after {} passes", max_passes);
            } else {
                log::info!("Board complete after {} passes", passes);
            }
            finish(&db, &config)?;
        }
        Commands::Check => {
            let db = load_board(&config.input.output_board)?;
            if check::run(&db).is_err() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Ctrl-C asks the autorouter to stop after the current attempt; the partial
/// board is still written out.
fn install_stop_handler() -> StopSignal {
    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        log::warn!("Interrupt received, stopping after the current attempt...");
        handler_stop.request_stop();
    }) {
        log::warn!("Could not install Ctrl-C handler: {}", e);
    }
    stop
}

fn load_board(path: &str) -> anyhow::Result<BoardDb> {
    if !Path::new(path).exists() {
        return Err(anyhow::anyhow!(
            "Input board missing: '{}'. Did you run 'generate'?",
            path
        ));
    }
    log::info!("Parsing board: {}", path);
    let db = board::parse(path)
        .map_err(|e| anyhow::anyhow!("Invalid board file '{}': {}", path, e))?;
    log::info!(
        "Loaded {} layers, {} nets, {} items",
        db.layer_count(),
        db.num_nets(),
        db.num_items()
    );
    Ok(db)
}

fn finish(db: &BoardDb, config: &Config) -> anyhow::Result<()> {
    if let Some(png) = &config.input.visualization {
        prepare_output_dir(png)?;
        log::info!("Generating routed visualization...");
        let air_lines = pcb_router::remaining_air_lines(db);
        visualization::draw_board(db, &air_lines, png, 2000, 2000);
    }

    if let Err(e) = check::run(db) {
        log::warn!("Verification: {}", e);
    }

    prepare_output_dir(&config.input.output_board)?;
    log::info!("Writing routed board to {}", config.input.output_board);
    board::save(db, &config.input.output_board)?;
    Ok(())
}

fn prepare_output_dir(path_str: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path_str).parent() {
        if !parent.exists() && !parent.as_os_str().is_empty() {
            log::info!("Creating output directory: {:?}", parent);
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
