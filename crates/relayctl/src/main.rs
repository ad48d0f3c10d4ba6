//! relayctl — drive a simulated relay board from the command line.
//!
//! Every subcommand builds the board described by the config file (or the
//! `--board`/`--banks` overrides) on an in-memory backend.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use relayctl_lib::BoardVariant;

mod cli;

/// Shared shutdown flag — set by Ctrl+C handler.
pub static RUNNING: AtomicBool = AtomicBool::new(true);

#[derive(Parser)]
#[command(
    name = "relayctl",
    version,
    about = "Timer-driven output control for multi-channel relay boards"
)]
struct Args {
    /// Output as JSON (for map, run, config)
    #[arg(long, global = true)]
    json: bool,

    /// Path to a config file (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Board variant: relay4, relay8 or shift-register (overrides config)
    #[arg(long, global = true)]
    board: Option<BoardVariant>,

    /// Shift-register bank count (overrides config)
    #[arg(long, global = true)]
    banks: Option<usize>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: cli::Command,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    ctrlc::set_handler(move || {
        RUNNING.store(false, Ordering::SeqCst);
    })
    .ok();

    let opts = cli::GlobalOpts {
        json: args.json,
        config: args.config,
        board: args.board,
        banks: args.banks,
    };

    if let Err(e) = cli::run(args.command, &opts) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
