//! CLI subcommands — address map, snapshots, timed runs.

mod config_cmd;
mod map;
mod run;
mod snapshot;

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use relayctl_lib::backend::Backend;
pub(super) use relayctl_lib::backend::sim::{SimGpio, SimShiftRegister};
pub(super) use relayctl_lib::clock::{Clock, ManualClock, Millis, MonotonicClock};
pub(super) use relayctl_lib::config::Config;
pub(super) use relayctl_lib::error::{RelayError, Result};
pub(super) use relayctl_lib::snapshot::Snapshot;
pub(super) use relayctl_lib::{BoardVariant, IndicatorKind, OutputState, RelayBoard};

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {}", format_kv(key, value, w.saturating_sub(2)));
}

// ── Options shared by every subcommand ──

/// Global flags, resolved once in `main`.
pub struct GlobalOpts {
    pub json: bool,
    pub config: Option<PathBuf>,
    pub board: Option<BoardVariant>,
    pub banks: Option<usize>,
}

impl GlobalOpts {
    /// Config file contents with `--board` / `--banks` applied on top.
    pub(super) fn effective_config(&self) -> Config {
        let mut config = load_config(self.config.as_deref());
        if let Some(board) = self.board {
            config.board = board;
        }
        if let Some(banks) = self.banks {
            config.banks = banks;
        }
        config
    }
}

pub(super) fn load_config(custom_path: Option<&Path>) -> Config {
    match custom_path {
        Some(path) => {
            let (config, warnings) = Config::load_from(path);
            for w in &warnings {
                log::warn!("{w}");
            }
            config
        }
        None => Config::load(),
    }
}

/// Build the configured board on a simulated backend, drive every output
/// off, then apply the configured state file (if any).
pub(super) fn boot_board(config: &Config, clock: impl Clock + 'static) -> Result<RelayBoard> {
    if let Err(errors) = config.validate() {
        for e in &errors {
            log::warn!("[config] {e}");
        }
    }

    let layout = config.layout();
    let backend = if layout.variant().is_shift_register() {
        Backend::shift_register(SimShiftRegister::new(layout.bus_width()))
    } else {
        Backend::gpio(SimGpio::new())
    };
    let mut board = RelayBoard::with_layout(layout, backend, clock)?;
    board.initialize()?;

    if let Some(doc) = config.read_state_file()? {
        log::debug!("applying state file {}", config.state_file.trim());
        board.apply_snapshot(&doc)?;
    }
    Ok(board)
}

/// Read a snapshot document, keeping the path in the error.
pub(super) fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        RelayError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct ChannelJson {
    pub channel: String,
    pub name: String,
    pub address: String,
}

#[derive(Serialize)]
pub(super) struct MapOutput {
    pub board: BoardVariant,
    pub banks: usize,
    pub bus_width: usize,
    pub relays: Vec<ChannelJson>,
    pub indicators: Vec<ChannelJson>,
    pub reserved_bits: Vec<usize>,
}

#[derive(Serialize)]
pub(super) struct TransitionJson {
    pub at_ms: Millis,
    pub channel: String,
    pub state: OutputState,
}

#[derive(Serialize)]
pub(super) struct RunOutput {
    pub duration_ms: Millis,
    pub step_ms: Millis,
    pub transitions: Vec<TransitionJson>,
    pub snapshot: Snapshot,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub problems: Vec<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the logical-to-physical address table of the configured board
    Map,

    /// Print the snapshot document of a freshly initialized board
    Snapshot,

    /// Apply a snapshot document and print the resulting state
    Apply {
        /// Path to a JSON snapshot document
        file: PathBuf,
    },

    /// Apply a snapshot document, then simulate ticks on a manual clock
    Run {
        /// Path to a JSON snapshot document
        file: PathBuf,
        /// Simulated time to run for, in milliseconds
        #[arg(long, default_value_t = 10_000)]
        duration: Millis,
        /// Clock step between ticks, in milliseconds
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
        step: Millis,
    },

    /// Drive the board in real time until Ctrl+C
    Watch {
        /// Snapshot document applied after startup
        file: Option<PathBuf>,
    },

    /// Show current configuration and file path
    Config {
        /// Write the effective settings (file plus --board/--banks) to the config file
        #[arg(long)]
        init: bool,
    },
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, opts: &GlobalOpts) -> Result<()> {
    match cmd {
        Command::Map => map::cmd_map(opts),
        // Snapshot output is always a JSON document.
        Command::Snapshot => snapshot::cmd_snapshot(opts),
        Command::Apply { file } => snapshot::cmd_apply(&file, opts),
        Command::Run {
            file,
            duration,
            step,
        } => run::cmd_run(&file, duration, step, opts),
        Command::Watch { file } => {
            if opts.json {
                warn_json_unsupported("watch");
            }
            run::cmd_watch(file.as_deref(), opts)
        }
        Command::Config { init } => config_cmd::cmd_config(opts, init),
    }
}

#[cfg(test)]
mod format_tests {
    use super::*;

    #[test]
    fn kv_width_top_only() {
        let w = kv_width(&["Short:", "Longer key:"], &[]);
        // "Longer key:" = 11 + PADDING = 13
        assert_eq!(w, 13);
    }

    #[test]
    fn kv_width_indent_drives_width() {
        let w = kv_width(&["A:"], &["tick_interval_ms:"]);
        // 17 + PADDING + 2 = 21
        assert_eq!(w, 21);
    }

    #[test]
    fn values_align_across_levels() {
        let w = kv_width(&["Config file:"], &["board:"]);
        let top = format_kv("Config file:", "V", w);
        let indent = format!("  {}", format_kv("board:", "V", w - 2));
        assert_eq!(top.find('V'), indent.find('V'));
    }

    #[test]
    fn format_kv_exact_width() {
        // Longer than the width: no padding added
        assert_eq!(format_kv("ExactWidth:", "val", 10), "ExactWidth:val");
    }

    #[test]
    fn kv_width_empty_both() {
        assert_eq!(kv_width(&[], &[]), 0);
    }
}
