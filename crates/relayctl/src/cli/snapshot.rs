//! `snapshot` / `apply` subcommands — print or load the board document.

use std::path::Path;

use super::{GlobalOpts, ManualClock, Result};

pub(super) fn cmd_snapshot(opts: &GlobalOpts) -> Result<()> {
    let config = opts.effective_config();
    let board = super::boot_board(&config, ManualClock::default())?;
    println!("{}", board.snapshot()?.to_json_pretty()?);
    Ok(())
}

pub(super) fn cmd_apply(file: &Path, opts: &GlobalOpts) -> Result<()> {
    let doc = super::read_document(file)?;
    let config = opts.effective_config();
    let mut board = super::boot_board(&config, ManualClock::default())?;

    board.on_change(|index, state| log::info!("r{} -> {state}", index + 1));
    board.apply_snapshot(&doc)?;

    println!("{}", board.snapshot()?.to_json_pretty()?);
    Ok(())
}
