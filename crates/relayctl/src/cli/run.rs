//! `run` / `watch` subcommands — drive the timing sweep.
//!
//! `run` steps a manual clock through a fixed window and reports every
//! transition; `watch` polls against the wall clock until Ctrl+C.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::{
    Clock, GlobalOpts, IndicatorKind, ManualClock, Millis, MonotonicClock, OutputState, RUNNING,
    RelayBoard, RelayError, Result, RunOutput, TransitionJson,
};

fn print_transition(at_ms: Millis, channel: &str, state: OutputState) {
    println!("  {at_ms:>8} ms  {channel:<5} {state}");
}

/// Indicator flips from one sweep, with the state each one flipped to.
fn flipped_states(
    board: &RelayBoard,
    flipped: &[IndicatorKind],
) -> Result<Vec<(IndicatorKind, OutputState)>> {
    flipped
        .iter()
        .map(|&kind| -> Result<(IndicatorKind, OutputState)> {
            Ok((kind, board.indicator_state(kind)?))
        })
        .collect()
}

pub(super) fn cmd_run(
    file: &Path,
    duration: Millis,
    step: Millis,
    opts: &GlobalOpts,
) -> Result<()> {
    if step == 0 {
        return Err(RelayError::Config("--step must be positive".into()));
    }
    let doc = super::read_document(file)?;
    let config = opts.effective_config();
    let clock = ManualClock::new(0);
    let mut board = super::boot_board(&config, clock.clone())?;

    let transitions: Rc<RefCell<Vec<TransitionJson>>> = Rc::default();
    let sink = Rc::clone(&transitions);
    let stamp = clock.clone();
    board.on_change(move |index, state| {
        sink.borrow_mut().push(TransitionJson {
            at_ms: stamp.now_ms(),
            channel: format!("r{}", index + 1),
            state,
        });
    });

    board.apply_snapshot(&doc)?;

    let mut now: Millis = 0;
    loop {
        clock.set(now);
        let report = board.tick(now)?;
        for (kind, state) in flipped_states(&board, &report.flipped)? {
            transitions.borrow_mut().push(TransitionJson {
                at_ms: now,
                channel: kind.key().to_string(),
                state,
            });
        }
        if now >= duration {
            break;
        }
        now = now.saturating_add(step).min(duration);
    }
    board.clear_on_change();

    let output = RunOutput {
        duration_ms: duration,
        step_ms: step,
        transitions: std::mem::take(&mut *transitions.borrow_mut()),
        snapshot: board.snapshot()?,
    };
    log::debug!("{} transitions recorded", output.transitions.len());

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "=== Run — {} for {duration} ms in {step} ms steps ===",
        board.variant()
    );
    if output.transitions.is_empty() {
        println!("  (no transitions)");
    }
    for t in &output.transitions {
        print_transition(t.at_ms, &t.channel, t.state);
    }
    println!();
    println!("Final state:");
    println!("{}", output.snapshot.to_json_pretty()?);
    Ok(())
}

pub(super) fn cmd_watch(file: Option<&Path>, opts: &GlobalOpts) -> Result<()> {
    let config = opts.effective_config();
    if config.tick_interval_ms == 0 {
        return Err(RelayError::Config("tick_interval_ms must be positive".into()));
    }
    let doc = file.map(super::read_document).transpose()?;

    let clock = MonotonicClock::new();
    let mut board = super::boot_board(&config, clock)?;
    board.on_change(move |index, state| {
        print_transition(clock.now_ms(), &format!("r{}", index + 1), state);
    });

    println!(
        "Watching {} ({} relays, {} indicator(s)), tick every {} ms.",
        board.variant(),
        board.number_of_relays(),
        board.number_of_indicators(),
        config.tick_interval_ms
    );
    println!("Press Ctrl+C to stop (drives all outputs off).");
    println!();

    if let Some(doc) = doc {
        board.apply_snapshot(&doc)?;
    }

    let interval = Duration::from_millis(config.tick_interval_ms);
    while RUNNING.load(Ordering::SeqCst) {
        let report = board.poll()?;
        let now = board.now();
        for (kind, state) in flipped_states(&board, &report.flipped)? {
            print_transition(now, kind.key(), state);
        }
        std::thread::sleep(interval);
    }

    println!();
    println!("Driving all outputs off...");
    board.initialize()?;
    println!("Done.");
    Ok(())
}
