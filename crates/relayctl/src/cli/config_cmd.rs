//! `config` subcommand — show current configuration and file path, or
//! write it out with `--init`.

use std::path::Path;

use super::{Config, ConfigOutput, GlobalOpts, RelayError, Result, kv, kv_indent, kv_width};

pub(super) fn cmd_config(opts: &GlobalOpts, init: bool) -> Result<()> {
    let config = opts.effective_config();
    let config_path = opts.config.clone().or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let problems: Vec<String> = match config.validate() {
        Ok(()) => vec![],
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    };
    if init {
        return write_config(config, config_path.as_deref(), problems, opts.json);
    }

    if opts.json {
        let output = ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
            problems,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    // Human-readable output
    let w = kv_width(
        &["Config file:"],
        &["board:", "banks:", "tick_interval_ms:", "state_file:"],
    );

    match &config_path {
        Some(p) => {
            if config_exists {
                kv("Config file:", format_args!("{} (loaded)", p.display()), w);
            } else {
                kv(
                    "Config file:",
                    format_args!("{} (not found, using defaults)", p.display()),
                    w,
                );
            }
        }
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    let layout = config.layout();
    kv_indent(
        "board:",
        format_args!("{} ({} relays)", config.board, layout.relay_count()),
        w,
    );
    if config.board.is_shift_register() {
        kv_indent("banks:", config.banks, w);
    } else {
        kv_indent("banks:", format_args!("{} (ignored)", config.banks), w);
    }
    kv_indent("tick_interval_ms:", config.tick_interval_ms, w);
    let state_file = config.state_file.trim();
    kv_indent(
        "state_file:",
        if state_file.is_empty() { "(none)" } else { state_file },
        w,
    );

    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for p in &problems {
            println!("  {p}");
        }
    }
    Ok(())
}

/// `config --init`: persist the effective settings.
fn write_config(
    config: Config,
    path: Option<&Path>,
    problems: Vec<String>,
    json: bool,
) -> Result<()> {
    let Some(path) = path else {
        return Err(RelayError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no config directory on this host; pass --config <path>",
        )));
    };
    for p in &problems {
        log::warn!("writing config with problem: {p}");
    }
    config.save_to(path).map_err(|e| {
        RelayError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })?;
    log::info!("wrote {}", path.display());

    if json {
        let output = ConfigOutput {
            config_file: Some(path.display().to_string()),
            config_file_exists: true,
            settings: config,
            problems,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
