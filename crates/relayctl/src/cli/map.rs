//! `map` subcommand — print where every logical channel lives on the board.

use super::{
    ChannelJson, GlobalOpts, IndicatorKind, ManualClock, MapOutput, Result, kv, kv_indent,
    kv_width,
};

fn indicator_label(kind: IndicatorKind) -> &'static str {
    match kind {
        IndicatorKind::Primary => "primary (red)",
        IndicatorKind::Secondary => "secondary (green)",
    }
}

pub(super) fn cmd_map(opts: &GlobalOpts) -> Result<()> {
    let config = opts.effective_config();
    let board = super::boot_board(&config, ManualClock::default())?;
    let layout = board.layout();

    let relays: Vec<ChannelJson> = board
        .relays()
        .iter()
        .map(|relay| ChannelJson {
            channel: relay.fixed_short_name(),
            name: relay.name().to_string(),
            address: relay
                .address()
                .map_or_else(|| "(unbound)".to_string(), |a| a.to_string()),
        })
        .collect();

    let mut kinds = vec![IndicatorKind::Primary];
    if layout.has_secondary_indicator() {
        kinds.push(IndicatorKind::Secondary);
    }
    let indicators: Vec<ChannelJson> = kinds
        .into_iter()
        .map(|kind| ChannelJson {
            channel: kind.key().to_string(),
            name: indicator_label(kind).to_string(),
            address: layout.indicator_address(kind).to_string(),
        })
        .collect();

    let output = MapOutput {
        board: layout.variant(),
        banks: layout.banks(),
        bus_width: layout.bus_width(),
        relays,
        indicators,
        reserved_bits: layout.reserved_bits(),
    };

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    // Human-readable output
    let channel_keys: Vec<String> = output
        .relays
        .iter()
        .chain(&output.indicators)
        .map(|c| format!("{}:", c.channel))
        .collect();
    let indent: Vec<&str> = channel_keys.iter().map(String::as_str).collect();
    let w = kv_width(&["Board:", "Banks:"], &indent);

    kv("Board:", output.board, w);
    if layout.variant().is_shift_register() {
        kv(
            "Banks:",
            format_args!("{} ({} bus bits)", output.banks, output.bus_width),
            w,
        );
    }
    println!();

    println!("Relays:");
    for c in &output.relays {
        kv_indent(
            &format!("{}:", c.channel),
            format_args!("{:<8} {}", c.address, c.name),
            w,
        );
    }
    println!();

    println!("Indicators:");
    for c in &output.indicators {
        kv_indent(
            &format!("{}:", c.channel),
            format_args!("{:<8} {}", c.address, c.name),
            w,
        );
    }

    if !output.reserved_bits.is_empty() {
        println!();
        let bits: Vec<String> = output.reserved_bits.iter().map(|b| b.to_string()).collect();
        println!("Reserved bits (indicators and padding): {}", bits.join(", "));
    }
    Ok(())
}
