//! Integration tests: board behaviour through the public API.
//!
//! Each test drives a `RelayBoard` on a simulated backend with a manual
//! clock and checks what reaches the hardware.

use std::cell::RefCell;
use std::rc::Rc;

use relayctl_lib::backend::sim::{SimGpio, SimShiftRegister};
use relayctl_lib::backend::{Backend, Level};
use relayctl_lib::clock::ManualClock;
use relayctl_lib::layout::{PRIMARY_LED_BIT, SECONDARY_LED_BIT};
use relayctl_lib::snapshot::Snapshot;
use relayctl_lib::{
    BoardLayout, BoardVariant, IndicatorKind, OutputState, PhysicalAddress, RelayBoard,
};

enum Sim {
    Gpio(SimGpio),
    Bus(SimShiftRegister),
}

impl Sim {
    fn write_count(&self) -> usize {
        match self {
            Sim::Gpio(pins) => pins.write_count(),
            Sim::Bus(bus) => bus.write_count(),
        }
    }
}

fn setup(variant: BoardVariant, banks: usize, start: u32) -> (RelayBoard, Sim, ManualClock) {
    let layout = BoardLayout::new(variant, banks);
    let clock = ManualClock::new(start);
    let (backend, sim) = if variant.is_shift_register() {
        let bus = SimShiftRegister::new(layout.bus_width());
        (Backend::shift_register(bus.clone()), Sim::Bus(bus))
    } else {
        let pins = SimGpio::new();
        (Backend::gpio(pins.clone()), Sim::Gpio(pins))
    };
    let mut board = RelayBoard::with_layout(layout, backend, clock.clone()).unwrap();
    board.initialize().unwrap();
    (board, sim, clock)
}

fn all_variants() -> Vec<(BoardVariant, usize)> {
    vec![
        (BoardVariant::Relay4, 1),
        (BoardVariant::Relay8, 1),
        (BoardVariant::ShiftRegister, 1),
        (BoardVariant::ShiftRegister, 3),
    ]
}

// ── Set / get ──

#[test]
fn set_then_get_every_relay() {
    for (variant, banks) in all_variants() {
        let (mut board, _, _) = setup(variant, banks, 0);
        for i in 0..board.number_of_relays() {
            for state in [OutputState::On, OutputState::Off, OutputState::On] {
                board.set_relay_state(i, state).unwrap();
                assert_eq!(board.relay_state(i).unwrap(), state, "{variant} relay {i}");
            }
        }
    }
}

#[test]
fn duplicate_set_is_one_write_and_one_callback() {
    for (variant, banks) in all_variants() {
        let (mut board, sim, _) = setup(variant, banks, 0);
        let calls = Rc::new(RefCell::new(0));
        let counter = calls.clone();
        board.on_change(move |_, _| *counter.borrow_mut() += 1);
        let before = sim.write_count();

        board.set_relay_state(1, OutputState::On).unwrap();
        board.set_relay_state(1, OutputState::On).unwrap();

        assert_eq!(sim.write_count() - before, 1, "{variant}");
        assert_eq!(*calls.borrow(), 1, "{variant}");
    }
}

#[test]
fn toggle_flips_and_notifies() {
    let (mut board, _, _) = setup(BoardVariant::Relay4, 1, 0);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    board.on_change(move |i, s| sink.borrow_mut().push((i, s)));

    assert_eq!(board.lookup("Relay 2").toggle().unwrap(), OutputState::On);
    assert_eq!(board.lookup("Relay 2").toggle().unwrap(), OutputState::Off);
    assert_eq!(
        *seen.borrow(),
        vec![(1, OutputState::On), (1, OutputState::Off)]
    );
}

// ── Momentary relays ──

#[test]
fn momentary_relay_expires_on_deadline_not_before() {
    let (mut board, _, clock) = setup(BoardVariant::Relay8, 1, 5_000);
    {
        let mut relay = board.lookup_index(3);
        relay.set_momentary_duration(4);
        relay.set_state(OutputState::On).unwrap();
        assert_eq!(relay.last_change(), 5_000);
    }

    clock.set(8_999);
    assert!(board.poll().unwrap().expired.is_empty());
    assert_eq!(board.relay_state(3).unwrap(), OutputState::On);

    clock.set(9_000);
    assert_eq!(board.poll().unwrap().expired, vec![3]);
    assert_eq!(board.relay_state(3).unwrap(), OutputState::Off);

    // Nothing left to expire.
    clock.set(20_000);
    assert!(board.poll().unwrap().is_empty());
}

#[test]
fn momentary_expiry_notifies_callback() {
    let (mut board, _, _) = setup(BoardVariant::Relay4, 1, 0);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    board.on_change(move |i, s| sink.borrow_mut().push((i, s)));

    board.lookup_index(0).set_momentary_duration(1);
    board.set_relay_state(0, OutputState::On).unwrap();
    board.tick(1_000).unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![(0, OutputState::On), (0, OutputState::Off)]
    );
}

#[test]
fn momentary_deadline_straddling_counter_wrap() {
    let start = u32::MAX - 1_500;
    let (mut board, _, _) = setup(BoardVariant::ShiftRegister, 2, start);
    board.lookup_index(7).set_momentary_duration(2);
    board.set_relay_state(7, OutputState::On).unwrap();

    let deadline = start.wrapping_add(2_000);
    assert!(deadline < start, "deadline wraps past zero");

    assert!(board.tick(deadline - 1).unwrap().expired.is_empty());
    assert_eq!(board.tick(deadline).unwrap().expired, vec![7]);
}

#[test]
fn external_off_is_always_legal_for_timed_relay() {
    let (mut board, _, _) = setup(BoardVariant::Relay4, 1, 0);
    board.lookup_index(2).set_momentary_duration(10);
    board.set_relay_state(2, OutputState::On).unwrap();
    board.set_relay_state(2, OutputState::Off).unwrap();
    assert!(board.tick(60_000).unwrap().expired.is_empty());
    assert_eq!(board.relay_state(2).unwrap(), OutputState::Off);
}

#[test]
fn relay_switched_on_externally_is_expired_from_old_timestamp() {
    let (mut board, sim, _) = setup(BoardVariant::Relay4, 1, 0);
    board.lookup_index(0).set_momentary_duration(1);
    let Sim::Gpio(pins) = sim else { unreachable!() };
    pins.force(21, Level::High);

    assert_eq!(board.tick(1_000).unwrap().expired, vec![0]);
    assert_eq!(pins.level(21), Level::Low);
}

// ── Indicator blinking ──

#[test]
fn blink_cycle_repeats() {
    let (on, off) = (300, 200);
    let t0 = 1_000;
    let (mut board, _, _) = setup(BoardVariant::ShiftRegister, 1, t0);
    board
        .set_indicator(IndicatorKind::Primary, OutputState::On, on, off)
        .unwrap();

    let period = (on + off) as u32;
    let mut now = t0;
    for cycle in 0..5 {
        let start = now;
        while now < start + period {
            board.tick(now).unwrap();
            let expected = if now - start < on as u32 {
                OutputState::On
            } else {
                OutputState::Off
            };
            assert_eq!(
                board.indicator_state(IndicatorKind::Primary).unwrap(),
                expected,
                "cycle {cycle}, t = {now}"
            );
            now += 10;
        }
    }
}

#[test]
fn blinking_leaves_other_indicator_steady() {
    let (mut board, sim, _) = setup(BoardVariant::ShiftRegister, 1, 0);
    board
        .set_indicator(IndicatorKind::Secondary, OutputState::On, 100, 100)
        .unwrap();
    board
        .set_indicator_state(IndicatorKind::Primary, OutputState::On)
        .unwrap();

    for now in (0..1_000).step_by(25) {
        board.tick(now).unwrap();
    }
    let Sim::Bus(bus) = sim else { unreachable!() };
    assert_eq!(bus.level(PRIMARY_LED_BIT), Level::High);
    let toggles = bus
        .writes()
        .iter()
        .filter(|(bit, _)| *bit == SECONDARY_LED_BIT)
        .count();
    assert!(toggles >= 9, "secondary indicator should keep blinking");
}

#[test]
fn disabling_blink_freezes_current_state() {
    let (mut board, _, _) = setup(BoardVariant::Relay4, 1, 0);
    board
        .set_indicator(IndicatorKind::Primary, OutputState::On, 100, 100)
        .unwrap();
    board.tick(100).unwrap();
    assert_eq!(
        board.indicator_state(IndicatorKind::Primary).unwrap(),
        OutputState::Off
    );
    board
        .set_indicator(IndicatorKind::Primary, OutputState::Off, -1, -1)
        .unwrap();
    for now in [200, 300, 10_000] {
        board.tick(now).unwrap();
    }
    assert_eq!(
        board.indicator_state(IndicatorKind::Primary).unwrap(),
        OutputState::Off
    );
}

// ── Snapshots ──

#[test]
fn snapshot_round_trip_is_a_no_op() {
    for (variant, banks) in all_variants() {
        let (mut board, sim, _) = setup(variant, banks, 0);
        {
            let mut r = board.lookup_index(0);
            r.set_name("Pump");
            r.set_momentary_duration(30);
            r.set_user_tag("north field");
            r.set_state(OutputState::On).unwrap();
        }
        board.set_relay_state(2, OutputState::On).unwrap();
        board
            .set_indicator(IndicatorKind::Primary, OutputState::On, 250, 750)
            .unwrap();
        board
            .set_indicator(IndicatorKind::Secondary, OutputState::Off, 0, 0)
            .unwrap();

        let before = board.snapshot().unwrap();
        let writes = sim.write_count();
        let last_change = board.relay(0).unwrap().last_change();

        board.apply_snapshot(&before.to_json().unwrap()).unwrap();

        assert_eq!(board.snapshot().unwrap(), before, "{variant}");
        assert_eq!(sim.write_count(), writes, "{variant}: no physical writes");
        assert_eq!(board.relay(0).unwrap().last_change(), last_change);
    }
}

#[test]
fn short_document_updates_only_leading_relays() {
    let (mut board, _, _) = setup(BoardVariant::Relay8, 1, 0);
    board.lookup_index(5).set_name("Keep me");
    board.lookup_index(5).set_momentary_duration(9);

    board
        .apply_snapshot(
            r#"{
                "numberofRelays": 2,
                "relays": [
                    { "name": "A", "state": 1, "duration": -1 },
                    { "name": "B", "state": 1, "duration": -1 },
                    { "name": "C", "state": 1, "duration": -1 }
                ]
            }"#,
        )
        .unwrap();

    assert_eq!(board.relay(0).unwrap().name(), "A");
    assert_eq!(board.relay(1).unwrap().name(), "B");
    assert_eq!(board.relay(2).unwrap().name(), "Relay 3", "beyond declared count");
    assert_eq!(board.relay_state(2).unwrap(), OutputState::Off);
    assert_eq!(board.relay(5).unwrap().name(), "Keep me");
    assert_eq!(board.relay(5).unwrap().momentary_duration(), 9);
}

#[test]
fn larger_document_is_cut_to_board_size() {
    let (mut board, _, _) = setup(BoardVariant::ShiftRegister, 2, 0);
    let mut source = setup(BoardVariant::ShiftRegister, 3, 0).0;
    for i in 0..source.number_of_relays() {
        source.lookup_index(i).set_name(format!("S{i}"));
    }
    let doc = source.snapshot_json().unwrap();

    board.apply_snapshot(&doc).unwrap();

    assert_eq!(board.number_of_relays(), 12);
    assert_eq!(board.relay(11).unwrap().name(), "S11");
    assert_eq!(board.snapshot().unwrap().number_of_relays, 12);
}

#[test]
fn declared_count_larger_than_list_applies_list() {
    let (mut board, _, _) = setup(BoardVariant::Relay4, 1, 0);
    board
        .apply_snapshot(r#"{ "numberofRelays": 4, "relays": [ { "name": "Only" } ] }"#)
        .unwrap();
    assert_eq!(board.relay(0).unwrap().name(), "Only");
    assert_eq!(board.relay(1).unwrap().name(), "Relay 2");
}

#[test]
fn omitted_indicator_sections_keep_configuration() {
    let (mut board, _, _) = setup(BoardVariant::ShiftRegister, 1, 0);
    board
        .set_indicator(IndicatorKind::Primary, OutputState::On, 111, 222)
        .unwrap();
    board
        .apply_snapshot(r#"{ "numberofRelays": 0 }"#)
        .unwrap();
    let snap = board.snapshot().unwrap();
    let rled = snap.rled.unwrap();
    assert_eq!((rled.on, rled.off), (Some(111), Some(222)));
    assert_eq!(rled.state, Some(OutputState::On));
}

#[test]
fn snapshot_document_shape() {
    let (board, _, _) = setup(BoardVariant::ShiftRegister, 1, 0);
    let json: serde_json::Value = serde_json::from_str(&board.snapshot_json().unwrap()).unwrap();
    assert_eq!(json["numberofRelays"], 6);
    assert_eq!(json["relays"].as_array().unwrap().len(), 6);
    assert_eq!(json["relays"][0]["name"], "Relay 1");
    assert_eq!(json["relays"][0]["state"], 0);
    assert_eq!(json["relays"][0]["duration"], -1);
    assert_eq!(json["relays"][0]["ud"], "");
    assert_eq!(json["rled"]["on"], -1);
    assert_eq!(json["gled"]["state"], 0);

    let parsed = Snapshot::parse(&json.to_string()).unwrap();
    assert_eq!(parsed.number_of_relays, 6);
}

// ── Addressing and lookup ──

#[test]
fn two_bank_address_examples() {
    let (board, _, _) = setup(BoardVariant::ShiftRegister, 2, 0);
    assert_eq!(
        board.relay(7).unwrap().address(),
        Some(PhysicalAddress::Bit(9))
    );
    assert_eq!(
        board.relay(5).unwrap().address(),
        Some(PhysicalAddress::Bit(5))
    );
    let relay_bits: Vec<_> = board.relays().iter().filter_map(|r| r.address()).collect();
    assert!(!relay_bits.contains(&PhysicalAddress::Bit(PRIMARY_LED_BIT)));
    assert!(!relay_bits.contains(&PhysicalAddress::Bit(SECONDARY_LED_BIT)));
}

#[test]
fn relay_writes_never_touch_padding_bits() {
    let (mut board, sim, _) = setup(BoardVariant::ShiftRegister, 3, 0);
    for i in 0..board.number_of_relays() {
        board.set_relay_state(i, OutputState::On).unwrap();
    }
    let Sim::Bus(bus) = sim else { unreachable!() };
    let reserved = board.layout().reserved_bits();
    for bit in reserved {
        assert_eq!(bus.level(bit), Level::Low, "reserved bit {bit}");
    }
}

// Known quirk: misses resolve to relay 0 instead of an error.
#[test]
fn lookup_nonexistent_name_returns_relay_zero() {
    let (mut board, _, _) = setup(BoardVariant::Relay4, 1, 0);
    let miss = board.lookup("nonexistent").index();
    let zero = board.lookup_index(0).index();
    assert_eq!(miss, zero);
    assert_eq!(miss, 0);
}

// Known quirk: index == relay count also resolves to relay 0.
#[test]
fn lookup_index_at_count_returns_relay_zero() {
    let (mut board, _, _) = setup(BoardVariant::Relay4, 1, 0);
    assert_eq!(board.lookup_index(4).index(), 0);
    board.set_relay_state(4, OutputState::On).unwrap();
    assert_eq!(board.relay_state(0).unwrap(), OutputState::On);
}
