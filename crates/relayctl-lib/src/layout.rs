//! Board topologies and the logical-to-physical address map.
//!
//! Direct-GPIO boards map each relay onto a fixed pin. Shift-register boards
//! chain 8-bit 74HC595 stages ("banks"); each bank carries 6 relay bits and
//! 2 reserved bits. Bank 0's reserved bits drive the two indicators, the
//! reserved bits of later banks are padding and never addressed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Board constants ──

/// Relay pins of the 4-relay direct-GPIO board, in relay order.
pub const RELAY4_PINS: [u8; 4] = [21, 19, 18, 5];

/// Relay pins of the 8-relay direct-GPIO board, in relay order.
pub const RELAY8_PINS: [u8; 8] = [33, 32, 13, 12, 21, 19, 18, 5];

/// Single indicator pin shared by both direct-GPIO boards.
pub const DIRECT_LED_PIN: u8 = 25;

/// Serial data (DS) pin of the 74HC595 chain. The library never drives it;
/// a host [`ShiftRegisterBus`](crate::backend::ShiftRegisterBus) does.
pub const SHIFT_DATA_PIN: u8 = 7;

/// Shift clock (SHCP) pin of the 74HC595 chain.
pub const SHIFT_CLOCK_PIN: u8 = 5;

/// Storage latch (STCP) pin of the 74HC595 chain.
pub const SHIFT_LATCH_PIN: u8 = 6;

/// Bits per 74HC595 stage.
pub const BITS_PER_BANK: usize = 8;

/// Relay-carrying bits per stage (slots 0..=5).
pub const RELAYS_PER_BANK: usize = 6;

/// Primary (red) indicator bit in bank 0.
pub const PRIMARY_LED_BIT: usize = 6;

/// Secondary (green) indicator bit in bank 0.
pub const SECONDARY_LED_BIT: usize = 7;

pub const BANKS_MIN: usize = 1;
pub const BANKS_MAX: usize = 8;

// ── Types ──

/// Physical topology of the board. Fixed for the lifetime of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoardVariant {
    /// 4 relays on direct GPIO pins, one indicator.
    Relay4,
    /// 8 relays on direct GPIO pins, one indicator.
    Relay8,
    /// N banks of 74HC595 shift registers, 6 relays per bank, two indicators.
    ShiftRegister,
}

impl BoardVariant {
    pub const ALL: [BoardVariant; 3] = [
        BoardVariant::Relay4,
        BoardVariant::Relay8,
        BoardVariant::ShiftRegister,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoardVariant::Relay4 => "relay4",
            BoardVariant::Relay8 => "relay8",
            BoardVariant::ShiftRegister => "shift-register",
        }
    }

    pub fn is_shift_register(&self) -> bool {
        matches!(self, BoardVariant::ShiftRegister)
    }
}

impl fmt::Display for BoardVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoardVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relay4" | "4" => Ok(BoardVariant::Relay4),
            "relay8" | "8" => Ok(BoardVariant::Relay8),
            "shift-register" | "shift" | "6" => Ok(BoardVariant::ShiftRegister),
            other => Err(format!(
                "unknown board variant \"{other}\" (expected relay4, relay8 or shift-register)"
            )),
        }
    }
}

/// Where a channel lives on the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalAddress {
    /// Direct GPIO pin number.
    Pin(u8),
    /// Bit index on the shift-register chain (`bank * 8 + slot`).
    Bit(usize),
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalAddress::Pin(pin) => write!(f, "GPIO{pin}"),
            PhysicalAddress::Bit(bit) => write!(f, "bit {bit}"),
        }
    }
}

/// Which status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    /// Red LED. Present on every board.
    Primary,
    /// Green LED. Shift-register boards only.
    Secondary,
}

impl IndicatorKind {
    /// Document key for this indicator.
    pub fn key(&self) -> &'static str {
        match self {
            IndicatorKind::Primary => "rled",
            IndicatorKind::Secondary => "gled",
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ── Layout ──

/// Board variant plus bank count, with the address arithmetic for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardLayout {
    variant: BoardVariant,
    banks: usize,
}

impl BoardLayout {
    /// Build a layout. For the shift-register variant `banks` is clamped to
    /// `[BANKS_MIN, BANKS_MAX]`; other variants always have one bank.
    pub fn new(variant: BoardVariant, banks: usize) -> Self {
        let banks = if variant.is_shift_register() {
            let clamped = banks.clamp(BANKS_MIN, BANKS_MAX);
            if clamped != banks {
                log::warn!(
                    "bank count {banks} outside {BANKS_MIN}..={BANKS_MAX}, using {clamped}"
                );
            }
            clamped
        } else {
            1
        };
        Self { variant, banks }
    }

    pub fn variant(&self) -> BoardVariant {
        self.variant
    }

    pub fn banks(&self) -> usize {
        self.banks
    }

    pub fn relay_count(&self) -> usize {
        match self.variant {
            BoardVariant::Relay4 => RELAY4_PINS.len(),
            BoardVariant::Relay8 => RELAY8_PINS.len(),
            BoardVariant::ShiftRegister => self.banks * RELAYS_PER_BANK,
        }
    }

    pub fn indicator_count(&self) -> usize {
        if self.has_secondary_indicator() { 2 } else { 1 }
    }

    pub fn has_secondary_indicator(&self) -> bool {
        self.variant.is_shift_register()
    }

    /// Width of the shift-register chain in bits (0 for direct-GPIO boards).
    pub fn bus_width(&self) -> usize {
        if self.variant.is_shift_register() {
            self.banks * BITS_PER_BANK
        } else {
            0
        }
    }

    /// Physical address for relay `index`, or `None` when out of range.
    pub fn relay_address(&self, index: usize) -> Option<PhysicalAddress> {
        match self.variant {
            BoardVariant::Relay4 => RELAY4_PINS.get(index).copied().map(PhysicalAddress::Pin),
            BoardVariant::Relay8 => RELAY8_PINS.get(index).copied().map(PhysicalAddress::Pin),
            BoardVariant::ShiftRegister => {
                if index >= self.relay_count() {
                    return None;
                }
                let bank = index / RELAYS_PER_BANK;
                let slot = index % RELAYS_PER_BANK;
                Some(PhysicalAddress::Bit(bank * BITS_PER_BANK + slot))
            }
        }
    }

    /// Indicator actually driven for a request. Boards with a single
    /// indicator answer every request with the primary one.
    pub fn resolve_indicator(&self, kind: IndicatorKind) -> IndicatorKind {
        if self.has_secondary_indicator() {
            kind
        } else {
            IndicatorKind::Primary
        }
    }

    pub fn indicator_address(&self, kind: IndicatorKind) -> PhysicalAddress {
        match (self.variant, self.resolve_indicator(kind)) {
            (BoardVariant::ShiftRegister, IndicatorKind::Primary) => {
                PhysicalAddress::Bit(PRIMARY_LED_BIT)
            }
            (BoardVariant::ShiftRegister, IndicatorKind::Secondary) => {
                PhysicalAddress::Bit(SECONDARY_LED_BIT)
            }
            _ => PhysicalAddress::Pin(DIRECT_LED_PIN),
        }
    }

    /// Reserved (non-relay) bits of every bank, in ascending order.
    pub fn reserved_bits(&self) -> Vec<usize> {
        if !self.variant.is_shift_register() {
            return Vec::new();
        }
        (0..self.banks)
            .flat_map(|bank| {
                (RELAYS_PER_BANK..BITS_PER_BANK).map(move |slot| bank * BITS_PER_BANK + slot)
            })
            .collect()
    }
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self::new(BoardVariant::Relay4, 1)
    }
}
