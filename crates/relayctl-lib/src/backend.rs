//! Physical backends — GPIO and shift-register traits, plus an in-memory simulator.
//!
//! The controller owns exactly one [`Backend`]. Hosts implement [`GpioPins`]
//! or [`ShiftRegisterBus`] over their real drivers; tests and the CLI use
//! [`sim`].

use crate::error::{RelayError, Result};
use crate::layout::PhysicalAddress;

/// Electrical level of a pin or shift-register bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    pub fn is_high(&self) -> bool {
        matches!(self, Level::High)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

// ── Traits ──

/// Direct GPIO access (`digitalRead` / `digitalWrite`).
pub trait GpioPins {
    fn digital_read(&self, pin: u8) -> Level;
    fn digital_write(&mut self, pin: u8, level: Level);
}

/// Daisy-chained 74HC595 bus driver.
///
/// Bit `n` is output `n % 8` of stage `n / 8`. Hosts wire the chain to
/// [`SHIFT_DATA_PIN`](crate::layout::SHIFT_DATA_PIN),
/// [`SHIFT_CLOCK_PIN`](crate::layout::SHIFT_CLOCK_PIN) and
/// [`SHIFT_LATCH_PIN`](crate::layout::SHIFT_LATCH_PIN).
pub trait ShiftRegisterBus {
    fn get(&self, bit: usize) -> Level;
    fn set(&mut self, bit: usize, level: Level);
    fn set_all_low(&mut self);
}

/// The single hardware handle a controller drives.
pub enum Backend {
    Gpio(Box<dyn GpioPins>),
    ShiftRegister(Box<dyn ShiftRegisterBus>),
}

impl Backend {
    pub fn gpio(pins: impl GpioPins + 'static) -> Self {
        Backend::Gpio(Box::new(pins))
    }

    pub fn shift_register(bus: impl ShiftRegisterBus + 'static) -> Self {
        Backend::ShiftRegister(Box::new(bus))
    }

    pub fn is_shift_register(&self) -> bool {
        matches!(self, Backend::ShiftRegister(_))
    }

    pub fn read(&self, address: PhysicalAddress) -> Result<Level> {
        match (self, address) {
            (Backend::Gpio(pins), PhysicalAddress::Pin(pin)) => Ok(pins.digital_read(pin)),
            (Backend::ShiftRegister(bus), PhysicalAddress::Bit(bit)) => Ok(bus.get(bit)),
            _ => Err(RelayError::AddressMismatch(address)),
        }
    }

    pub fn write(&mut self, address: PhysicalAddress, level: Level) -> Result<()> {
        match (self, address) {
            (Backend::Gpio(pins), PhysicalAddress::Pin(pin)) => {
                pins.digital_write(pin, level);
                Ok(())
            }
            (Backend::ShiftRegister(bus), PhysicalAddress::Bit(bit)) => {
                bus.set(bit, level);
                Ok(())
            }
            _ => Err(RelayError::AddressMismatch(address)),
        }
    }

    /// Force every bit of a shift-register chain low. GPIO backends are left alone.
    pub fn reset(&mut self) {
        if let Backend::ShiftRegister(bus) = self {
            bus.set_all_low();
        }
    }
}

// ── Simulator ──

pub mod sim {
    //! In-memory backends. Handles are cheap clones sharing one state, so a
    //! test can keep a handle after moving another into the controller.

    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct PinState {
        levels: HashMap<u8, Level>,
        writes: Vec<(u8, Level)>,
    }

    /// Simulated GPIO bank. Unwritten pins read low.
    #[derive(Clone, Default)]
    pub struct SimGpio {
        state: Rc<RefCell<PinState>>,
    }

    impl SimGpio {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn level(&self, pin: u8) -> Level {
            self.state
                .borrow()
                .levels
                .get(&pin)
                .copied()
                .unwrap_or_default()
        }

        /// Recorded `digital_write` calls, in order.
        pub fn writes(&self) -> Vec<(u8, Level)> {
            self.state.borrow().writes.clone()
        }

        pub fn write_count(&self) -> usize {
            self.state.borrow().writes.len()
        }

        pub fn clear_writes(&self) {
            self.state.borrow_mut().writes.clear();
        }

        /// Change a pin behind the controller's back (not recorded as a write).
        pub fn force(&self, pin: u8, level: Level) {
            self.state.borrow_mut().levels.insert(pin, level);
        }
    }

    impl GpioPins for SimGpio {
        fn digital_read(&self, pin: u8) -> Level {
            self.level(pin)
        }

        fn digital_write(&mut self, pin: u8, level: Level) {
            let mut state = self.state.borrow_mut();
            state.levels.insert(pin, level);
            state.writes.push((pin, level));
        }
    }

    struct BusState {
        bits: Vec<Level>,
        writes: Vec<(usize, Level)>,
        clears: usize,
    }

    /// Simulated shift-register chain of a fixed width.
    #[derive(Clone)]
    pub struct SimShiftRegister {
        state: Rc<RefCell<BusState>>,
    }

    impl SimShiftRegister {
        pub fn new(width: usize) -> Self {
            Self {
                state: Rc::new(RefCell::new(BusState {
                    bits: vec![Level::Low; width],
                    writes: Vec::new(),
                    clears: 0,
                })),
            }
        }

        pub fn width(&self) -> usize {
            self.state.borrow().bits.len()
        }

        pub fn level(&self, bit: usize) -> Level {
            self.state
                .borrow()
                .bits
                .get(bit)
                .copied()
                .unwrap_or_default()
        }

        /// Every bit, lowest first.
        pub fn levels(&self) -> Vec<Level> {
            self.state.borrow().bits.clone()
        }

        /// Recorded `set` calls, in order.
        pub fn writes(&self) -> Vec<(usize, Level)> {
            self.state.borrow().writes.clone()
        }

        pub fn write_count(&self) -> usize {
            self.state.borrow().writes.len()
        }

        pub fn clear_writes(&self) {
            self.state.borrow_mut().writes.clear();
        }

        /// Number of `set_all_low` calls.
        pub fn clear_count(&self) -> usize {
            self.state.borrow().clears
        }

        /// Change a bit behind the controller's back (not recorded as a write).
        pub fn force(&self, bit: usize, level: Level) {
            if let Some(slot) = self.state.borrow_mut().bits.get_mut(bit) {
                *slot = level;
            }
        }
    }

    impl ShiftRegisterBus for SimShiftRegister {
        fn get(&self, bit: usize) -> Level {
            self.level(bit)
        }

        fn set(&mut self, bit: usize, level: Level) {
            let mut state = self.state.borrow_mut();
            if let Some(slot) = state.bits.get_mut(bit) {
                *slot = level;
            } else {
                log::warn!("sim: bit {bit} is beyond the {}-bit chain", state.bits.len());
            }
            state.writes.push((bit, level));
        }

        fn set_all_low(&mut self) {
            let mut state = self.state.borrow_mut();
            state.bits.iter_mut().for_each(|b| *b = Level::Low);
            state.clears += 1;
        }
    }
}
