//! Indicator channel — a status LED with optional on/off blink timing.
//!
//! Blinking is armed by a positive on-duration alone. While armed, each
//! [`Indicator::check_timing`] call flips the LED once its current phase
//! (on-duration while lit, off-duration while dark) has run out.

use crate::clock::{self, Millis};
use crate::controller::Hardware;
use crate::error::Result;
use crate::layout::{IndicatorKind, PhysicalAddress};
use crate::relay::OutputState;

/// Blink duration meaning "no blinking".
pub const STEADY: i32 = -1;

#[derive(Debug, Clone)]
pub struct Indicator {
    kind: IndicatorKind,
    address: PhysicalAddress,
    on_duration: i32,
    off_duration: i32,
    last_change: Millis,
}

impl Indicator {
    pub(crate) fn new(kind: IndicatorKind, address: PhysicalAddress) -> Self {
        Self {
            kind,
            address,
            on_duration: STEADY,
            off_duration: STEADY,
            last_change: 0,
        }
    }

    pub fn kind(&self) -> IndicatorKind {
        self.kind
    }

    pub fn address(&self) -> PhysicalAddress {
        self.address
    }

    /// Lit phase length in milliseconds; `<= 0` disables blinking.
    pub fn on_duration(&self) -> i32 {
        self.on_duration
    }

    /// Dark phase length in milliseconds.
    pub fn off_duration(&self) -> i32 {
        self.off_duration
    }

    pub fn is_blinking(&self) -> bool {
        self.on_duration > 0
    }

    pub fn last_change(&self) -> Millis {
        self.last_change
    }

    pub fn set_timing(&mut self, on_ms: i32, off_ms: i32) {
        self.on_duration = on_ms;
        self.off_duration = off_ms;
    }

    pub(crate) fn read_state(&self, hw: &Hardware) -> Result<OutputState> {
        Ok(hw.backend.read(self.address)?.into())
    }

    /// Drive the LED, stamping the change with the clock. Idempotent.
    pub(crate) fn write_state(&mut self, hw: &mut Hardware, state: OutputState) -> Result<bool> {
        let now = hw.clock.now_ms();
        self.write_state_at(hw, state, now)
    }

    fn write_state_at(
        &mut self,
        hw: &mut Hardware,
        state: OutputState,
        now: Millis,
    ) -> Result<bool> {
        if self.read_state(hw)? == state {
            return Ok(false);
        }
        hw.backend.write(self.address, state.into())?;
        self.last_change = now;
        Ok(true)
    }

    /// Advance the blink cycle. Returns `true` if the LED flipped.
    pub(crate) fn check_timing(&mut self, hw: &mut Hardware, now: Millis) -> Result<bool> {
        if !self.is_blinking() {
            return Ok(false);
        }
        let current = self.read_state(hw)?;
        let phase = if current.is_on() {
            self.on_duration
        } else {
            self.off_duration
        };
        if !clock::has_elapsed(self.last_change, now, i64::from(phase)) {
            return Ok(false);
        }
        log::debug!("{} blink -> {}", self.kind, current.toggled());
        self.write_state_at(hw, current.toggled(), now)
    }
}

/// Mutable view of one indicator together with the board hardware.
pub struct IndicatorMut<'a> {
    pub(crate) indicator: &'a mut Indicator,
    pub(crate) hw: &'a mut Hardware,
}

impl IndicatorMut<'_> {
    pub fn state(&self) -> Result<OutputState> {
        self.indicator.read_state(&*self.hw)
    }

    /// Set the LED, keeping the current blink timing.
    pub fn set_state(&mut self, state: OutputState) -> Result<()> {
        self.indicator.write_state(&mut *self.hw, state)?;
        Ok(())
    }

    /// Set the LED and its blink timing. Timing is stored even when the
    /// state is already `state`.
    pub fn set_state_with_timing(
        &mut self,
        state: OutputState,
        on_ms: i32,
        off_ms: i32,
    ) -> Result<()> {
        self.indicator.set_timing(on_ms, off_ms);
        self.set_state(state)
    }

    pub fn kind(&self) -> IndicatorKind {
        self.indicator.kind()
    }

    pub fn on_duration(&self) -> i32 {
        self.indicator.on_duration()
    }

    pub fn off_duration(&self) -> i32 {
        self.indicator.off_duration()
    }

    pub fn is_blinking(&self) -> bool {
        self.indicator.is_blinking()
    }
}
