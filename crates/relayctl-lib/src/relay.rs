//! Output channel — one relay, its momentary timer and its metadata.
//!
//! A [`Relay`] holds configuration only; its ON/OFF state lives in the
//! backend. State access goes through [`RelayMut`], a short-lived view that
//! pairs the relay with the controller's hardware handle.

use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::backend::Level;
use crate::clock::{self, Millis};
use crate::controller::Hardware;
use crate::error::{RelayError, Result};
use crate::layout::PhysicalAddress;

/// Momentary duration meaning "stay latched until switched explicitly".
pub const LATCHED: i32 = -1;

/// Longest user tag kept, in characters.
pub const MAX_USER_TAG_LEN: usize = 64;

/// Longest momentary window the wrapping clock can time, in seconds.
pub const MAX_MOMENTARY_SECS: i32 = (clock::MAX_SPAN_MS / 1000) as i32;

/// Logical state of an output. Serialized as `0` / `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub enum OutputState {
    #[default]
    Off,
    On,
}

impl OutputState {
    pub fn is_on(&self) -> bool {
        matches!(self, OutputState::On)
    }

    pub fn toggled(&self) -> Self {
        match self {
            OutputState::Off => OutputState::On,
            OutputState::On => OutputState::Off,
        }
    }
}

/// Only `1` means ON.
impl From<i64> for OutputState {
    fn from(v: i64) -> Self {
        if v == 1 {
            OutputState::On
        } else {
            OutputState::Off
        }
    }
}

impl From<OutputState> for u8 {
    fn from(s: OutputState) -> Self {
        match s {
            OutputState::Off => 0,
            OutputState::On => 1,
        }
    }
}

impl From<Level> for OutputState {
    fn from(level: Level) -> Self {
        match level {
            Level::Low => OutputState::Off,
            Level::High => OutputState::On,
        }
    }
}

impl From<OutputState> for Level {
    fn from(s: OutputState) -> Self {
        match s {
            OutputState::Off => Level::Low,
            OutputState::On => Level::High,
        }
    }
}

impl fmt::Display for OutputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputState::Off => "OFF",
            OutputState::On => "ON",
        })
    }
}

impl std::str::FromStr for OutputState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" | "1" | "high" => Ok(OutputState::On),
            "off" | "0" | "low" => Ok(OutputState::Off),
            other => Err(format!("expected on/off, got \"{other}\"")),
        }
    }
}

/// One relay channel.
#[derive(Debug, Clone)]
pub struct Relay {
    index: usize,
    address: Option<PhysicalAddress>,
    name: String,
    momentary: i32,
    last_change: Millis,
    user_tag: String,
}

impl Relay {
    /// Relay bound to `address`, with the default name and no momentary timer.
    pub(crate) fn new(index: usize, address: Option<PhysicalAddress>) -> Self {
        Self {
            index,
            address,
            name: fixed_name(index),
            momentary: LATCHED,
            last_change: 0,
            user_tag: String::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn address(&self) -> Option<PhysicalAddress> {
        self.address
    }

    /// Display name (mutable, may be duplicated across relays).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Auto-off delay in seconds; `<= 0` means latched.
    pub fn momentary_duration(&self) -> i32 {
        self.momentary
    }

    /// Set the auto-off delay. Values past [`MAX_MOMENTARY_SECS`] are clamped.
    pub fn set_momentary_duration(&mut self, seconds: i32) {
        self.momentary = if seconds > MAX_MOMENTARY_SECS {
            log::warn!(
                "{} momentary duration {seconds} s exceeds {MAX_MOMENTARY_SECS} s, clamped",
                self.fixed_short_name()
            );
            MAX_MOMENTARY_SECS
        } else {
            seconds
        };
    }

    pub fn is_momentary(&self) -> bool {
        self.momentary > 0
    }

    /// Timestamp of the last OFF→ON transition while momentary.
    pub fn last_change(&self) -> Millis {
        self.last_change
    }

    pub fn user_tag(&self) -> &str {
        &self.user_tag
    }

    /// Store a free-form tag, truncated to [`MAX_USER_TAG_LEN`] characters.
    ///
    /// Returns `true` if the tag had to be truncated.
    pub fn set_user_tag(&mut self, tag: &str) -> bool {
        match tag.char_indices().nth(MAX_USER_TAG_LEN) {
            Some((cut, _)) => {
                log::warn!(
                    "user tag for {} longer than {MAX_USER_TAG_LEN} characters, truncated",
                    self.fixed_short_name()
                );
                self.user_tag = tag[..cut].to_string();
                true
            }
            None => {
                self.user_tag = tag.to_string();
                false
            }
        }
    }

    /// Stable short identifier, `r1`, `r2`, ...
    pub fn fixed_short_name(&self) -> String {
        format!("r{}", self.index + 1)
    }

    /// Stable long identifier, `Relay 1`, `Relay 2`, ...
    pub fn fixed_name(&self) -> String {
        fixed_name(self.index)
    }

    fn bound_address(&self) -> Result<PhysicalAddress> {
        self.address.ok_or_else(|| {
            log::warn!("{} is not bound to a board address", self.fixed_short_name());
            RelayError::UnboundChannel(self.index)
        })
    }

    pub(crate) fn read_state(&self, hw: &Hardware) -> Result<OutputState> {
        let address = self.bound_address()?;
        Ok(hw.backend.read(address)?.into())
    }

    /// Drive the relay. Returns `false` (and touches nothing) when it is
    /// already in `state`.
    pub(crate) fn write_state(&mut self, hw: &mut Hardware, state: OutputState) -> Result<bool> {
        if self.read_state(hw)? == state {
            return Ok(false);
        }
        let address = self.bound_address()?;
        hw.backend.write(address, state.into())?;
        if self.is_momentary() && state.is_on() {
            self.last_change = hw.clock.now_ms();
        }
        log::debug!("{} -> {state}", self.fixed_short_name());
        if let Some(cb) = hw.on_change.as_mut() {
            cb(self.index, state);
        }
        Ok(true)
    }

    /// Switch off once the momentary window has run out. Returns `true` on expiry.
    ///
    /// Callers only invoke this for momentary relays that are currently ON.
    pub(crate) fn check_expiry(&mut self, hw: &mut Hardware, now: Millis) -> Result<bool> {
        let window_ms = i64::from(self.momentary) * 1000;
        if !clock::has_elapsed(self.last_change, now, window_ms) {
            return Ok(false);
        }
        log::debug!("{} momentary window expired", self.fixed_short_name());
        self.write_state(hw, OutputState::Off)?;
        Ok(true)
    }
}

fn fixed_name(index: usize) -> String {
    format!("Relay {}", index + 1)
}

/// Mutable view of one relay together with the board hardware.
pub struct RelayMut<'a> {
    pub(crate) relay: &'a mut Relay,
    pub(crate) hw: &'a mut Hardware,
}

impl RelayMut<'_> {
    /// Current state, read from the backend.
    pub fn state(&self) -> Result<OutputState> {
        self.relay.read_state(&*self.hw)
    }

    /// Drive the relay. A no-op when already in `state`.
    pub fn set_state(&mut self, state: OutputState) -> Result<()> {
        self.relay.write_state(&mut *self.hw, state)?;
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<OutputState> {
        let next = self.state()?.toggled();
        self.set_state(next)?;
        Ok(next)
    }
}

impl Deref for RelayMut<'_> {
    type Target = Relay;

    fn deref(&self) -> &Relay {
        &*self.relay
    }
}

impl DerefMut for RelayMut<'_> {
    fn deref_mut(&mut self) -> &mut Relay {
        &mut *self.relay
    }
}
