//! Device controller — owns the channels and the backend, runs the timing sweep.
//!
//! [`RelayBoard`] is created once with a fixed [`BoardLayout`]. The host calls
//! [`RelayBoard::tick`] (or [`RelayBoard::poll`]) from its main loop; momentary
//! relays switch off and indicators blink no later than the next tick after
//! their deadline.
//!
//! All calls must come from one execution context. A multi-threaded host
//! has to put the whole board behind a single mutex.

use crate::backend::Backend;
use crate::clock::{Clock, Millis};
use crate::error::{RelayError, Result};
use crate::indicator::{Indicator, IndicatorMut};
use crate::layout::{BoardLayout, BoardVariant, IndicatorKind};
use crate::relay::{OutputState, Relay, RelayMut};
use crate::snapshot::{IndicatorEntry, RelayEntry, Snapshot};

/// Index returned by [`RelayBoard::lookup`] and [`RelayBoard::lookup_index`]
/// when nothing matches.
pub const FALLBACK_RELAY: usize = 0;

/// Relay change observer: `(relay index, new state)`.
pub type ChangeCallback = Box<dyn FnMut(usize, OutputState)>;

/// Everything a channel needs to touch the outside world.
pub(crate) struct Hardware {
    pub(crate) backend: Backend,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) on_change: Option<ChangeCallback>,
}

impl Hardware {
    pub(crate) fn new(backend: Backend, clock: impl Clock + 'static) -> Self {
        Self {
            backend,
            clock: Box::new(clock),
            on_change: None,
        }
    }
}

/// Transitions made by one timing sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Relays switched off because their momentary window ran out.
    pub expired: Vec<usize>,
    /// Indicators that flipped, in sweep order.
    pub flipped: Vec<IndicatorKind>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.flipped.is_empty()
    }
}

pub struct RelayBoard {
    layout: BoardLayout,
    relays: Vec<Relay>,
    primary: Indicator,
    secondary: Option<Indicator>,
    hw: Hardware,
}

impl RelayBoard {
    /// Build a board. `banks` only matters for the shift-register variant and is clamped.
    pub fn new(
        variant: BoardVariant,
        banks: usize,
        backend: Backend,
        clock: impl Clock + 'static,
    ) -> Result<Self> {
        Self::with_layout(BoardLayout::new(variant, banks), backend, clock)
    }

    /// 4-relay direct-GPIO board.
    pub fn default_board(backend: Backend, clock: impl Clock + 'static) -> Result<Self> {
        Self::with_layout(BoardLayout::default(), backend, clock)
    }

    pub fn with_layout(
        layout: BoardLayout,
        mut backend: Backend,
        clock: impl Clock + 'static,
    ) -> Result<Self> {
        let variant = layout.variant();
        if variant.is_shift_register() != backend.is_shift_register() {
            return Err(RelayError::BackendMismatch { variant });
        }
        // Shift-register chains power up in an unknown state.
        backend.reset();

        let relays = (0..layout.relay_count())
            .map(|i| Relay::new(i, layout.relay_address(i)))
            .collect();
        let primary = Indicator::new(
            IndicatorKind::Primary,
            layout.indicator_address(IndicatorKind::Primary),
        );
        let secondary = layout.has_secondary_indicator().then(|| {
            Indicator::new(
                IndicatorKind::Secondary,
                layout.indicator_address(IndicatorKind::Secondary),
            )
        });

        log::debug!(
            "board {variant}: {} relays, {} indicator(s)",
            layout.relay_count(),
            layout.indicator_count()
        );

        Ok(Self {
            layout,
            relays,
            primary,
            secondary,
            hw: Hardware::new(backend, clock),
        })
    }

    pub fn layout(&self) -> BoardLayout {
        self.layout
    }

    pub fn variant(&self) -> BoardVariant {
        self.layout.variant()
    }

    pub fn number_of_relays(&self) -> usize {
        self.relays.len()
    }

    pub fn number_of_indicators(&self) -> usize {
        self.layout.indicator_count()
    }

    /// Current time on the board's clock.
    pub fn now(&self) -> Millis {
        self.hw.clock.now_ms()
    }

    // ── Hardware bring-up ──

    /// Drive every output OFF: secondary indicator, all relays, primary indicator.
    pub fn initialize(&mut self) -> Result<()> {
        if let Some(secondary) = self.secondary.as_mut() {
            secondary.write_state(&mut self.hw, OutputState::Off)?;
        }
        for relay in &mut self.relays {
            relay.write_state(&mut self.hw, OutputState::Off)?;
        }
        self.primary.write_state(&mut self.hw, OutputState::Off)?;
        Ok(())
    }

    // ── Change notification ──

    /// Register the relay change callback, replacing any previous one.
    pub fn on_change(&mut self, callback: impl FnMut(usize, OutputState) + 'static) {
        self.hw.on_change = Some(Box::new(callback));
    }

    pub fn clear_on_change(&mut self) {
        self.hw.on_change = None;
    }

    // ── Relay access ──

    pub fn relays(&self) -> &[Relay] {
        &self.relays
    }

    /// Relay at `index`, without fallback.
    pub fn relay(&self, index: usize) -> Option<&Relay> {
        self.relays.get(index)
    }

    /// Index of the first relay whose display name is `name`, without fallback.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.relays.iter().position(|r| r.name() == name)
    }

    /// Relay by display name. Unmatched names yield relay [`FALLBACK_RELAY`].
    pub fn lookup(&mut self, name: &str) -> RelayMut<'_> {
        let index = self.find(name).unwrap_or_else(|| {
            log::debug!("no relay named \"{name}\", falling back to relay {FALLBACK_RELAY}");
            FALLBACK_RELAY
        });
        self.relay_view(index)
    }

    /// Relay by index. Out-of-range indices (including `number_of_relays()`)
    /// yield relay [`FALLBACK_RELAY`].
    pub fn lookup_index(&mut self, index: usize) -> RelayMut<'_> {
        let index = self.resolve_index(index);
        self.relay_view(index)
    }

    fn resolve_index(&self, index: usize) -> usize {
        if index < self.relays.len() {
            index
        } else {
            log::debug!("relay index {index} out of range, falling back to relay {FALLBACK_RELAY}");
            FALLBACK_RELAY
        }
    }

    fn relay_view(&mut self, index: usize) -> RelayMut<'_> {
        RelayMut {
            relay: &mut self.relays[index],
            hw: &mut self.hw,
        }
    }

    /// State of relay `index` (fallback rules of [`lookup_index`](Self::lookup_index)).
    pub fn relay_state(&self, index: usize) -> Result<OutputState> {
        self.relays[self.resolve_index(index)].read_state(&self.hw)
    }

    pub fn set_relay_state(&mut self, index: usize, state: OutputState) -> Result<()> {
        self.lookup_index(index).set_state(state)
    }

    // ── Indicator access ──

    /// Indicator view. Boards with one indicator answer `Secondary` with the primary.
    pub fn indicator(&mut self, kind: IndicatorKind) -> IndicatorMut<'_> {
        let indicator = match (self.layout.resolve_indicator(kind), self.secondary.as_mut()) {
            (IndicatorKind::Secondary, Some(secondary)) => secondary,
            _ => &mut self.primary,
        };
        IndicatorMut {
            indicator,
            hw: &mut self.hw,
        }
    }

    pub fn indicator_state(&self, kind: IndicatorKind) -> Result<OutputState> {
        let indicator = match (self.layout.resolve_indicator(kind), &self.secondary) {
            (IndicatorKind::Secondary, Some(secondary)) => secondary,
            _ => &self.primary,
        };
        indicator.read_state(&self.hw)
    }

    /// Set an indicator, keeping its blink timing.
    pub fn set_indicator_state(&mut self, kind: IndicatorKind, state: OutputState) -> Result<()> {
        self.indicator(kind).set_state(state)
    }

    /// Set an indicator and its blink timing (milliseconds).
    pub fn set_indicator(
        &mut self,
        kind: IndicatorKind,
        state: OutputState,
        on_ms: i32,
        off_ms: i32,
    ) -> Result<()> {
        self.indicator(kind).set_state_with_timing(state, on_ms, off_ms)
    }

    // ── Timing sweep ──

    /// Expire momentary relays, then advance indicator blinking (secondary
    /// first, then primary).
    pub fn tick(&mut self, now: Millis) -> Result<TickReport> {
        let mut report = TickReport::default();

        for relay in &mut self.relays {
            if relay.is_momentary()
                && relay.read_state(&self.hw)?.is_on()
                && relay.check_expiry(&mut self.hw, now)?
            {
                report.expired.push(relay.index());
            }
        }

        if let Some(secondary) = self.secondary.as_mut()
            && secondary.check_timing(&mut self.hw, now)?
        {
            report.flipped.push(IndicatorKind::Secondary);
        }
        if self.primary.check_timing(&mut self.hw, now)? {
            report.flipped.push(IndicatorKind::Primary);
        }

        Ok(report)
    }

    /// [`tick`](Self::tick) at the board clock's current time.
    pub fn poll(&mut self) -> Result<TickReport> {
        let now = self.now();
        self.tick(now)
    }

    // ── Snapshot ──

    /// Read the whole board into a document. No physical writes.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let relays = self
            .relays
            .iter()
            .map(|relay| -> Result<RelayEntry> {
                Ok(RelayEntry {
                    name: Some(relay.name().to_string()),
                    state: Some(relay.read_state(&self.hw)?),
                    duration: Some(relay.momentary_duration()),
                    ud: Some(relay.user_tag().to_string()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let rled = Some(self.indicator_entry(&self.primary)?);
        let gled = match &self.secondary {
            Some(secondary) => Some(self.indicator_entry(secondary)?),
            None => None,
        };

        Ok(Snapshot {
            number_of_relays: self.relays.len() as i64,
            relays,
            rled,
            gled,
        })
    }

    fn indicator_entry(&self, indicator: &Indicator) -> Result<IndicatorEntry> {
        Ok(IndicatorEntry {
            on: Some(indicator.on_duration()),
            off: Some(indicator.off_duration()),
            state: Some(indicator.read_state(&self.hw)?),
        })
    }

    /// Serialize [`snapshot`](Self::snapshot) to compact JSON.
    pub fn snapshot_json(&self) -> Result<String> {
        self.snapshot()?.to_json()
    }

    /// Parse a JSON document and apply it.
    ///
    /// Nothing is applied when the document is malformed or lacks
    /// `numberofRelays`.
    pub fn apply_snapshot(&mut self, doc: &str) -> Result<()> {
        let snapshot = Snapshot::parse(doc)?;
        self.apply(&snapshot)
    }

    /// Apply the fields present in `snapshot`.
    ///
    /// Indicator sections are applied first (`gled` only on boards that have
    /// a secondary indicator). Then the first `min(board relays,
    /// numberofRelays)` relay entries are applied in order; later entries and
    /// relays past the end of the list are left alone.
    pub fn apply(&mut self, snapshot: &Snapshot) -> Result<()> {
        if let Some(entry) = &snapshot.rled {
            self.apply_indicator(IndicatorKind::Primary, entry)?;
        }
        if self.layout.has_secondary_indicator()
            && let Some(entry) = &snapshot.gled
        {
            self.apply_indicator(IndicatorKind::Secondary, entry)?;
        }

        let count = snapshot.apply_count(self.relays.len());
        log::debug!(
            "applying {count} of {} relay entries",
            snapshot.relays.len()
        );
        for (index, entry) in snapshot.relays.iter().take(count).enumerate() {
            let mut relay = self.relay_view(index);
            if let Some(name) = &entry.name {
                relay.set_name(name.as_str());
            }
            if let Some(duration) = entry.duration {
                relay.set_momentary_duration(duration);
            }
            if let Some(state) = entry.state {
                relay.set_state(state)?;
            }
            if let Some(tag) = &entry.ud {
                relay.set_user_tag(tag);
            }
        }
        Ok(())
    }

    fn apply_indicator(&mut self, kind: IndicatorKind, entry: &IndicatorEntry) -> Result<()> {
        let mut view = self.indicator(kind);
        let on = entry.on.unwrap_or(view.on_duration());
        let off = entry.off.unwrap_or(view.off_duration());
        match entry.state {
            Some(state) => view.set_state_with_timing(state, on, off),
            None => {
                view.indicator.set_timing(on, off);
                Ok(())
            }
        }
    }
}
