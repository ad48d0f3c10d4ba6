//! relayctl — timer-driven output control for multi-channel relay boards.

pub mod backend;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod indicator;
pub mod layout;
pub mod relay;
pub mod snapshot;

pub use controller::{RelayBoard, TickReport};
pub use error::RelayError;
pub use layout::{BoardLayout, BoardVariant, IndicatorKind, PhysicalAddress};
pub use relay::OutputState;
