//! Unified error type for the relayctl-lib crate.
//!
//! [`RelayError`] covers channel binding, backend routing, document parsing
//! and configuration failures. `From` impls let `?` lift I/O and JSON errors
//! into it.

use std::fmt;

use crate::layout::{BoardVariant, PhysicalAddress};

/// Unified error type for relayctl-lib operations.
#[derive(Debug)]
pub enum RelayError {
    /// Channel was never bound to a physical address.
    UnboundChannel(usize),
    /// Address kind does not match the backend (GPIO pin on a shift-register bus, or vice versa).
    AddressMismatch(PhysicalAddress),
    /// Backend handed to the controller does not drive this board variant.
    BackendMismatch { variant: BoardVariant },
    /// Malformed snapshot document.
    Document(String),
    /// Mandatory snapshot field absent.
    MissingField(&'static str),
    /// Configuration validation error.
    Config(String),
    /// Standard I/O error (config persistence, document files).
    Io(std::io::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::UnboundChannel(index) => {
                write!(f, "Relay {} is not bound to a board address", index + 1)
            }
            RelayError::AddressMismatch(address) => {
                write!(f, "Address {address} cannot be driven by this backend")
            }
            RelayError::BackendMismatch { variant } => {
                write!(f, "Backend does not match board variant {variant}")
            }
            RelayError::Document(e) => write!(f, "Document error: {e}"),
            RelayError::MissingField(field) => {
                write!(f, "Document error: required field `{field}` not present")
            }
            RelayError::Config(e) => write!(f, "Config error: {e}"),
            RelayError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Io(e)
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Document(e.to_string())
    }
}

/// Crate-level Result alias using [`RelayError`].
pub type Result<T> = std::result::Result<T, RelayError>;
