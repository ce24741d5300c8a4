//! Nordic UART Service
//!
//! Attribute table, RX write/read handlers, TX CCC tracking and the notify
//! API used by the peripheral role.

pub mod server;
pub mod table;

pub use server::{DataHandler, NusHandles, NusServer, RxEvent};
pub use table::AttributeTable;

use core::fmt;

use crate::host::HostError;

/// ATT protocol errors returned to the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttError {
    /// Handle does not belong to a served attribute
    InvalidHandle,
    /// Offset or offset + length past the end of the value
    InvalidOffset,
    /// Value length not valid for the attribute
    InvalidAttributeLength,
}

impl AttError {
    /// ATT error code sent on the wire
    pub fn code(self) -> u8 {
        match self {
            Self::InvalidHandle => 0x01,
            Self::InvalidOffset => 0x07,
            Self::InvalidAttributeLength => 0x0D,
        }
    }
}

/// NUS service errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NusError {
    /// `init` called without a data handler
    MissingDataHandler,
    /// Notify attempted while the client has not enabled notifications
    NotSubscribed,
    /// Host placed the table where its handles would overflow
    HandleRange,
    /// Host stack error
    Host(HostError),
}

impl From<HostError> for NusError {
    fn from(e: HostError) -> Self {
        Self::Host(e)
    }
}

impl fmt::Display for NusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDataHandler => f.write_str("no data handler"),
            Self::NotSubscribed => f.write_str("notifications not enabled"),
            Self::HandleRange => f.write_str("attribute handles out of range"),
            Self::Host(e) => write!(f, "host: {}", e),
        }
    }
}
