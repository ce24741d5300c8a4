//! Advertising data: payload encoding for the peripheral, parsing and
//! target matching for the central

pub mod payload;
pub mod scanner;

pub use payload::{nus_advertisement, nus_scan_response, AdBuffer, AdStructure};
pub use scanner::{contains_uuid128, AdIter, AdRecord, TargetScanner};

/// Advertising data types used here
pub mod ad_type {
    pub const FLAGS: u8 = 0x01;
    pub const UUID128_INCOMPLETE: u8 = 0x06;
    pub const UUID128_COMPLETE: u8 = 0x07;
    pub const COMPLETE_NAME: u8 = 0x09;
}

/// Advertising data errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdError {
    /// Record length runs past the end of the payload
    Malformed,
    /// Encoded payload does not fit a legacy advertisement
    TooLong,
}
