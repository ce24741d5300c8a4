//! Bluetooth UUIDs as used in attribute tables and advertisements
//!
//! 128-bit UUIDs are stored in little-endian byte order, the order in which
//! they appear on air and in advertisement records. Comparisons are plain
//! byte comparisons, so there is no byte-order conversion anywhere.

use core::fmt;

/// Primary service declaration attribute type
pub const PRIMARY_SERVICE: Uuid = Uuid::new_short(0x2800);
/// Characteristic declaration attribute type
pub const CHARACTERISTIC: Uuid = Uuid::new_short(0x2803);
/// Client Characteristic Configuration descriptor
pub const CLIENT_CHARACTERISTIC_CONFIGURATION: Uuid = Uuid::new_short(0x2902);

/// A 16-bit SIG assigned or 128-bit vendor UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uuid {
    /// SIG assigned 16-bit UUID
    Uuid16(u16),
    /// Vendor UUID, little-endian
    Uuid128([u8; 16]),
}

impl Uuid {
    /// Create a 16-bit UUID
    pub const fn new_short(value: u16) -> Self {
        Self::Uuid16(value)
    }

    /// Create a 128-bit UUID from little-endian bytes
    pub const fn new_long(bytes: [u8; 16]) -> Self {
        Self::Uuid128(bytes)
    }

    /// Build a 128-bit UUID from an on-air slice.
    ///
    /// Returns `None` unless the slice is exactly 16 bytes long.
    pub fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; 16] = bytes.try_into().ok()?;
        Some(Self::Uuid128(array))
    }

    /// Whether this is a 128-bit UUID equal to `bytes` (little-endian)
    pub fn matches_le(&self, bytes: &[u8]) -> bool {
        match self {
            Self::Uuid128(own) => own.as_slice() == bytes,
            Self::Uuid16(_) => false,
        }
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid16(value) => write!(f, "{:04x}", value),
            Self::Uuid128(bytes) => {
                // Canonical form is big-endian with 8-4-4-4-12 grouping
                for (i, byte) in bytes.iter().rev().enumerate() {
                    if matches!(i, 4 | 6 | 8 | 10) {
                        f.write_str("-")?;
                    }
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::nus::SERVICE_UUID;

    #[test]
    fn test_display_nus_service() {
        let uuid = Uuid::new_long(SERVICE_UUID);
        assert_eq!(uuid.to_string(), "6e400001-b5a3-f393-e0a9-e50e24dcca9e");
    }

    #[test]
    fn test_display_short() {
        assert_eq!(CLIENT_CHARACTERISTIC_CONFIGURATION.to_string(), "2902");
    }

    #[test]
    fn test_from_le_slice_requires_16_bytes() {
        assert!(Uuid::from_le_slice(&SERVICE_UUID[..15]).is_none());
        assert_eq!(
            Uuid::from_le_slice(&SERVICE_UUID),
            Some(Uuid::new_long(SERVICE_UUID))
        );
    }

    #[test]
    fn test_matches_le_is_exact() {
        let uuid = Uuid::new_long(SERVICE_UUID);
        assert!(uuid.matches_le(&SERVICE_UUID));

        let mut reversed = SERVICE_UUID;
        reversed.reverse();
        assert!(!uuid.matches_le(&reversed));
        assert!(!CLIENT_CHARACTERISTIC_CONFIGURATION.matches_le(&SERVICE_UUID));
    }
}
