//! Configuration constants for the NUS peripheral and central roles

use crate::security::{AuthMode, SecurityLevel};

/// Nordic UART Service identifiers
pub mod nus {
    /// Service UUID 6E400001-B5A3-F393-E0A9-E50E24DCCA9E (little-endian, as sent on air)
    pub const SERVICE_UUID: [u8; 16] = [
        0x9E, 0xCA, 0xDC, 0x24, 0x0E, 0xE5, 0xA9, 0xE0, 0x93, 0xF3, 0xA3, 0xB5, 0x01, 0x00, 0x40,
        0x6E,
    ];

    /// RX characteristic UUID 6E400002-... (client writes here)
    pub const RX_UUID: [u8; 16] = [
        0x9E, 0xCA, 0xDC, 0x24, 0x0E, 0xE5, 0xA9, 0xE0, 0x93, 0xF3, 0xA3, 0xB5, 0x02, 0x00, 0x40,
        0x6E,
    ];

    /// TX characteristic UUID 6E400003-... (server notifies here)
    pub const TX_UUID: [u8; 16] = [
        0x9E, 0xCA, 0xDC, 0x24, 0x0E, 0xE5, 0xA9, 0xE0, 0x93, 0xF3, 0xA3, 0xB5, 0x03, 0x00, 0x40,
        0x6E,
    ];

    /// Size of the RX backing storage in bytes
    pub const RX_VALUE_LEN: usize = 1;
}

/// Advertising payload settings
pub mod advertising {
    /// Name carried in the scan response
    pub const DEVICE_NAME: &str = "NUS Peripheral";

    /// Legacy advertising payload limit
    pub const MAX_AD_LEN: usize = 31;
}

/// Security settings shared by both roles
pub mod security {
    /// Passkey entered by the central in keyboard mode
    pub const FIXED_PASSKEY: u32 = 0x12345;
}

/// Peripheral notification settings
pub mod notify {
    /// Interval between TX notifications
    pub const INTERVAL_MS: u64 = 1000;

    /// First letter of the rotating notification payload
    pub const FIRST_CHAR: u8 = b'A';

    /// Number of letters before wrapping back to FIRST_CHAR
    pub const ALPHABET_LEN: usize = 26;
}

/// GATT discovery settings
pub mod discovery {
    pub const FIRST_HANDLE: u16 = 0x0001;
    pub const LAST_HANDLE: u16 = 0xFFFF;
}

/// Host stack sizing for the on-target builds
pub mod ble {
    /// Number of maximum concurrent connections
    pub const CONNECTIONS_MAX: usize = 1;
    /// Number of L2CAP channels (signal + att + smp)
    pub const L2CAP_CHANNELS_MAX: usize = 3;
    /// Number of services the GATT client caches
    pub const CLIENT_SERVICES_MAX: usize = 4;
    /// Random static address used by the peripheral
    pub const PERIPHERAL_ADDRESS: [u8; 6] = [0x41, 0x5A, 0xE3, 0x1E, 0x83, 0xE7];
    /// Random static address used by the central
    pub const CENTRAL_ADDRESS: [u8; 6] = [0xff, 0x8f, 0x1b, 0x05, 0xe4, 0xff];
}

/// Runtime knobs for a role controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleConfig {
    /// Minimum security level before notifications flow or discovery starts
    pub required_security: SecurityLevel,
    /// How pairing prompts are answered
    pub auth_mode: AuthMode,
}

impl RoleConfig {
    /// Defaults for the peripheral role
    pub const fn peripheral() -> Self {
        Self {
            required_security: SecurityLevel::Fips,
            auth_mode: AuthMode::NumericComparison,
        }
    }

    /// Defaults for the central role
    pub const fn central() -> Self {
        Self {
            required_security: SecurityLevel::Fips,
            auth_mode: AuthMode::NumericComparison,
        }
    }
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self::peripheral()
    }
}
