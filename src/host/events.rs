//! Events delivered by the host stack
//!
//! One method per host callback. The host adapter serializes delivery, so
//! implementors take `&mut self` and never run concurrently with each other.

use crate::gatt::DiscoveredAttribute;
use crate::host::traits::{Address, AdvReportKind, ConnHandle, IterControl};
use crate::nus::AttError;
use crate::security::SecurityLevel;

/// Connection lifecycle and security changes
pub trait ConnectionEvents {
    type Error;

    /// Link established (`status == 0`) or connection attempt failed
    fn connected(&mut self, conn: ConnHandle, status: u8) -> Result<(), Self::Error>;

    fn disconnected(&mut self, conn: ConnHandle, reason: u8) -> Result<(), Self::Error>;

    fn security_changed(&mut self, conn: ConnHandle, level: SecurityLevel) -> Result<(), Self::Error>;

    /// Resolvable private address mapped to an identity address
    fn identity_resolved(&mut self, rpa: &Address, identity: &Address) {
        log::info!("Identity resolved {} -> {}", rpa, identity);
    }
}

/// Pairing prompts raised by the security manager
pub trait AuthEvents {
    type Error;

    fn passkey_display(&mut self, conn: ConnHandle, passkey: u32) -> Result<(), Self::Error>;

    fn passkey_confirm(&mut self, conn: ConnHandle, passkey: u32) -> Result<(), Self::Error>;

    fn passkey_entry(&mut self, conn: ConnHandle) -> Result<(), Self::Error>;

    fn pairing_confirm(&mut self, conn: ConnHandle) -> Result<(), Self::Error>;

    fn cancel(&mut self, conn: ConnHandle) -> Result<(), Self::Error>;
}

/// Advertising reports while scanning
pub trait ScanEvents {
    type Error;

    fn device_found(
        &mut self,
        addr: &Address,
        rssi: i8,
        kind: AdvReportKind,
        data: &[u8],
    ) -> Result<(), Self::Error>;
}

/// Discovery results, once per found attribute or `None` when done
pub trait DiscoveryEvents {
    type Error;

    fn discovered(
        &mut self,
        conn: ConnHandle,
        attr: Option<DiscoveredAttribute>,
    ) -> Result<IterControl, Self::Error>;
}

/// Inbound notifications; `None` when the subscription was removed
pub trait NotificationEvents {
    fn notification(&mut self, conn: ConnHandle, data: Option<&[u8]>) -> IterControl;
}

/// Attribute server requests from a connected client
pub trait GattServerEvents {
    /// Write request or command; returns the number of bytes written
    fn write(&mut self, conn: ConnHandle, handle: u16, data: &[u8], offset: u16) -> Result<usize, AttError>;

    /// Read request; returns the number of bytes copied into `buf`
    fn read(&mut self, conn: ConnHandle, handle: u16, buf: &mut [u8], offset: u16) -> Result<usize, AttError>;

    /// CCC descriptor written
    fn ccc_changed(&mut self, handle: u16, value: u16);
}
