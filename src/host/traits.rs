//! Host stack interface
//!
//! The BLE host (link layer, ATT, SMP, L2CAP, advertising and scanning) is
//! an external collaborator. These traits are the calls the role
//! controllers make into it, allowing the real TrouBLE adapter to be swapped
//! with a mock for testing.

use core::fmt;

use crate::gatt::{DiscoverRequest, Subscription};
use crate::nus::table::AttributeTable;
use crate::security::SecurityLevel;

/// Opaque reference to a link-layer connection owned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle(pub u16);

/// Kind of LE device address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Public,
    Random,
}

/// LE device address, bytes in on-air (little-endian) order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub kind: AddressKind,
    pub addr: [u8; 6],
}

impl Address {
    pub const fn random(addr: [u8; 6]) -> Self {
        Self {
            kind: AddressKind::Random,
            addr,
        }
    }

    pub const fn public(addr: [u8; 6]) -> Self {
        Self {
            kind: AddressKind::Public,
            addr,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.addr;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a[5], a[4], a[3], a[2], a[1], a[0]
        )?;
        match self.kind {
            AddressKind::Public => f.write_str(" (public)"),
            AddressKind::Random => f.write_str(" (random)"),
        }
    }
}

/// Peer address for log lines, `unknown` when the host has none
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer(pub Option<Address>);

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(addr) => fmt::Display::fmt(addr, f),
            None => f.write_str("unknown"),
        }
    }
}

/// Advertising report PDU type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvReportKind {
    /// Connectable undirected (ADV_IND)
    AdvInd,
    /// Connectable directed (ADV_DIRECT_IND)
    AdvDirectInd,
    /// Scannable undirected (ADV_SCAN_IND)
    AdvScanInd,
    /// Non-connectable undirected (ADV_NONCONN_IND)
    AdvNonconnInd,
    /// Scan response
    ScanRsp,
}

impl AdvReportKind {
    /// Decode the HCI event type byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::AdvInd),
            0x01 => Some(Self::AdvDirectInd),
            0x02 => Some(Self::AdvScanInd),
            0x03 => Some(Self::AdvNonconnInd),
            0x04 => Some(Self::ScanRsp),
            _ => None,
        }
    }

    /// Only these can lead to a connection
    pub fn is_connectable(self) -> bool {
        matches!(self, Self::AdvInd | Self::AdvDirectInd)
    }
}

/// Scan type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Send scan requests to collect scan responses
    Active,
    /// Listen only
    Passive,
}

/// Whether the host should keep invoking a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterControl {
    Continue,
    Stop,
}

/// Errors returned by host stack calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    /// Host refused the call with a stack specific code
    Rejected(i32),
    /// CCC write for a subscription that is already in place
    AlreadySubscribed,
    /// Connection is gone
    NotConnected,
    /// Out of buffers, connection slots or similar
    NoResources,
    /// Arguments rejected by the host
    InvalidParameter,
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(code) => write!(f, "rejected (err {})", code),
            Self::AlreadySubscribed => f.write_str("already subscribed"),
            Self::NotConnected => f.write_str("not connected"),
            Self::NoResources => f.write_str("no resources"),
            Self::InvalidParameter => f.write_str("invalid parameter"),
        }
    }
}

/// Connection reference counting
pub trait ConnectionRefs {
    /// Take an extra reference on a live connection
    fn conn_ref(&mut self, conn: ConnHandle) -> Result<ConnHandle, HostError>;

    /// Drop a reference taken with `conn_ref` or returned by `create_connection`
    fn conn_unref(&mut self, conn: ConnHandle);

    /// Peer address of a connection, for logging
    fn peer_address(&self, conn: ConnHandle) -> Option<Address>;
}

/// Replies to pairing prompts
pub trait PairingHost {
    /// Accept a "just works" / pairing confirmation request
    fn pairing_confirm(&mut self, conn: ConnHandle) -> Result<(), HostError>;

    /// Confirm that the displayed numeric comparison value matches
    fn passkey_confirm(&mut self, conn: ConnHandle) -> Result<(), HostError>;

    /// Enter a passkey for keyboard pairing
    fn passkey_entry(&mut self, conn: ConnHandle, passkey: u32) -> Result<(), HostError>;

    /// Abort the pairing procedure
    fn auth_cancel(&mut self, conn: ConnHandle) -> Result<(), HostError>;
}

/// Calls made by the central role
pub trait CentralHost: ConnectionRefs + PairingHost {
    fn start_scan(&mut self, mode: ScanMode) -> Result<(), HostError>;

    fn stop_scan(&mut self) -> Result<(), HostError>;

    /// Initiate a connection; the returned handle carries one reference
    fn create_connection(&mut self, peer: &Address) -> Result<ConnHandle, HostError>;

    /// Submit a discovery request; results arrive as discovery events
    fn discover(&mut self, conn: ConnHandle, request: &DiscoverRequest) -> Result<(), HostError>;

    /// Write the CCC descriptor; notifications arrive as notification events
    fn subscribe(&mut self, conn: ConnHandle, subscription: &Subscription) -> Result<(), HostError>;
}

/// Calls made by the peripheral role
pub trait PeripheralHost: ConnectionRefs + PairingHost {
    /// Register an attribute table, returning the handle of its first attribute
    fn register_service(&mut self, table: &AttributeTable) -> Result<u16, HostError>;

    /// Start connectable advertising
    fn start_advertising(&mut self, adv_data: &[u8], scan_data: &[u8]) -> Result<(), HostError>;

    /// Ask the host to raise the link to at least `level`
    fn request_security(&mut self, conn: ConnHandle, level: SecurityLevel) -> Result<(), HostError>;

    /// Send a notification for the attribute at `handle`
    fn notify(&mut self, conn: ConnHandle, handle: u16, data: &[u8]) -> Result<(), HostError>;
}

#[cfg(test)]
pub mod mock {
    //! Mock host stack for testing

    use super::*;
    use heapless::Vec;

    /// Host operation, used to target injected errors
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum HostOp {
        ConnRef,
        StartScan,
        StopScan,
        CreateConnection,
        Discover,
        Subscribe,
        PairingConfirm,
        PasskeyConfirm,
        PasskeyEntry,
        AuthCancel,
        RegisterService,
        StartAdvertising,
        RequestSecurity,
        Notify,
    }

    /// Record of a call made into the mock
    #[derive(Debug, Clone, PartialEq)]
    pub enum HostCall {
        ConnRef(ConnHandle),
        ConnUnref(ConnHandle),
        StartScan(ScanMode),
        StopScan,
        CreateConnection(Address),
        Discover(ConnHandle, DiscoverRequest),
        Subscribe(ConnHandle, Subscription),
        PairingConfirm(ConnHandle),
        PasskeyConfirm(ConnHandle),
        PasskeyEntry(ConnHandle, u32),
        AuthCancel(ConnHandle),
        RegisterService(usize),
        StartAdvertising {
            adv_data: Vec<u8, 31>,
            scan_data: Vec<u8, 31>,
        },
        RequestSecurity(ConnHandle, SecurityLevel),
        Notify(ConnHandle, u16, Vec<u8, 20>),
    }

    /// Mock host for unit testing
    pub struct MockHost {
        /// Every call, in order
        calls: Vec<HostCall, 64>,
        /// Errors to return on the next matching call
        failures: Vec<(HostOp, HostError), 8>,
        /// Handle given to the next created connection
        next_conn: u16,
        /// Handle assigned to the first attribute of a registered table
        base_handle: u16,
        /// Peer address reported for every connection
        peer: Address,
    }

    impl MockHost {
        /// Create a new mock host
        pub fn new() -> Self {
            Self {
                calls: Vec::new(),
                failures: Vec::new(),
                next_conn: 1,
                base_handle: 0x0010,
                peer: Address::random([0xff, 0x8f, 0x1a, 0x05, 0xe4, 0xff]),
            }
        }

        /// Fail the next call of kind `op` with `error`
        pub fn fail_next(&mut self, op: HostOp, error: HostError) {
            let _ = self.failures.push((op, error));
        }

        /// Set the handle the next registered table starts at
        pub fn set_base_handle(&mut self, handle: u16) {
            self.base_handle = handle;
        }

        /// All recorded calls
        pub fn calls(&self) -> &[HostCall] {
            &self.calls
        }

        /// Number of recorded calls matching `pred`
        pub fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
            self.calls.iter().filter(|c| pred(*c)).count()
        }

        /// Most recent call
        pub fn last_call(&self) -> Option<&HostCall> {
            self.calls.last()
        }

        /// Forget recorded calls
        pub fn clear_calls(&mut self) {
            self.calls.clear();
        }

        fn record(&mut self, op: HostOp, call: HostCall) -> Result<(), HostError> {
            let _ = self.calls.push(call);
            match self.failures.iter().position(|(o, _)| *o == op) {
                Some(idx) => Err(self.failures.remove(idx).1),
                None => Ok(()),
            }
        }
    }

    impl Default for MockHost {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ConnectionRefs for MockHost {
        fn conn_ref(&mut self, conn: ConnHandle) -> Result<ConnHandle, HostError> {
            self.record(HostOp::ConnRef, HostCall::ConnRef(conn))?;
            Ok(conn)
        }

        fn conn_unref(&mut self, conn: ConnHandle) {
            let _ = self.calls.push(HostCall::ConnUnref(conn));
        }

        fn peer_address(&self, _conn: ConnHandle) -> Option<Address> {
            Some(self.peer)
        }
    }

    impl PairingHost for MockHost {
        fn pairing_confirm(&mut self, conn: ConnHandle) -> Result<(), HostError> {
            self.record(HostOp::PairingConfirm, HostCall::PairingConfirm(conn))
        }

        fn passkey_confirm(&mut self, conn: ConnHandle) -> Result<(), HostError> {
            self.record(HostOp::PasskeyConfirm, HostCall::PasskeyConfirm(conn))
        }

        fn passkey_entry(&mut self, conn: ConnHandle, passkey: u32) -> Result<(), HostError> {
            self.record(HostOp::PasskeyEntry, HostCall::PasskeyEntry(conn, passkey))
        }

        fn auth_cancel(&mut self, conn: ConnHandle) -> Result<(), HostError> {
            self.record(HostOp::AuthCancel, HostCall::AuthCancel(conn))
        }
    }

    impl CentralHost for MockHost {
        fn start_scan(&mut self, mode: ScanMode) -> Result<(), HostError> {
            self.record(HostOp::StartScan, HostCall::StartScan(mode))
        }

        fn stop_scan(&mut self) -> Result<(), HostError> {
            self.record(HostOp::StopScan, HostCall::StopScan)
        }

        fn create_connection(&mut self, peer: &Address) -> Result<ConnHandle, HostError> {
            self.record(HostOp::CreateConnection, HostCall::CreateConnection(*peer))?;
            let conn = ConnHandle(self.next_conn);
            self.next_conn = self.next_conn.wrapping_add(1);
            Ok(conn)
        }

        fn discover(&mut self, conn: ConnHandle, request: &DiscoverRequest) -> Result<(), HostError> {
            self.record(HostOp::Discover, HostCall::Discover(conn, *request))
        }

        fn subscribe(&mut self, conn: ConnHandle, subscription: &Subscription) -> Result<(), HostError> {
            self.record(HostOp::Subscribe, HostCall::Subscribe(conn, *subscription))
        }
    }

    impl PeripheralHost for MockHost {
        fn register_service(&mut self, table: &AttributeTable) -> Result<u16, HostError> {
            self.record(HostOp::RegisterService, HostCall::RegisterService(table.len()))?;
            Ok(self.base_handle)
        }

        fn start_advertising(&mut self, adv_data: &[u8], scan_data: &[u8]) -> Result<(), HostError> {
            let call = HostCall::StartAdvertising {
                adv_data: Vec::from_slice(adv_data).map_err(|_| HostError::InvalidParameter)?,
                scan_data: Vec::from_slice(scan_data).map_err(|_| HostError::InvalidParameter)?,
            };
            self.record(HostOp::StartAdvertising, call)
        }

        fn request_security(&mut self, conn: ConnHandle, level: SecurityLevel) -> Result<(), HostError> {
            self.record(HostOp::RequestSecurity, HostCall::RequestSecurity(conn, level))
        }

        fn notify(&mut self, conn: ConnHandle, handle: u16, data: &[u8]) -> Result<(), HostError> {
            let payload = Vec::from_slice(data).map_err(|_| HostError::InvalidParameter)?;
            self.record(HostOp::Notify, HostCall::Notify(conn, handle, payload))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_mock_injected_error_is_one_shot() {
            let mut host = MockHost::new();
            host.fail_next(HostOp::StopScan, HostError::Rejected(-114));

            assert_eq!(host.stop_scan(), Err(HostError::Rejected(-114)));
            assert_eq!(host.stop_scan(), Ok(()));
            assert_eq!(host.count(|c| *c == HostCall::StopScan), 2);
        }

        #[test]
        fn test_mock_connections_get_fresh_handles() {
            let mut host = MockHost::new();
            let peer = Address::random([1, 2, 3, 4, 5, 6]);

            let a = host.create_connection(&peer).unwrap();
            let b = host.create_connection(&peer).unwrap();
            assert_ne!(a, b);
        }
    }
}
