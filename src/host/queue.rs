//! Deferred host calls
//!
//! Role controllers call the host synchronously from inside event handlers,
//! while an async host stack can only act from its own task. [`CommandQueue`]
//! bridges the two: every call is recorded as a [`HostCommand`] that the
//! adapter task drains and executes after the handler returns.

use heapless::{Deque, Vec};

use crate::config;
use crate::gatt::{DiscoverRequest, Subscription};
use crate::host::traits::{
    Address, CentralHost, ConnHandle, ConnectionRefs, HostError, PairingHost, PeripheralHost, ScanMode,
};
use crate::nus::table::AttributeTable;
use crate::security::SecurityLevel;

/// Commands kept before the adapter must drain
pub const QUEUE_DEPTH: usize = 8;

type AdPayload = Vec<u8, { config::advertising::MAX_AD_LEN }>;

/// A host call waiting to be executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    StartScan(ScanMode),
    StopScan,
    Connect(ConnHandle, Address),
    Disconnect(ConnHandle),
    Discover(ConnHandle, DiscoverRequest),
    Subscribe(ConnHandle, Subscription),
    PairingConfirm(ConnHandle),
    PasskeyConfirm(ConnHandle),
    PasskeyEntry(ConnHandle, u32),
    AuthCancel(ConnHandle),
    StartAdvertising { adv_data: AdPayload, scan_data: AdPayload },
    RequestSecurity(ConnHandle, SecurityLevel),
    Notify(ConnHandle, u16, u8),
}

/// Host implementation that queues calls for an async adapter
#[derive(Debug)]
pub struct CommandQueue {
    commands: Deque<HostCommand, QUEUE_DEPTH>,
    base_handle: u16,
    next_conn: u16,
    live: Option<(ConnHandle, Address)>,
    refs: u8,
}

impl CommandQueue {
    /// `base_handle` is where the adapter's server placed the NUS table
    pub const fn new(base_handle: u16) -> Self {
        Self {
            commands: Deque::new(),
            base_handle,
            next_conn: 1,
            live: None,
            refs: 0,
        }
    }

    /// Next command to execute
    pub fn pop(&mut self) -> Option<HostCommand> {
        self.commands.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Adapter accepted a connection from `peer`; returns its handle
    pub fn link_up(&mut self, peer: Address) -> ConnHandle {
        let conn = self.allocate();
        self.live = Some((conn, peer));
        conn
    }

    /// Adapter lost the link
    pub fn link_down(&mut self, conn: ConnHandle) {
        if self.live.map(|(c, _)| c) == Some(conn) {
            self.live = None;
            self.refs = 0;
        }
    }

    /// References held on the live link
    pub fn refs(&self) -> u8 {
        self.refs
    }

    fn allocate(&mut self) -> ConnHandle {
        let conn = ConnHandle(self.next_conn);
        self.next_conn = self.next_conn.wrapping_add(1).max(1);
        conn
    }

    fn push(&mut self, command: HostCommand) -> Result<(), HostError> {
        self.commands.push_back(command).map_err(|_| HostError::NoResources)
    }

    fn is_live(&self, conn: ConnHandle) -> bool {
        self.live.map(|(c, _)| c) == Some(conn)
    }
}

impl ConnectionRefs for CommandQueue {
    fn conn_ref(&mut self, conn: ConnHandle) -> Result<ConnHandle, HostError> {
        if !self.is_live(conn) {
            return Err(HostError::NotConnected);
        }
        self.refs = self.refs.saturating_add(1);
        Ok(conn)
    }

    fn conn_unref(&mut self, conn: ConnHandle) {
        if self.is_live(conn) {
            self.refs = self.refs.saturating_sub(1);
            if self.refs == 0 {
                let _ = self.push(HostCommand::Disconnect(conn));
            }
        }
    }

    fn peer_address(&self, conn: ConnHandle) -> Option<Address> {
        self.live.filter(|(c, _)| *c == conn).map(|(_, addr)| addr)
    }
}

impl PairingHost for CommandQueue {
    fn pairing_confirm(&mut self, conn: ConnHandle) -> Result<(), HostError> {
        self.push(HostCommand::PairingConfirm(conn))
    }

    fn passkey_confirm(&mut self, conn: ConnHandle) -> Result<(), HostError> {
        self.push(HostCommand::PasskeyConfirm(conn))
    }

    fn passkey_entry(&mut self, conn: ConnHandle, passkey: u32) -> Result<(), HostError> {
        self.push(HostCommand::PasskeyEntry(conn, passkey))
    }

    fn auth_cancel(&mut self, conn: ConnHandle) -> Result<(), HostError> {
        self.push(HostCommand::AuthCancel(conn))
    }
}

impl CentralHost for CommandQueue {
    fn start_scan(&mut self, mode: ScanMode) -> Result<(), HostError> {
        self.push(HostCommand::StartScan(mode))
    }

    fn stop_scan(&mut self) -> Result<(), HostError> {
        self.push(HostCommand::StopScan)
    }

    fn create_connection(&mut self, peer: &Address) -> Result<ConnHandle, HostError> {
        if self.live.is_some() {
            return Err(HostError::NoResources);
        }
        let conn = self.allocate();
        self.push(HostCommand::Connect(conn, *peer))?;
        self.live = Some((conn, *peer));
        self.refs = 1;
        Ok(conn)
    }

    fn discover(&mut self, conn: ConnHandle, request: &DiscoverRequest) -> Result<(), HostError> {
        if !self.is_live(conn) {
            return Err(HostError::NotConnected);
        }
        self.push(HostCommand::Discover(conn, *request))
    }

    fn subscribe(&mut self, conn: ConnHandle, subscription: &Subscription) -> Result<(), HostError> {
        if !self.is_live(conn) {
            return Err(HostError::NotConnected);
        }
        self.push(HostCommand::Subscribe(conn, *subscription))
    }
}

impl PeripheralHost for CommandQueue {
    fn register_service(&mut self, _table: &AttributeTable) -> Result<u16, HostError> {
        // The adapter's GATT server owns the table; only its placement is reported
        Ok(self.base_handle)
    }

    fn start_advertising(&mut self, adv_data: &[u8], scan_data: &[u8]) -> Result<(), HostError> {
        let adv_data = Vec::from_slice(adv_data).map_err(|_| HostError::InvalidParameter)?;
        let scan_data = Vec::from_slice(scan_data).map_err(|_| HostError::InvalidParameter)?;
        self.push(HostCommand::StartAdvertising { adv_data, scan_data })
    }

    fn request_security(&mut self, conn: ConnHandle, level: SecurityLevel) -> Result<(), HostError> {
        if !self.is_live(conn) {
            return Err(HostError::NotConnected);
        }
        self.push(HostCommand::RequestSecurity(conn, level))
    }

    fn notify(&mut self, conn: ConnHandle, handle: u16, data: &[u8]) -> Result<(), HostError> {
        if !self.is_live(conn) {
            return Err(HostError::NotConnected);
        }
        let &[byte] = data else {
            return Err(HostError::InvalidParameter);
        };
        self.push(HostCommand::Notify(conn, handle, byte))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::central::{CentralController, LogNotifications};
    use crate::config::RoleConfig;
    use crate::host::{AdvReportKind, ConnectionEvents, ScanEvents};
    use crate::advertising::payload;

    fn peer() -> Address {
        Address::random([1, 2, 3, 4, 5, 6])
    }

    #[test]
    fn test_commands_drain_in_order() {
        let mut queue = CommandQueue::new(0x0010);
        queue.start_scan(ScanMode::Active).unwrap();
        queue.stop_scan().unwrap();

        assert_eq!(queue.pop(), Some(HostCommand::StartScan(ScanMode::Active)));
        assert_eq!(queue.pop(), Some(HostCommand::StopScan));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_full_queue_reports_no_resources() {
        let mut queue = CommandQueue::new(0x0010);
        for _ in 0..QUEUE_DEPTH {
            queue.stop_scan().unwrap();
        }
        assert_eq!(queue.stop_scan(), Err(HostError::NoResources));
    }

    #[test]
    fn test_connection_refs() {
        let mut queue = CommandQueue::new(0x0010);
        assert_eq!(queue.conn_ref(ConnHandle(1)), Err(HostError::NotConnected));

        let conn = queue.link_up(peer());
        assert_eq!(queue.peer_address(conn), Some(peer()));
        queue.conn_ref(conn).unwrap();
        assert_eq!(queue.refs(), 1);

        // Last reference dropped: the adapter disconnects
        queue.conn_unref(conn);
        assert_eq!(queue.pop(), Some(HostCommand::Disconnect(conn)));

        queue.link_down(conn);
        assert_eq!(queue.peer_address(conn), None);
    }

    #[test]
    fn test_notify_takes_one_byte() {
        let mut queue = CommandQueue::new(0x0010);
        let conn = queue.link_up(peer());

        assert_eq!(queue.notify(conn, 0x14, b"AB"), Err(HostError::InvalidParameter));
        queue.notify(conn, 0x14, b"A").unwrap();
        assert_eq!(queue.pop(), Some(HostCommand::Notify(conn, 0x14, b'A')));
        assert_eq!(queue.notify(ConnHandle(99), 0x14, b"A"), Err(HostError::NotConnected));
    }

    #[test]
    fn test_drives_central_controller() {
        let mut central = CentralController::new(
            CommandQueue::new(0x0010),
            RoleConfig::central(),
            LogNotifications,
        );
        central.start().unwrap();
        let adv = payload::nus_advertisement().unwrap();
        central.device_found(&peer(), -50, AdvReportKind::AdvInd, &adv).unwrap();

        let queue = central.host_mut();
        assert_eq!(queue.pop(), Some(HostCommand::StartScan(ScanMode::Active)));
        assert_eq!(queue.pop(), Some(HostCommand::StopScan));
        assert_eq!(queue.pop(), Some(HostCommand::Connect(ConnHandle(1), peer())));
        assert!(queue.is_empty());

        // Connection attempt failed: reference dropped, scanning resumes
        central.connected(ConnHandle(1), 0x3E).unwrap();
        let queue = central.host_mut();
        assert_eq!(queue.pop(), Some(HostCommand::Disconnect(ConnHandle(1))));
        assert_eq!(queue.pop(), Some(HostCommand::StartScan(ScanMode::Passive)));
    }
}
