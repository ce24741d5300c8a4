//! Peripheral role
//!
//! Serves the Nordic UART Service, advertises it, requests the configured
//! security level on connect and pushes the rotating TX notification.

pub mod ticker;

pub use ticker::{run_notifier, NotificationTicker, NotifySink, TickSource};

use core::fmt;
use core::future::Future;

use crate::advertising::{payload, AdError};
use crate::config::RoleConfig;
use crate::host::{
    AuthEvents, ConnHandle, ConnectionEvents, GattServerEvents, HostError, Peer, PeripheralHost,
};
use crate::nus::server::read_attribute;
use crate::nus::{AttError, DataHandler, NusError, NusServer};
use crate::security::{PairingAdapter, PairingEvent, SecurityLevel};
use crate::session::{Session, SessionError};

/// Peripheral role errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralError {
    /// NUS init or notify failed
    Nus(NusError),
    /// Advertising payload could not be built
    Payload(AdError),
    /// Advertising failed to start
    Advertise(HostError),
    /// Security request refused
    Security(HostError),
    /// Pairing reply failed
    Pairing(HostError),
    /// Default connection bookkeeping failed
    Session(SessionError),
    /// No connection to notify
    NotConnected,
    /// Link below the required security level
    Insecure,
}

impl From<NusError> for PeripheralError {
    fn from(e: NusError) -> Self {
        Self::Nus(e)
    }
}

impl From<AdError> for PeripheralError {
    fn from(e: AdError) -> Self {
        Self::Payload(e)
    }
}

impl From<SessionError> for PeripheralError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

impl fmt::Display for PeripheralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nus(e) => write!(f, "NUS: {}", e),
            Self::Payload(e) => write!(f, "advertising payload: {:?}", e),
            Self::Advertise(e) => write!(f, "advertising failed to start: {}", e),
            Self::Security(e) => write!(f, "failed to set security: {}", e),
            Self::Pairing(e) => write!(f, "pairing reply failed: {}", e),
            Self::Session(e) => write!(f, "session: {}", e),
            Self::NotConnected => f.write_str("not connected"),
            Self::Insecure => f.write_str("security level not reached"),
        }
    }
}

/// Peripheral role state machine
pub struct PeripheralController<H, D> {
    host: H,
    config: RoleConfig,
    session: Session,
    nus: NusServer<D>,
    pairing: PairingAdapter,
}

impl<H: PeripheralHost, D: DataHandler> PeripheralController<H, D> {
    /// Register NUS and start connectable advertising
    pub fn start(mut host: H, config: RoleConfig, handler: Option<D>) -> Result<Self, PeripheralError> {
        let nus = NusServer::init(&mut host, handler).map_err(|e| {
            log::error!("[peripheral] NUS failed to init ({})", e);
            PeripheralError::Nus(e)
        })?;

        let adv = payload::nus_advertisement()?;
        let scan = payload::nus_scan_response()?;
        host.start_advertising(&adv, &scan).map_err(|e| {
            log::error!("[peripheral] Advertising failed to start ({})", e);
            PeripheralError::Advertise(e)
        })?;
        log::info!("[peripheral] Advertising successfully started");

        Ok(Self {
            host,
            config,
            session: Session::new(),
            nus,
            pairing: PairingAdapter::new(config.auth_mode).with_cancel_echo(),
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn nus(&self) -> &NusServer<D> {
        &self.nus
    }

    pub fn pairing(&self) -> &PairingAdapter {
        &self.pairing
    }

    /// Notify `byte` on TX if the default connection is subscribed and secure
    pub fn send_notification(&mut self, byte: u8) -> Result<(), PeripheralError> {
        let conn = self.session.conn().ok_or(PeripheralError::NotConnected)?;
        if !self.session.is_secure(self.config.required_security) {
            return Err(PeripheralError::Insecure);
        }
        self.nus.notify(&mut self.host, conn, byte)?;
        Ok(())
    }

    fn peer(&self, conn: ConnHandle) -> Peer {
        Peer(self.host.peer_address(conn))
    }

    fn pairing_event(&mut self, conn: ConnHandle, event: PairingEvent) -> Result<(), PeripheralError> {
        let is_default = self.session.is_default(conn);
        match self.pairing.respond(&mut self.host, conn, event, is_default) {
            Ok(Some(reply)) => {
                log::info!("[peripheral] {:?} sent", reply);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                log::error!("[peripheral] Confirm failed ({})", e);
                Err(PeripheralError::Pairing(e))
            }
        }
    }

    fn write_ccc(&mut self, data: &[u8], offset: u16) -> Result<usize, AttError> {
        if offset != 0 {
            return Err(AttError::InvalidOffset);
        }
        let value: [u8; 2] = data.try_into().map_err(|_| AttError::InvalidAttributeLength)?;
        self.nus.on_ccc_changed(u16::from_le_bytes(value));
        Ok(value.len())
    }
}

impl<H: PeripheralHost, D: DataHandler> ConnectionEvents for PeripheralController<H, D> {
    type Error = PeripheralError;

    fn connected(&mut self, conn: ConnHandle, status: u8) -> Result<(), PeripheralError> {
        if status != 0 {
            log::warn!("[peripheral] Connection failed (err {})", status);
            return Ok(());
        }

        self.session.attach(&mut self.host, conn)?;
        log::info!("[peripheral] Connected: {}", self.peer(conn));

        let level = self.config.required_security;
        self.host.request_security(conn, level).map_err(|e| {
            log::error!("[peripheral] Failed to set security ({})", e);
            PeripheralError::Security(e)
        })
    }

    fn disconnected(&mut self, conn: ConnHandle, reason: u8) -> Result<(), PeripheralError> {
        log::info!("[peripheral] Disconnected (reason {})", reason);

        if self.session.release(&mut self.host, conn) {
            // CCC state is per connection
            self.nus.on_ccc_changed(0);
            self.pairing.reset();
        }
        Ok(())
    }

    fn security_changed(&mut self, conn: ConnHandle, level: SecurityLevel) -> Result<(), PeripheralError> {
        log::info!("[peripheral] Security changed: {} level {}", self.peer(conn), level);

        if self.session.update_security(conn, level) {
            self.pairing.on_security_changed(level);
        }
        Ok(())
    }
}

impl<H: PeripheralHost, D: DataHandler> AuthEvents for PeripheralController<H, D> {
    type Error = PeripheralError;

    fn passkey_display(&mut self, conn: ConnHandle, passkey: u32) -> Result<(), PeripheralError> {
        log::info!("[peripheral] Passkey Display for {}: {:06}", self.peer(conn), passkey);
        self.pairing_event(conn, PairingEvent::PasskeyDisplay(passkey))
    }

    fn passkey_confirm(&mut self, conn: ConnHandle, passkey: u32) -> Result<(), PeripheralError> {
        log::info!("[peripheral] Passkey Confirm for {}: {:06}", self.peer(conn), passkey);
        self.pairing_event(conn, PairingEvent::PasskeyConfirm(passkey))
    }

    fn passkey_entry(&mut self, conn: ConnHandle) -> Result<(), PeripheralError> {
        log::info!("[peripheral] Pairing entry for {}", self.peer(conn));
        self.pairing_event(conn, PairingEvent::PasskeyEntry)
    }

    fn pairing_confirm(&mut self, conn: ConnHandle) -> Result<(), PeripheralError> {
        log::info!("[peripheral] Pairing Confirm for {}", self.peer(conn));
        self.pairing_event(conn, PairingEvent::PairingConfirm)
    }

    fn cancel(&mut self, conn: ConnHandle) -> Result<(), PeripheralError> {
        log::warn!("[peripheral] Pairing cancelled: {}", self.peer(conn));
        self.pairing_event(conn, PairingEvent::Cancel)
    }
}

impl<H: PeripheralHost, D: DataHandler> GattServerEvents for PeripheralController<H, D> {
    fn write(&mut self, conn: ConnHandle, handle: u16, data: &[u8], offset: u16) -> Result<usize, AttError> {
        let handles = self.nus.handles();
        if handle == handles.rx_value {
            self.nus.on_write_rx(conn, data, offset)
        } else if handle == handles.ccc {
            self.write_ccc(data, offset)
        } else {
            Err(AttError::InvalidHandle)
        }
    }

    fn read(&mut self, _conn: ConnHandle, handle: u16, buf: &mut [u8], offset: u16) -> Result<usize, AttError> {
        let handles = self.nus.handles();
        if handle == handles.rx_value {
            self.nus.on_read_rx(buf, offset)
        } else if handle == handles.ccc {
            read_attribute(&self.nus.ccc_value().to_le_bytes(), buf, offset)
        } else {
            Err(AttError::InvalidHandle)
        }
    }

    fn ccc_changed(&mut self, handle: u16, value: u16) {
        if handle == self.nus.handles().ccc {
            self.nus.on_ccc_changed(value);
        }
    }
}

impl<H: PeripheralHost, D: DataHandler> NotifySink for PeripheralController<H, D> {
    fn send(&mut self, byte: u8) -> impl Future<Output = bool> {
        let sent = match self.send_notification(byte) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("[peripheral] notification skipped: {}", e);
                false
            }
        };
        core::future::ready(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::ticker::mock::CountedTicks;
    use super::*;
    use crate::host::traits::mock::{HostCall, HostOp, MockHost};
    use crate::nus::RxEvent;
    use core::cell::RefCell;
    use futures::executor::block_on;
    use heapless::Vec;

    const CONN: ConnHandle = ConnHandle(1);
    const TX: u16 = 0x0014;
    const CCC: u16 = 0x0015;
    const RX: u16 = 0x0012;

    type Received = RefCell<Vec<u8, 8>>;

    fn controller(received: &Received) -> PeripheralController<MockHost, impl DataHandler + '_> {
        let handler = move |event: RxEvent<'_>| {
            let _ = received.borrow_mut().extend_from_slice(event.data);
        };
        PeripheralController::start(MockHost::new(), RoleConfig::peripheral(), Some(handler)).unwrap()
    }

    fn notified(peripheral: &PeripheralController<MockHost, impl DataHandler>) -> Vec<u8, 64> {
        peripheral
            .host()
            .calls()
            .iter()
            .filter_map(|c| match c {
                HostCall::Notify(_, TX, data) => data.first().copied(),
                _ => None,
            })
            .collect()
    }

    fn run_ticks(peripheral: &mut PeripheralController<MockHost, impl DataHandler>, ticker: &mut NotificationTicker, n: usize) {
        block_on(run_notifier(&mut CountedTicks::new(n), ticker, peripheral));
    }

    #[test]
    fn test_start_registers_and_advertises() {
        let received = Received::default();
        let peripheral = controller(&received);

        let calls = peripheral.host().calls();
        assert_eq!(calls[0], HostCall::RegisterService(6));
        match &calls[1] {
            HostCall::StartAdvertising { adv_data, scan_data } => {
                assert_eq!(adv_data.as_slice(), payload::nus_advertisement().unwrap().as_slice());
                assert_eq!(&scan_data[2..], b"NUS Peripheral");
            }
            other => panic!("Expected StartAdvertising, got {:?}", other),
        }
    }

    #[test]
    fn test_start_requires_data_handler() {
        let result = PeripheralController::<MockHost, fn(RxEvent<'_>)>::start(
            MockHost::new(),
            RoleConfig::peripheral(),
            None,
        );
        assert!(matches!(
            result,
            Err(PeripheralError::Nus(NusError::MissingDataHandler))
        ));
    }

    #[test]
    fn test_advertising_failure_is_reported() {
        let mut host = MockHost::new();
        host.fail_next(HostOp::StartAdvertising, HostError::Rejected(-120));

        let result = PeripheralController::start(host, RoleConfig::peripheral(), Some(|_: RxEvent<'_>| {}));
        assert!(matches!(
            result,
            Err(PeripheralError::Advertise(HostError::Rejected(-120)))
        ));
    }

    #[test]
    fn test_connect_requests_security() {
        let received = Received::default();
        let mut peripheral = controller(&received);
        peripheral.host_mut().clear_calls();

        peripheral.connected(CONN, 0).unwrap();

        assert_eq!(
            peripheral.host().calls(),
            &[
                HostCall::ConnRef(CONN),
                HostCall::RequestSecurity(CONN, SecurityLevel::Fips),
            ]
        );
        assert!(peripheral.session().is_default(CONN));
    }

    #[test]
    fn test_failed_connection_takes_no_reference() {
        let received = Received::default();
        let mut peripheral = controller(&received);
        peripheral.host_mut().clear_calls();

        peripheral.connected(CONN, 0x3E).unwrap();

        assert!(peripheral.host().calls().is_empty());
        assert_eq!(peripheral.session().conn(), None);
    }

    #[test]
    fn test_security_request_failure_is_reported() {
        let received = Received::default();
        let mut peripheral = controller(&received);
        peripheral
            .host_mut()
            .fail_next(HostOp::RequestSecurity, HostError::Rejected(-22));

        assert_eq!(
            peripheral.connected(CONN, 0),
            Err(PeripheralError::Security(HostError::Rejected(-22)))
        );
        // The link is still tracked
        assert!(peripheral.session().is_default(CONN));
    }

    #[test]
    fn test_notifier_waits_for_subscription_and_security() {
        let received = Received::default();
        let mut peripheral = controller(&received);
        let mut ticker = NotificationTicker::new();

        // Not connected
        run_ticks(&mut peripheral, &mut ticker, 2);
        peripheral.connected(CONN, 0).unwrap();

        // Connected, not subscribed
        peripheral.security_changed(CONN, SecurityLevel::Fips).unwrap();
        run_ticks(&mut peripheral, &mut ticker, 2);
        assert!(notified(&peripheral).is_empty());

        // Subscribed and secure
        peripheral.ccc_changed(CCC, 0x0001);
        run_ticks(&mut peripheral, &mut ticker, 3);
        assert_eq!(notified(&peripheral).as_slice(), b"ABC");

        // Security drops below FIPS: no sends, letter does not advance
        peripheral.security_changed(CONN, SecurityLevel::High).unwrap();
        run_ticks(&mut peripheral, &mut ticker, 2);
        peripheral.security_changed(CONN, SecurityLevel::Fips).unwrap();
        run_ticks(&mut peripheral, &mut ticker, 1);
        assert_eq!(notified(&peripheral).as_slice(), b"ABCD");
    }

    #[test]
    fn test_failed_notify_does_not_advance() {
        let received = Received::default();
        let mut peripheral = controller(&received);
        let mut ticker = NotificationTicker::new();
        peripheral.connected(CONN, 0).unwrap();
        peripheral.security_changed(CONN, SecurityLevel::Fips).unwrap();
        peripheral.ccc_changed(CCC, 0x0001);

        peripheral
            .host_mut()
            .fail_next(HostOp::Notify, HostError::NoResources);
        run_ticks(&mut peripheral, &mut ticker, 2);

        // First attempt failed, retried with the same letter
        assert_eq!(notified(&peripheral).as_slice(), b"AA");
        assert_eq!(ticker.current(), b'B');
    }

    #[test]
    fn test_disconnect_releases_and_stops_notifications() {
        let received = Received::default();
        let mut peripheral = controller(&received);
        let mut ticker = NotificationTicker::new();
        peripheral.connected(CONN, 0).unwrap();
        peripheral.security_changed(CONN, SecurityLevel::Fips).unwrap();
        peripheral.ccc_changed(CCC, 0x0001);

        peripheral.disconnected(CONN, 0x13).unwrap();
        assert_eq!(peripheral.host().last_call(), Some(&HostCall::ConnUnref(CONN)));
        assert!(!peripheral.nus().is_notify_enabled());

        assert_eq!(peripheral.send_notification(b'A'), Err(PeripheralError::NotConnected));
        run_ticks(&mut peripheral, &mut ticker, 2);
        assert!(notified(&peripheral).is_empty());
    }

    #[test]
    fn test_rx_write_and_read() {
        let received = Received::default();
        let mut peripheral = controller(&received);
        peripheral.connected(CONN, 0).unwrap();

        assert_eq!(peripheral.write(CONN, RX, b"k", 0), Ok(1));
        assert_eq!(peripheral.write(CONN, RX, b"ab", 0), Err(AttError::InvalidOffset));
        assert_eq!(received.borrow().as_slice(), b"k");

        let mut buf = [0u8; 8];
        assert_eq!(peripheral.read(CONN, RX, &mut buf, 0), Ok(1));
        assert_eq!(buf[0], b'k');

        assert_eq!(peripheral.write(CONN, TX, b"x", 0), Err(AttError::InvalidHandle));
        assert_eq!(peripheral.read(CONN, 0x0100, &mut buf, 0), Err(AttError::InvalidHandle));
    }

    #[test]
    fn test_attribute_offsets_are_checked() {
        let received = Received::default();
        let mut peripheral = controller(&received);
        peripheral.connected(CONN, 0).unwrap();

        assert_eq!(peripheral.write(CONN, RX, b"z", 1), Err(AttError::InvalidOffset));
        assert!(received.borrow().is_empty());

        assert_eq!(peripheral.write(CONN, RX, b"z", 0), Ok(1));
        let mut buf = [0u8; 2];
        assert_eq!(peripheral.read(CONN, RX, &mut buf, 1), Ok(0));
        assert_eq!(peripheral.read(CONN, RX, &mut buf, 2), Err(AttError::InvalidOffset));
        assert_eq!(peripheral.read(CONN, CCC, &mut buf, 1), Ok(1));
    }

    #[test]
    fn test_ccc_write_through_attribute_handler() {
        let received = Received::default();
        let mut peripheral = controller(&received);

        assert_eq!(peripheral.write(CONN, CCC, &[0x01], 0), Err(AttError::InvalidAttributeLength));
        assert_eq!(peripheral.write(CONN, CCC, &[0x01, 0x00], 1), Err(AttError::InvalidOffset));

        assert_eq!(peripheral.write(CONN, CCC, &[0x01, 0x00], 0), Ok(2));
        assert!(peripheral.nus().is_notify_enabled());

        let mut buf = [0u8; 2];
        assert_eq!(peripheral.read(CONN, CCC, &mut buf, 0), Ok(2));
        assert_eq!(buf, [0x01, 0x00]);

        // Indications are not notifications
        peripheral.ccc_changed(CCC, 0x0002);
        assert!(!peripheral.nus().is_notify_enabled());
    }

    #[test]
    fn test_pairing_replies_and_cancel_echo() {
        let received = Received::default();
        let mut peripheral = controller(&received);
        peripheral.connected(CONN, 0).unwrap();
        peripheral.host_mut().clear_calls();

        peripheral.passkey_display(CONN, 123456).unwrap();
        assert!(peripheral.host().calls().is_empty());

        peripheral.passkey_confirm(ConnHandle(2), 123456).unwrap();
        assert!(peripheral.host().calls().is_empty());

        peripheral.passkey_confirm(CONN, 123456).unwrap();
        peripheral.cancel(CONN).unwrap();
        assert_eq!(
            peripheral.host().calls(),
            &[HostCall::PasskeyConfirm(CONN), HostCall::AuthCancel(CONN)]
        );
    }
}
