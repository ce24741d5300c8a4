//! Central role
//!
//! Scans for an advertiser carrying the NUS service UUID, connects, waits
//! for the link to reach the required security level, walks the discovery
//! chain and subscribes to TX notifications. Received notifications are
//! handed to a [`NotificationHandler`].

use core::fmt;

use crate::advertising::TargetScanner;
use crate::config::{self, RoleConfig};
use crate::gatt::subscription::{accept_already_subscribed, Delivery};
use crate::gatt::{ChainAction, DiscoveredAttribute, DiscoveryChain, SubscriptionState};
use crate::host::{
    Address, AdvReportKind, AuthEvents, CentralHost, ConnHandle, ConnectionEvents, DiscoveryEvents,
    HostError, IterControl, NotificationEvents, Peer, ScanEvents, ScanMode,
};
use crate::security::{PairingAdapter, PairingEvent, SecurityLevel};
use crate::session::{Session, SessionError};

/// Receives TX notifications in arrival order
pub trait NotificationHandler {
    fn on_notification(&mut self, conn: ConnHandle, data: &[u8]);
}

impl<F: FnMut(ConnHandle, &[u8])> NotificationHandler for F {
    fn on_notification(&mut self, conn: ConnHandle, data: &[u8]) {
        self(conn, data)
    }
}

/// Logs each notification the way the sample console output does
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifications;

impl NotificationHandler for LogNotifications {
    fn on_notification(&mut self, _conn: ConnHandle, data: &[u8]) {
        match data.first() {
            Some(&byte) => log::info!("[NOTIFICATION] data {} length {}", byte as char, data.len()),
            None => log::info!("[NOTIFICATION] empty"),
        }
    }
}

/// Central role errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CentralError {
    /// Starting or stopping the scan failed
    Scan(HostError),
    /// Connection could not be created
    Connect(HostError),
    /// Host refused a discovery request; the chain was aborted
    Discover(HostError),
    /// CCC write failed
    Subscribe(HostError),
    /// Pairing reply failed
    Pairing(HostError),
    /// Default connection bookkeeping failed
    Session(SessionError),
}

impl From<SessionError> for CentralError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

impl fmt::Display for CentralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scan(e) => write!(f, "scanning failed: {}", e),
            Self::Connect(e) => write!(f, "connect failed: {}", e),
            Self::Discover(e) => write!(f, "discover failed: {}", e),
            Self::Subscribe(e) => write!(f, "subscribe failed: {}", e),
            Self::Pairing(e) => write!(f, "pairing reply failed: {}", e),
            Self::Session(e) => write!(f, "session: {}", e),
        }
    }
}

/// Central role state machine
pub struct CentralController<H, N> {
    host: H,
    config: RoleConfig,
    session: Session,
    scanner: TargetScanner,
    chain: DiscoveryChain,
    subscription: SubscriptionState,
    pairing: PairingAdapter,
    handler: N,
}

impl<H: CentralHost, N: NotificationHandler> CentralController<H, N> {
    pub fn new(host: H, config: RoleConfig, handler: N) -> Self {
        Self {
            host,
            config,
            session: Session::new(),
            scanner: TargetScanner::new(config::nus::SERVICE_UUID),
            chain: DiscoveryChain::default(),
            subscription: SubscriptionState::new(),
            pairing: PairingAdapter::new(config.auth_mode),
            handler,
        }
    }

    /// Start the initial active scan
    pub fn start(&mut self) -> Result<(), CentralError> {
        self.host
            .start_scan(ScanMode::Active)
            .map_err(CentralError::Scan)?;
        log::info!("[central] Scanning successfully started");
        Ok(())
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

    pub fn chain(&self) -> &DiscoveryChain {
        &self.chain
    }

    pub fn subscription(&self) -> &SubscriptionState {
        &self.subscription
    }

    pub fn pairing(&self) -> &PairingAdapter {
        &self.pairing
    }

    fn peer(&self, conn: ConnHandle) -> Peer {
        Peer(self.host.peer_address(conn))
    }

    /// Look for the next peripheral; passive, scan responses are not needed
    fn restart_scan(&mut self) -> Result<(), CentralError> {
        self.scanner.rearm();
        self.host.start_scan(ScanMode::Passive).map_err(|e| {
            log::error!("[central] Scanning failed to start ({})", e);
            CentralError::Scan(e)
        })
    }

    fn start_discovery(&mut self, conn: ConnHandle) -> Result<(), CentralError> {
        if self.chain.is_running() || self.subscription.is_active() {
            return Ok(());
        }
        let request = self.chain.start();
        self.host.discover(conn, &request).map_err(|e| {
            log::error!("[central] Discover failed ({})", e);
            self.chain.abort();
            CentralError::Discover(e)
        })
    }

    fn pairing_event(&mut self, conn: ConnHandle, event: PairingEvent) -> Result<(), CentralError> {
        let is_default = self.session.is_default(conn);
        match self.pairing.respond(&mut self.host, conn, event, is_default) {
            Ok(Some(reply)) => {
                log::info!("[central] {:?} sent", reply);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                log::error!("[central] Confirm failed ({})", e);
                Err(CentralError::Pairing(e))
            }
        }
    }
}

impl<H: CentralHost, N: NotificationHandler> ScanEvents for CentralController<H, N> {
    type Error = CentralError;

    fn device_found(
        &mut self,
        addr: &Address,
        rssi: i8,
        kind: AdvReportKind,
        data: &[u8],
    ) -> Result<(), CentralError> {
        log::debug!(
            "[DEVICE]: {}, AD evt type {:?}, AD data len {}, RSSI {}",
            addr,
            kind,
            data.len(),
            rssi
        );

        let conn = match self.scanner.on_report(&mut self.host, addr, kind, data) {
            Ok(Some(conn)) => conn,
            Ok(None) => return Ok(()),
            Err(e) => {
                log::error!("[central] Create connection to {} failed ({})", addr, e);
                self.restart_scan()?;
                return Err(CentralError::Connect(e));
            }
        };

        if let Err(e) = self.session.adopt(conn) {
            self.host.conn_unref(conn);
            return Err(e.into());
        }
        Ok(())
    }
}

impl<H: CentralHost, N: NotificationHandler> ConnectionEvents for CentralController<H, N> {
    type Error = CentralError;

    fn connected(&mut self, conn: ConnHandle, status: u8) -> Result<(), CentralError> {
        let peer = self.peer(conn);
        if status != 0 {
            log::warn!("[central] Failed to connect to {} ({})", peer, status);
            if !self.session.release(&mut self.host, conn) {
                return Ok(());
            }
            return self.restart_scan();
        }

        log::info!("[central] Connected: {}", peer);
        Ok(())
    }

    fn disconnected(&mut self, conn: ConnHandle, reason: u8) -> Result<(), CentralError> {
        log::info!("[central] Disconnected: {} (reason {})", self.peer(conn), reason);

        if !self.session.release(&mut self.host, conn) {
            return Ok(());
        }
        self.chain.abort();
        self.subscription.reset();
        self.pairing.reset();
        self.restart_scan()
    }

    fn security_changed(&mut self, conn: ConnHandle, level: SecurityLevel) -> Result<(), CentralError> {
        log::info!("[central] Security changed: {} level {}", self.peer(conn), level);

        if !self.session.update_security(conn, level) {
            return Ok(());
        }
        self.pairing.on_security_changed(level);

        if self.session.is_secure(self.config.required_security) {
            self.start_discovery(conn)?;
        }
        Ok(())
    }
}

impl<H: CentralHost, N: NotificationHandler> AuthEvents for CentralController<H, N> {
    type Error = CentralError;

    fn passkey_display(&mut self, conn: ConnHandle, passkey: u32) -> Result<(), CentralError> {
        log::info!("[central] Passkey Display for {}: {:06}", self.peer(conn), passkey);
        self.pairing_event(conn, PairingEvent::PasskeyDisplay(passkey))
    }

    fn passkey_confirm(&mut self, conn: ConnHandle, passkey: u32) -> Result<(), CentralError> {
        log::info!("[central] Passkey Confirm for {}: {:06}", self.peer(conn), passkey);
        self.pairing_event(conn, PairingEvent::PasskeyConfirm(passkey))
    }

    fn passkey_entry(&mut self, conn: ConnHandle) -> Result<(), CentralError> {
        log::info!("[central] Pairing entry for {}", self.peer(conn));
        self.pairing_event(conn, PairingEvent::PasskeyEntry)
    }

    fn pairing_confirm(&mut self, conn: ConnHandle) -> Result<(), CentralError> {
        log::info!("[central] Pairing Confirm for {}", self.peer(conn));
        self.pairing_event(conn, PairingEvent::PairingConfirm)
    }

    fn cancel(&mut self, conn: ConnHandle) -> Result<(), CentralError> {
        log::warn!("[central] Pairing cancelled: {}", self.peer(conn));
        self.pairing_event(conn, PairingEvent::Cancel)
    }
}

impl<H: CentralHost, N: NotificationHandler> DiscoveryEvents for CentralController<H, N> {
    type Error = CentralError;

    fn discovered(
        &mut self,
        conn: ConnHandle,
        attr: Option<DiscoveredAttribute>,
    ) -> Result<IterControl, CentralError> {
        if !self.session.is_default(conn) {
            return Ok(IterControl::Stop);
        }

        match self.chain.on_attribute(attr) {
            ChainAction::Discover(request) => {
                if let Err(e) = self.host.discover(conn, &request) {
                    log::error!("[central] Discover failed ({})", e);
                    self.chain.abort();
                    return Err(CentralError::Discover(e));
                }
            }
            ChainAction::Subscribe(subscription) => {
                accept_already_subscribed(self.host.subscribe(conn, &subscription)).map_err(|e| {
                    log::error!("[central] Subscribe failed ({})", e);
                    CentralError::Subscribe(e)
                })?;
                self.subscription.activate(subscription);
                log::info!("[central] [SUBSCRIBED]");
            }
            ChainAction::Exhausted => log::info!("[central] Discover complete"),
        }
        Ok(IterControl::Stop)
    }
}

impl<H: CentralHost, N: NotificationHandler> NotificationEvents for CentralController<H, N> {
    fn notification(&mut self, conn: ConnHandle, data: Option<&[u8]>) -> IterControl {
        if !self.session.is_default(conn) {
            return IterControl::Continue;
        }
        match self.subscription.deliver(data) {
            Delivery::Data(payload) => {
                self.handler.on_notification(conn, payload);
                IterControl::Continue
            }
            Delivery::Unsubscribed => {
                log::info!("[central] [UNSUBSCRIBED]");
                IterControl::Stop
            }
            Delivery::Inactive => IterControl::Stop,
        }
    }
}
