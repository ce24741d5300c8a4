//! Central role on TrouBLE
//!
//! Scan reports reach the controller through a channel filled by the
//! runner's event handler. Queued discovery requests are answered with the
//! GATT client's by-UUID procedures, and the subscription listener feeds
//! notifications back until the link drops.

use core::cell::RefCell;

use embassy_futures::join::join;
use embassy_futures::select::{select3, Either3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use rand_core::{CryptoRng, RngCore};
use trouble_host::prelude::*;

use super::{io_capabilities, link_level, peer_address, stack_address};
use crate::central::{CentralController, NotificationHandler};
use crate::config::{self, RoleConfig};
use crate::gatt::{DiscoverKind, DiscoverRequest, DiscoveredAttribute, Uuid as GattUuid};
use crate::host::{
    AdvReportKind, AuthEvents, CommandQueue, ConnHandle as Link, ConnectionEvents, DiscoveryEvents, HostCommand,
    IterControl, NotificationEvents, ScanEvents, ScanMode,
};

/// Status reported when the connection attempt fails
const CONNECTION_FAILED: u8 = 0x3E;
/// Reason reported when the GATT client stops without a disconnect event
const LINK_LOST: u8 = 0x08;
/// Reports buffered between the runner and the role task
const REPORT_QUEUE_DEPTH: usize = 8;

type Shared<N> = RefCell<CentralController<CommandQueue, N>>;

/// One advertising report, copied out of the HCI event
struct Report {
    addr: crate::host::Address,
    rssi: i8,
    kind: AdvReportKind,
    data: heapless::Vec<u8, { config::advertising::MAX_AD_LEN }>,
}

static REPORTS: Channel<CriticalSectionRawMutex, Report, REPORT_QUEUE_DEPTH> = Channel::new();

/// Forwards advertising reports to the role task
struct ReportForwarder;

impl EventHandler for ReportForwarder {
    fn on_adv_reports(&self, mut it: LeAdvReportsIter<'_>) {
        while let Some(Ok(report)) = it.next() {
            let Some(kind) = AdvReportKind::from_u8(report.event_kind as u8) else {
                continue;
            };
            let Ok(data) = heapless::Vec::from_slice(report.data) else {
                continue;
            };
            let report = Report {
                addr: peer_address(report.addr_kind, report.addr),
                rssi: report.rssi,
                kind,
                data,
            };
            // Drop reports while the role task is busy
            let _ = REPORTS.try_send(report);
        }
    }
}

/// Run the NUS central forever
pub async fn run<C, RNG, N>(controller: C, random_generator: &mut RNG, role: RoleConfig, handler: N)
where
    C: Controller,
    RNG: RngCore + CryptoRng,
    N: NotificationHandler,
{
    let address = Address::random(config::ble::CENTRAL_ADDRESS);
    log::info!("[central] address {:?}", address);

    let mut resources: HostResources<DefaultPacketPool, { config::ble::CONNECTIONS_MAX }, { config::ble::L2CAP_CHANNELS_MAX }> =
        HostResources::new();
    let stack = trouble_host::new(controller, &mut resources)
        .set_random_address(address)
        .set_random_generator_seed(random_generator);
    stack.set_io_capabilities(io_capabilities(role.auth_mode.io_capabilities()));

    let Host {
        mut central,
        mut runner,
        ..
    } = stack.build();

    let shared: Shared<N> = RefCell::new(CentralController::new(CommandQueue::new(0), role, handler));
    if let Err(e) = shared.borrow_mut().start() {
        log::error!("[central] {}", e);
        return;
    }

    let runner_task = async {
        loop {
            if let Err(e) = runner.run_with_handler(&ReportForwarder).await {
                log::error!("[ble] runner error: {:?}", e);
            }
        }
    };

    let _ = join(runner_task, async {
        loop {
            let mut scanner = Scanner::new(central);
            let target = scan_for_target(&mut scanner, &shared).await;
            central = scanner.into_inner();
            let Some((link, peer)) = target else {
                continue;
            };

            let peer = stack_address(&peer);
            let connect = ConnectConfig {
                connect_params: Default::default(),
                scan_config: ScanConfig {
                    filter_accept_list: &[(peer.kind, &peer.addr)],
                    ..Default::default()
                },
            };
            let conn = match central.connect(&connect).await {
                Ok(conn) => conn,
                Err(e) => {
                    log::warn!("[central] connect failed: {:?}", e);
                    let mut controller = shared.borrow_mut();
                    if let Err(e) = controller.connected(link, CONNECTION_FAILED) {
                        log::error!("[central] {}", e);
                    }
                    controller.host_mut().link_down(link);
                    continue;
                }
            };

            if let Err(e) = shared.borrow_mut().connected(link, 0) {
                log::error!("[central] {}", e);
            }
            let reason = serve_connection(&stack, &conn, &shared, link).await;

            let mut controller = shared.borrow_mut();
            if let Err(e) = controller.disconnected(link, reason) {
                log::error!("[central] {}", e);
            }
            controller.host_mut().link_down(link);
        }
    })
    .await;
}

/// Scan until the controller queues a connection
async fn scan_for_target<C: Controller, N: NotificationHandler>(
    scanner: &mut Scanner<'_, C, DefaultPacketPool>,
    shared: &Shared<N>,
) -> Option<(Link, crate::host::Address)> {
    let mut mode = ScanMode::Active;
    while let Some(command) = shared.borrow_mut().host_mut().pop() {
        if let HostCommand::StartScan(m) = command {
            mode = m;
        }
    }

    let scan = ScanConfig {
        active: mode == ScanMode::Active,
        ..Default::default()
    };
    let _session = match scanner.scan(&scan).await {
        Ok(session) => session,
        Err(e) => {
            log::error!("[scan] Scanning failed to start ({:?})", e);
            return None;
        }
    };
    log::info!("[scan] Scanning successfully started ({:?})", mode);
    REPORTS.clear();

    loop {
        let report = REPORTS.receive().await;
        let mut controller = shared.borrow_mut();
        if let Err(e) = controller.device_found(&report.addr, report.rssi, report.kind, &report.data) {
            log::warn!("[scan] {}", e);
        }
        while let Some(command) = controller.host_mut().pop() {
            match command {
                HostCommand::Connect(link, peer) => return Some((link, peer)),
                other => log::debug!("[scan] ignoring {:?}", other),
            }
        }
    }
}

/// Pair, discover and listen until the link drops; returns the reason
async fn serve_connection<C: Controller, N: NotificationHandler>(
    stack: &Stack<'_, C, DefaultPacketPool>,
    conn: &Connection<'_, DefaultPacketPool>,
    shared: &Shared<N>,
    link: Link,
) -> u8 {
    // Pairing happens before the GATT client exists
    loop {
        let handled = match conn.next().await {
            ConnectionEvent::Disconnected { reason } => return reason.into_inner(),
            ConnectionEvent::PassKeyDisplay(key) => shared.borrow_mut().passkey_display(link, key.value()),
            ConnectionEvent::PassKeyConfirm(key) => shared.borrow_mut().passkey_confirm(link, key.value()),
            ConnectionEvent::PassKeyInput => shared.borrow_mut().passkey_entry(link),
            ConnectionEvent::PairingComplete { security_level, .. } => {
                let done = shared.borrow_mut().security_changed(link, link_level(security_level));
                if let Err(e) = done {
                    log::error!("[central] {}", e);
                }
                break;
            }
            ConnectionEvent::PairingFailed(e) => {
                log::warn!("[central] Pairing failed: {:?}", e);
                Ok(())
            }
            ConnectionEvent::RequestConnectionParams(req) => {
                if let Err(e) = req.accept(None, stack).await {
                    log::warn!("[central] connection params: {:?}", e);
                }
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(e) = handled {
            log::error!("[central] {}", e);
        }
        if let Err(e) = answer_pairing(shared, conn) {
            log::error!("[central] pairing reply failed: {:?}", e);
        }
    }

    let client = match GattClient::<C, DefaultPacketPool, { config::ble::CLIENT_SERVICES_MAX }>::new(stack, conn).await {
        Ok(client) => client,
        Err(e) => {
            log::error!("[discovery] GATT client failed: {:?}", e);
            conn.disconnect();
            return LINK_LOST;
        }
    };

    let watch = async {
        loop {
            if let ConnectionEvent::Disconnected { reason } = conn.next().await {
                return reason.into_inner();
            }
        }
    };

    match select3(client.task(), run_discovery(&client, shared, link), watch).await {
        Either3::Third(reason) => reason,
        _ => LINK_LOST,
    }
}

/// Execute queued pairing replies
fn answer_pairing<N: NotificationHandler>(shared: &Shared<N>, conn: &Connection<'_, DefaultPacketPool>) -> Result<(), Error> {
    loop {
        let Some(command) = shared.borrow_mut().host_mut().pop() else {
            return Ok(());
        };
        match command {
            HostCommand::PairingConfirm(_) | HostCommand::PasskeyConfirm(_) => conn.pass_key_confirm()?,
            HostCommand::PasskeyEntry(_, passkey) => conn.pass_key_input(passkey)?,
            HostCommand::AuthCancel(_) => conn.pass_key_cancel()?,
            other => log::debug!("[central] ignoring {:?}", other),
        }
    }
}

/// Serve the controller's discovery requests, then relay notifications
async fn run_discovery<C: Controller, N: NotificationHandler>(
    client: &GattClient<'_, C, DefaultPacketPool, { config::ble::CLIENT_SERVICES_MAX }>,
    shared: &Shared<N>,
    link: Link,
) {
    let mut service = None;
    let mut tx: Option<Characteristic<u8>> = None;

    loop {
        let command = shared.borrow_mut().host_mut().pop();
        match command {
            Some(HostCommand::Discover(_, request)) => {
                let found = match request.kind {
                    DiscoverKind::Primary => match client.services_by_uuid(&stack_uuid(&request.uuid)).await {
                        Ok(services) => {
                            service = services.first().cloned();
                            service.as_ref().map(|_| request.start_handle)
                        }
                        Err(e) => {
                            log::warn!("[discovery] service lookup failed: {:?}", e);
                            None
                        }
                    },
                    DiscoverKind::Characteristic => match &service {
                        Some(s) => match client.characteristic_by_uuid::<u8>(s, &stack_uuid(&request.uuid)).await {
                            Ok(c) => {
                                // Report the declaration; the value handle follows it
                                let handle = c.handle.checked_sub(1);
                                tx = Some(c);
                                handle
                            }
                            Err(e) => {
                                log::warn!("[discovery] characteristic lookup failed: {:?}", e);
                                None
                            }
                        },
                        None => None,
                    },
                    DiscoverKind::Descriptor => tx.as_ref().and_then(|c| c.cccd_handle),
                };
                report(shared, link, &request, found);
            }
            Some(HostCommand::Subscribe(..)) => {
                let Some(c) = tx.as_ref() else {
                    continue;
                };
                let mut listener = match client.subscribe(c, false).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        log::error!("[SUBSCRIBED] failed: {:?}", e);
                        break;
                    }
                };
                loop {
                    let data = listener.next().await;
                    if shared.borrow_mut().notification(link, Some(data.as_ref())) == IterControl::Stop {
                        break;
                    }
                }
            }
            Some(other) => log::debug!("[discovery] ignoring {:?}", other),
            None => break,
        }
    }
    core::future::pending::<()>().await;
}

fn report<N: NotificationHandler>(shared: &Shared<N>, link: Link, request: &DiscoverRequest, handle: Option<u16>) {
    let attr = handle.map(|handle| DiscoveredAttribute { handle });
    if attr.is_none() {
        log::debug!("[discovery] nothing found for {:?}", request.kind);
    }
    if let Err(e) = shared.borrow_mut().discovered(link, attr) {
        log::error!("[discovery] {}", e);
    }
}

fn stack_uuid(uuid: &GattUuid) -> Uuid {
    match uuid {
        GattUuid::Uuid16(value) => Uuid::new_short(*value),
        GattUuid::Uuid128(bytes) => Uuid::new_long(*bytes),
    }
}
