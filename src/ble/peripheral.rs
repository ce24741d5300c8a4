//! Peripheral role on TrouBLE
//!
//! Advertises NUS, accepts one central at a time and runs the GATT event
//! loop next to the notifier. The controller is shared between the two
//! through a `RefCell` that is never held across an await.

use core::cell::RefCell;

use embassy_futures::join::join;
use embassy_futures::select::select;
use rand_core::{CryptoRng, RngCore};
use trouble_host::prelude::*;

use super::service::Server;
use super::{att_error, ble_task, io_capabilities, link_level, peer_address, IntervalTicks};
use crate::config::{self, RoleConfig};
use crate::host::{AuthEvents, CommandQueue, ConnHandle as Link, ConnectionEvents, GattServerEvents, HostCommand};
use crate::nus::DataHandler;
use crate::peripheral::{run_notifier, NotificationTicker, NotifySink, PeripheralController};

type Shared<D> = RefCell<PeripheralController<CommandQueue, D>>;
type AdPayload = heapless::Vec<u8, { config::advertising::MAX_AD_LEN }>;

/// Write requests and commands start at offset 0; prepared writes never
/// reach a `WriteEvent`, the attribute server queues them itself
const WRITE_REQUEST_OFFSET: u16 = 0;

/// Run the NUS peripheral forever
pub async fn run<C, RNG, D>(controller: C, random_generator: &mut RNG, role: RoleConfig, handler: D)
where
    C: Controller,
    RNG: RngCore + CryptoRng,
    D: DataHandler,
{
    let address = Address::random(config::ble::PERIPHERAL_ADDRESS);
    log::info!("[peripheral] address {:?}", address);

    let mut resources: HostResources<DefaultPacketPool, { config::ble::CONNECTIONS_MAX }, { config::ble::L2CAP_CHANNELS_MAX }> =
        HostResources::new();
    let stack = trouble_host::new(controller, &mut resources)
        .set_random_address(address)
        .set_random_generator_seed(random_generator);
    stack.set_io_capabilities(io_capabilities(role.auth_mode.io_capabilities()));

    let Host {
        mut peripheral,
        runner,
        ..
    } = stack.build();

    let gap = GapConfig::Peripheral(PeripheralConfig {
        name: config::advertising::DEVICE_NAME,
        appearance: &appearance::UNKNOWN,
    });
    let server = match Server::new_with_config(gap) {
        Ok(s) => s,
        Err(e) => {
            log::error!("[peripheral] GATT server init failed: {:?}", e);
            return;
        }
    };

    let queue = CommandQueue::new(server.nus_base_handle());
    let shared: Shared<D> = match PeripheralController::start(queue, role, Some(handler)) {
        Ok(c) => RefCell::new(c),
        Err(e) => {
            log::error!("[peripheral] start failed: {}", e);
            return;
        }
    };

    let Some((adv_data, scan_data)) = advertising_payload(&shared) else {
        log::error!("[peripheral] no advertising payload");
        return;
    };

    let _ = join(ble_task(runner), async {
        let mut ticker = NotificationTicker::new();
        loop {
            let advertiser = match peripheral
                .advertise(
                    &Default::default(),
                    Advertisement::ConnectableScannableUndirected {
                        adv_data: &adv_data,
                        scan_data: &scan_data,
                    },
                )
                .await
            {
                Ok(a) => a,
                Err(e) => {
                    log::error!("[peripheral] Advertising failed to start ({:?})", e);
                    continue;
                }
            };
            log::info!("[peripheral] Advertising successfully started");

            let acceptor = match advertiser.accept().await {
                Ok(a) => a,
                Err(e) => {
                    log::warn!("[peripheral] accept failed ({:?})", e);
                    continue;
                }
            };
            let conn = match acceptor.with_attribute_server(&server) {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("[peripheral] attribute server attach failed ({:?})", e);
                    continue;
                }
            };

            let peer = peer_address(AddrKind::RANDOM, conn.raw().peer_address());
            let link = shared.borrow_mut().host_mut().link_up(peer);
            let started = shared.borrow_mut().connected(link, 0);
            if let Err(e) = started {
                log::error!("[peripheral] connection setup failed: {}", e);
            }
            if let Err(e) = flush(&shared, &server, &conn).await {
                log::error!("[peripheral] host command failed: {:?}", e);
            }

            let mut ticks = IntervalTicks::every(config::notify::INTERVAL_MS);
            let mut sink = GattSink {
                shared: &shared,
                server: &server,
                conn: &conn,
            };
            select(
                gatt_events(&shared, &server, &conn, link),
                run_notifier(&mut ticks, &mut ticker, &mut sink),
            )
            .await;

            let mut controller = shared.borrow_mut();
            let host = controller.host_mut();
            host.link_down(link);
            while host.pop().is_some() {}
        }
    })
    .await;
}

/// Take the payloads queued by the controller at start
fn advertising_payload<D: DataHandler>(shared: &Shared<D>) -> Option<(AdPayload, AdPayload)> {
    let mut controller = shared.borrow_mut();
    let mut payload = None;
    while let Some(command) = controller.host_mut().pop() {
        if let HostCommand::StartAdvertising { adv_data, scan_data } = command {
            payload = Some((adv_data, scan_data));
        }
    }
    payload
}

/// Execute queued commands against the live connection
async fn flush<D: DataHandler>(
    shared: &Shared<D>,
    server: &Server<'_>,
    conn: &GattConnection<'_, '_, DefaultPacketPool>,
) -> Result<(), Error> {
    loop {
        let Some(command) = shared.borrow_mut().host_mut().pop() else {
            return Ok(());
        };
        match command {
            HostCommand::RequestSecurity(..) => conn.raw().request_security()?,
            HostCommand::PairingConfirm(_) | HostCommand::PasskeyConfirm(_) => conn.raw().pass_key_confirm()?,
            HostCommand::PasskeyEntry(_, passkey) => conn.raw().pass_key_input(passkey)?,
            HostCommand::AuthCancel(_) => conn.raw().pass_key_cancel()?,
            HostCommand::Notify(_, _, byte) => server.nus.tx.notify(conn, &byte).await?,
            HostCommand::Disconnect(_) => conn.raw().disconnect(),
            other => log::debug!("[peripheral] ignoring {:?}", other),
        }
    }
}

/// GATT and pairing events until the central goes away
async fn gatt_events<D: DataHandler>(
    shared: &Shared<D>,
    server: &Server<'_>,
    conn: &GattConnection<'_, '_, DefaultPacketPool>,
    link: Link,
) {
    let reason = loop {
        let handled = match conn.next().await {
            GattConnectionEvent::Disconnected { reason } => break reason.into_inner(),
            GattConnectionEvent::PassKeyDisplay(key) => shared.borrow_mut().passkey_display(link, key.value()),
            GattConnectionEvent::PassKeyConfirm(key) => shared.borrow_mut().passkey_confirm(link, key.value()),
            GattConnectionEvent::PassKeyInput => shared.borrow_mut().passkey_entry(link),
            GattConnectionEvent::PairingComplete { security_level, .. } => {
                shared.borrow_mut().security_changed(link, link_level(security_level))
            }
            GattConnectionEvent::PairingFailed(e) => {
                log::warn!("[peripheral] Pairing failed: {:?}", e);
                Ok(())
            }
            GattConnectionEvent::Gatt { event } => {
                let result = match &event {
                    GattEvent::Write(e) => attribute_write(shared, link, e.handle(), e.data(), WRITE_REQUEST_OFFSET),
                    // Reads are served from the attribute server's own copy
                    _ => Ok(()),
                };
                let reply = match result {
                    Ok(()) => event.accept(),
                    Err(code) => event.reject(att_error(code)),
                };
                match reply {
                    Ok(reply) => reply.send().await,
                    Err(e) => log::warn!("[gatt] error sending response: {:?}", e),
                }
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(e) = handled {
            log::error!("[peripheral] {}", e);
        }
        if let Err(e) = flush(shared, server, conn).await {
            log::error!("[peripheral] host command failed: {:?}", e);
        }
    };

    if let Err(e) = shared.borrow_mut().disconnected(link, reason) {
        log::error!("[peripheral] {}", e);
    }
}

/// Route NUS writes through the controller; other handles belong to the stack
fn attribute_write<D: DataHandler>(
    shared: &Shared<D>,
    link: Link,
    handle: u16,
    data: &[u8],
    offset: u16,
) -> Result<(), crate::nus::AttError> {
    let mut controller = shared.borrow_mut();
    let handles = controller.nus().handles();
    if handle != handles.rx_value && handle != handles.ccc {
        return Ok(());
    }
    let written = controller.write(link, handle, data, offset)?;
    log::debug!("[gatt] {} byte(s) written to {:#06x}", written, handle);
    Ok(())
}

/// Notifier output: gate through the controller, then notify over the air
struct GattSink<'a, 'v, 's, D> {
    shared: &'a Shared<D>,
    server: &'a Server<'v>,
    conn: &'a GattConnection<'v, 's, DefaultPacketPool>,
}

impl<D: DataHandler> NotifySink for GattSink<'_, '_, '_, D> {
    async fn send(&mut self, byte: u8) -> bool {
        let accepted = self.shared.borrow_mut().send_notification(byte);
        if let Err(e) = accepted {
            log::debug!("[notify] skipped: {}", e);
            return false;
        }
        match flush(self.shared, self.server, self.conn).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[notify] send failed: {:?}", e);
                false
            }
        }
    }
}
