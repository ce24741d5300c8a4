//! TrouBLE host adapter
//!
//! Runs the role controllers on top of the TrouBLE host stack. Controllers
//! talk to a [`CommandQueue`](crate::host::CommandQueue); the tasks here feed
//! them host events and execute the queued commands against the stack.

pub mod central;
pub mod peripheral;
pub mod service;

pub use service::{NordicUartService, Server};

use embassy_time::{Duration, Ticker};
use trouble_host::prelude::*;

use crate::host::{Address as PeerAddress, AddressKind};
use crate::nus::AttError;
use crate::peripheral::TickSource;
use crate::security::{self, SecurityLevel as LinkLevel};

/// Background task driving the host stack; must run alongside any role
async fn ble_task<C: Controller, P: PacketPool>(mut runner: Runner<'_, C, P>) {
    loop {
        if let Err(e) = runner.run().await {
            log::error!("[ble] runner error: {:?}", e);
        }
    }
}

/// Stack security level mapped onto the level the controllers gate on
fn link_level(level: SecurityLevel) -> LinkLevel {
    match level {
        SecurityLevel::NoEncryption => LinkLevel::Low,
        SecurityLevel::Encrypted => LinkLevel::Medium,
        SecurityLevel::EncryptedAuthenticated => LinkLevel::Fips,
    }
}

fn io_capabilities(caps: security::IoCapabilities) -> IoCapabilities {
    match caps {
        security::IoCapabilities::DisplayOnly => IoCapabilities::DisplayOnly,
        security::IoCapabilities::DisplayYesNo => IoCapabilities::DisplayYesNo,
        security::IoCapabilities::KeyboardOnly => IoCapabilities::KeyboardOnly,
        security::IoCapabilities::NoInputNoOutput => IoCapabilities::NoInputNoOutput,
        security::IoCapabilities::KeyboardDisplay => IoCapabilities::KeyboardDisplay,
    }
}

fn att_error(error: AttError) -> AttErrorCode {
    match error {
        AttError::InvalidHandle => AttErrorCode::INVALID_HANDLE,
        AttError::InvalidOffset => AttErrorCode::INVALID_OFFSET,
        AttError::InvalidAttributeLength => AttErrorCode::INVALID_ATTRIBUTE_VALUE_LENGTH,
    }
}

fn peer_address(kind: AddrKind, addr: BdAddr) -> PeerAddress {
    let addr = addr.raw().try_into().unwrap_or_default();
    if kind == AddrKind::PUBLIC {
        PeerAddress::public(addr)
    } else {
        PeerAddress::random(addr)
    }
}

fn stack_address(peer: &PeerAddress) -> Address {
    let kind = match peer.kind {
        AddressKind::Public => AddrKind::PUBLIC,
        AddressKind::Random => AddrKind::RANDOM,
    };
    Address {
        kind,
        addr: BdAddr::new(peer.addr),
    }
}

/// Periodic ticks from an embassy [`Ticker`]
pub struct IntervalTicks(Ticker);

impl IntervalTicks {
    pub fn every(interval_ms: u64) -> Self {
        Self(Ticker::every(Duration::from_millis(interval_ms)))
    }
}

impl TickSource for IntervalTicks {
    async fn next(&mut self) -> bool {
        self.0.next().await;
        true
    }
}
