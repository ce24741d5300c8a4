//! NUS discovery chain
//!
//! Walks the peer's attribute table in four steps: primary service, RX
//! characteristic, TX characteristic, then the TX CCC descriptor. The host
//! reports one attribute (or "nothing more") per request, and every report
//! is interpreted against the step that issued the request, never against
//! the reported attribute's own type.
//!
//! ```text
//! ExpectService --found h--> ExpectRx   (characteristic, start h + 1)
//! ExpectRx      --found h--> ExpectTx   (characteristic, start h + 1)
//! ExpectTx      --found h--> ExpectCcc  (descriptor, start h + 2, value = h + 1)
//! ExpectCcc     --found h--> Done       (subscribe, ccc = h)
//! ```

use crate::config;
use crate::gatt::subscription::{Subscription, SubscriptionBuilder};
use crate::gatt::uuid::{Uuid, CLIENT_CHARACTERISTIC_CONFIGURATION};
use crate::gatt::{DiscoverKind, DiscoverRequest, DiscoveredAttribute};

/// Position in the discovery chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStep {
    ExpectService,
    ExpectRx,
    ExpectTx,
    ExpectCcc,
    Done,
}

/// UUIDs searched for at each step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryTargets {
    pub service: Uuid,
    pub rx: Uuid,
    pub tx: Uuid,
    pub ccc: Uuid,
}

impl DiscoveryTargets {
    /// Targets for the Nordic UART Service
    pub const fn nus() -> Self {
        Self {
            service: Uuid::new_long(config::nus::SERVICE_UUID),
            rx: Uuid::new_long(config::nus::RX_UUID),
            tx: Uuid::new_long(config::nus::TX_UUID),
            ccc: CLIENT_CHARACTERISTIC_CONFIGURATION,
        }
    }

    fn target(&self, step: DiscoveryStep) -> Option<Uuid> {
        match step {
            DiscoveryStep::ExpectService => Some(self.service),
            DiscoveryStep::ExpectRx => Some(self.rx),
            DiscoveryStep::ExpectTx => Some(self.tx),
            DiscoveryStep::ExpectCcc => Some(self.ccc),
            DiscoveryStep::Done => None,
        }
    }
}

impl Default for DiscoveryTargets {
    fn default() -> Self {
        Self::nus()
    }
}

/// One row of the non-terminal transition table
struct Transition {
    from: DiscoveryStep,
    next: DiscoveryStep,
    kind: DiscoverKind,
    start_offset: u16,
    records_value_handle: bool,
}

const TRANSITIONS: [Transition; 3] = [
    Transition {
        from: DiscoveryStep::ExpectService,
        next: DiscoveryStep::ExpectRx,
        kind: DiscoverKind::Characteristic,
        start_offset: 1,
        records_value_handle: false,
    },
    Transition {
        from: DiscoveryStep::ExpectRx,
        next: DiscoveryStep::ExpectTx,
        kind: DiscoverKind::Characteristic,
        start_offset: 1,
        records_value_handle: false,
    },
    Transition {
        from: DiscoveryStep::ExpectTx,
        next: DiscoveryStep::ExpectCcc,
        kind: DiscoverKind::Descriptor,
        start_offset: 2,
        records_value_handle: true,
    },
];

fn transition(step: DiscoveryStep) -> Option<&'static Transition> {
    TRANSITIONS.iter().find(|t| t.from == step)
}

/// What the caller must do after feeding an attribute report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainAction {
    /// Submit this request to the host
    Discover(DiscoverRequest),
    /// All handles found; write the CCC descriptor
    Subscribe(Subscription),
    /// Search space exhausted or chain not running; state has been cleared
    Exhausted,
}

/// Discovery state threaded through successive host callbacks
#[derive(Debug, Clone)]
pub struct DiscoveryChain {
    targets: DiscoveryTargets,
    step: DiscoveryStep,
    cursor: Option<DiscoverRequest>,
    builder: SubscriptionBuilder,
}

impl DiscoveryChain {
    pub const fn new(targets: DiscoveryTargets) -> Self {
        Self {
            targets,
            step: DiscoveryStep::Done,
            cursor: None,
            builder: SubscriptionBuilder::new(),
        }
    }

    /// Begin a fresh search for the primary service over the full handle range
    pub fn start(&mut self) -> DiscoverRequest {
        let request = DiscoverRequest {
            uuid: self.targets.service,
            start_handle: config::discovery::FIRST_HANDLE,
            end_handle: config::discovery::LAST_HANDLE,
            kind: DiscoverKind::Primary,
        };
        self.builder.clear();
        self.step = DiscoveryStep::ExpectService;
        self.cursor = Some(request);
        request
    }

    /// Feed one host report (`None` means the search space is exhausted)
    pub fn on_attribute(&mut self, attr: Option<DiscoveredAttribute>) -> ChainAction {
        let Some(attr) = attr else {
            log::info!("[discovery] complete at {:?}", self.step);
            self.reset();
            return ChainAction::Exhausted;
        };
        let Some(cursor) = self.cursor else {
            log::warn!("[discovery] attribute {} reported while idle", attr.handle);
            return ChainAction::Exhausted;
        };

        log::debug!("[discovery] attribute handle {}", attr.handle);

        if self.step == DiscoveryStep::ExpectCcc {
            self.builder.set_ccc_handle(attr.handle);
            let subscription = self.builder.build();
            self.reset();
            return match subscription {
                Some(sub) => ChainAction::Subscribe(sub),
                None => ChainAction::Exhausted,
            };
        }

        let Some(row) = transition(self.step) else {
            self.reset();
            return ChainAction::Exhausted;
        };
        log::info!("[discovery] {} found", cursor.uuid);

        let start = match attr.handle.checked_add(row.start_offset) {
            Some(start) if start <= cursor.end_handle => start,
            _ => {
                log::warn!("[discovery] handle {} leaves no room for {:?}", attr.handle, row.next);
                self.reset();
                return ChainAction::Exhausted;
            }
        };
        if row.records_value_handle {
            // Characteristic value directly follows its declaration
            self.builder.set_value_handle(attr.handle + 1);
        }

        let Some(uuid) = self.targets.target(row.next) else {
            self.reset();
            return ChainAction::Exhausted;
        };
        let request = DiscoverRequest {
            uuid,
            start_handle: start,
            end_handle: cursor.end_handle,
            kind: row.kind,
        };
        self.step = row.next;
        self.cursor = Some(request);
        ChainAction::Discover(request)
    }

    /// Abandon the chain (host refused a request, link dropped, ...)
    pub fn abort(&mut self) {
        if self.is_running() {
            log::warn!("[discovery] aborted at {:?}", self.step);
        }
        self.reset();
    }

    pub fn is_running(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn step(&self) -> DiscoveryStep {
        self.step
    }

    /// Current cursor, `None` when idle
    pub fn cursor(&self) -> Option<&DiscoverRequest> {
        self.cursor.as_ref()
    }

    fn reset(&mut self) {
        self.step = DiscoveryStep::Done;
        self.cursor = None;
        self.builder.clear();
    }
}

impl Default for DiscoveryChain {
    fn default() -> Self {
        Self::new(DiscoveryTargets::nus())
    }
}
