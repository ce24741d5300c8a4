//! Boundary to the BLE host stack
//!
//! `traits` holds the calls made into the host, `events` the callbacks the
//! host delivers back. `queue` defers calls for hosts that run as async tasks.

pub mod events;
pub mod queue;
pub mod traits;

pub use events::{
    AuthEvents, ConnectionEvents, DiscoveryEvents, GattServerEvents, NotificationEvents, ScanEvents,
};
pub use queue::{CommandQueue, HostCommand};
pub use traits::{
    Address, AddressKind, AdvReportKind, CentralHost, ConnHandle, ConnectionRefs, HostError,
    IterControl, PairingHost, Peer, PeripheralHost, ScanMode,
};
