//! GATT client side: UUIDs, the NUS discovery chain and subscriptions

pub mod discovery;
pub mod subscription;
pub mod uuid;

pub use discovery::{ChainAction, DiscoveryChain, DiscoveryStep, DiscoveryTargets};
pub use subscription::{CccValue, Subscription, SubscriptionBuilder, SubscriptionState};
pub use uuid::Uuid;

/// Kind of discovery procedure requested from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverKind {
    /// Primary service by UUID
    Primary,
    /// Characteristic declaration by UUID
    Characteristic,
    /// Descriptor by UUID
    Descriptor,
}

/// Discovery cursor handed to the host for the next search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverRequest {
    /// Attribute type being searched for
    pub uuid: Uuid,
    /// First handle of the search range (inclusive)
    pub start_handle: u16,
    /// Last handle of the search range (inclusive)
    pub end_handle: u16,
    /// Procedure to run
    pub kind: DiscoverKind,
}

/// Attribute reported by the host for a discovery request
///
/// For characteristics the handle is the declaration handle; the value
/// attribute follows at `handle + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveredAttribute {
    pub handle: u16,
}
