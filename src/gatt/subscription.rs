//! Notification subscriptions
//!
//! A [`Subscription`] can only be built once discovery has located both the
//! characteristic value handle and its CCC descriptor handle. The live
//! [`SubscriptionState`] then filters inbound notifications for the
//! lifetime of the connection.

use crate::host::HostError;

/// Client Characteristic Configuration values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CccValue {
    Disabled,
    Notify,
    Indicate,
}

impl CccValue {
    /// Decode the 16-bit descriptor value
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0001 => Self::Notify,
            0x0002 => Self::Indicate,
            _ => Self::Disabled,
        }
    }

    /// Encode as the 16-bit descriptor value
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Disabled => 0x0000,
            Self::Notify => 0x0001,
            Self::Indicate => 0x0002,
        }
    }
}

/// Fully resolved subscription parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    /// Handle of the characteristic value notifications arrive on
    pub value_handle: u16,
    /// Handle of the CCC descriptor to write
    pub ccc_handle: u16,
    /// Value to write into the CCC descriptor
    pub value: CccValue,
}

/// Collects subscription handles as discovery locates them
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionBuilder {
    value_handle: Option<u16>,
    ccc_handle: Option<u16>,
}

impl SubscriptionBuilder {
    pub const fn new() -> Self {
        Self {
            value_handle: None,
            ccc_handle: None,
        }
    }

    pub fn set_value_handle(&mut self, handle: u16) {
        self.value_handle = Some(handle);
    }

    pub fn set_ccc_handle(&mut self, handle: u16) {
        self.ccc_handle = Some(handle);
    }

    pub fn value_handle(&self) -> Option<u16> {
        self.value_handle
    }

    /// Returns the notify subscription once both handles are known
    pub fn build(&self) -> Option<Subscription> {
        Some(Subscription {
            value_handle: self.value_handle?,
            ccc_handle: self.ccc_handle?,
            value: CccValue::Notify,
        })
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

/// Outcome of handing a notification to the subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery<'a> {
    /// Payload for the application
    Data(&'a [u8]),
    /// Peer removed the subscription, stop delivering
    Unsubscribed,
    /// No active subscription; nothing to deliver
    Inactive,
}

/// Live subscription for the current connection
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionState {
    active: Option<Subscription>,
}

impl SubscriptionState {
    pub const fn new() -> Self {
        Self { active: None }
    }

    /// Mark the subscription as confirmed by the host
    pub fn activate(&mut self, subscription: Subscription) {
        self.active = Some(subscription);
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Value handle of the active subscription (`None` is the empty sentinel)
    pub fn value_handle(&self) -> Option<u16> {
        self.active.map(|s| s.value_handle)
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.active.as_ref()
    }

    /// Route an inbound notification.
    ///
    /// A `None` payload is the host's marker for "unsubscribed": the value
    /// handle is reset and delivery ends for this subscription.
    pub fn deliver<'a>(&mut self, data: Option<&'a [u8]>) -> Delivery<'a> {
        if self.active.is_none() {
            return Delivery::Inactive;
        }
        match data {
            Some(payload) => Delivery::Data(payload),
            None => {
                self.active = None;
                Delivery::Unsubscribed
            }
        }
    }

    pub fn reset(&mut self) {
        self.active = None;
    }
}

/// Treat "already subscribed" as success; every other failure is kept
pub fn accept_already_subscribed(result: Result<(), HostError>) -> Result<(), HostError> {
    match result {
        Err(HostError::AlreadySubscribed) => Ok(()),
        other => other,
    }
}
