//! NUS attribute table
//!
//! Fixed order, registered once with the host:
//!
//! | index | attribute                 |
//! |-------|---------------------------|
//! | 0     | primary service           |
//! | 1     | RX characteristic decl    |
//! | 2     | RX value                  |
//! | 3     | TX characteristic decl    |
//! | 4     | TX value                  |
//! | 5     | TX CCC descriptor         |

use crate::config;
use crate::gatt::uuid::{self, Uuid};

/// Characteristic properties bitfield
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Properties(pub u8);

impl Properties {
    pub const READ: Self = Self(0x02);
    pub const WRITE_WITHOUT_RESPONSE: Self = Self(0x04);
    pub const WRITE: Self = Self(0x08);
    pub const NOTIFY: Self = Self(0x10);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Attribute access permissions bitfield
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions(pub u8);

impl Permissions {
    pub const NONE: Self = Self(0x00);
    pub const READ: Self = Self(0x01);
    pub const WRITE: Self = Self(0x02);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// What an attribute declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Primary service declaration carrying the service UUID
    PrimaryService(Uuid),
    /// Characteristic declaration
    Characteristic { uuid: Uuid, properties: Properties },
    /// Characteristic value
    Value(Uuid),
    /// Client Characteristic Configuration descriptor
    ClientConfig,
}

/// One entry of the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    pub kind: AttributeKind,
    pub permissions: Permissions,
}

impl Attribute {
    /// Attribute type UUID as it appears in the ATT database
    pub fn attribute_type(&self) -> Uuid {
        match self.kind {
            AttributeKind::PrimaryService(_) => uuid::PRIMARY_SERVICE,
            AttributeKind::Characteristic { .. } => uuid::CHARACTERISTIC,
            AttributeKind::Value(uuid) => uuid,
            AttributeKind::ClientConfig => uuid::CLIENT_CHARACTERISTIC_CONFIGURATION,
        }
    }
}

pub const SERVICE_INDEX: usize = 0;
pub const RX_DECL_INDEX: usize = 1;
pub const RX_VALUE_INDEX: usize = 2;
pub const TX_DECL_INDEX: usize = 3;
pub const TX_VALUE_INDEX: usize = 4;
pub const CCC_INDEX: usize = 5;

const ATTRIBUTE_COUNT: usize = 6;

/// Ordered NUS attribute table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTable {
    attributes: [Attribute; ATTRIBUTE_COUNT],
}

impl AttributeTable {
    /// The Nordic UART Service table
    pub const fn nus() -> Self {
        let service = Uuid::new_long(config::nus::SERVICE_UUID);
        let rx = Uuid::new_long(config::nus::RX_UUID);
        let tx = Uuid::new_long(config::nus::TX_UUID);

        Self {
            attributes: [
                Attribute {
                    kind: AttributeKind::PrimaryService(service),
                    permissions: Permissions::READ,
                },
                Attribute {
                    kind: AttributeKind::Characteristic {
                        uuid: rx,
                        properties: Properties::WRITE.union(Properties::WRITE_WITHOUT_RESPONSE),
                    },
                    permissions: Permissions::READ,
                },
                Attribute {
                    kind: AttributeKind::Value(rx),
                    permissions: Permissions::READ.union(Permissions::WRITE),
                },
                Attribute {
                    kind: AttributeKind::Characteristic {
                        uuid: tx,
                        properties: Properties::NOTIFY,
                    },
                    permissions: Permissions::READ,
                },
                Attribute {
                    kind: AttributeKind::Value(tx),
                    permissions: Permissions::NONE,
                },
                Attribute {
                    kind: AttributeKind::ClientConfig,
                    permissions: Permissions::READ.union(Permissions::WRITE),
                },
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Attribute> {
        self.attributes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Handle of the attribute at `index` once registered at `base`
    pub fn handle_of(&self, base: u16, index: usize) -> Option<u16> {
        if index >= self.len() {
            return None;
        }
        base.checked_add(u16::try_from(index).ok()?)
    }

    /// Table index of `handle` once registered at `base`
    pub fn index_of(&self, base: u16, handle: u16) -> Option<usize> {
        let index = usize::from(handle.checked_sub(base)?);
        (index < self.len()).then_some(index)
    }
}

impl Default for AttributeTable {
    fn default() -> Self {
        Self::nus()
    }
}
