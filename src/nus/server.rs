//! NUS attribute server

use crate::config::nus::RX_VALUE_LEN;
use crate::gatt::CccValue;
use crate::host::{ConnHandle, PeripheralHost};
use crate::nus::table::{self, AttributeTable};
use crate::nus::{AttError, NusError};

/// Data written to RX by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxEvent<'a> {
    pub conn: ConnHandle,
    pub data: &'a [u8],
}

/// Receives RX writes, called synchronously from the write handler
pub trait DataHandler {
    fn on_data(&mut self, event: RxEvent<'_>);
}

impl<F: FnMut(RxEvent<'_>)> DataHandler for F {
    fn on_data(&mut self, event: RxEvent<'_>) {
        self(event)
    }
}

/// Copy `value[offset..]` into `buf`, as much as fits
pub fn read_attribute(value: &[u8], buf: &mut [u8], offset: u16) -> Result<usize, AttError> {
    let remaining = value.get(usize::from(offset)..).ok_or(AttError::InvalidOffset)?;

    let len = buf.len().min(remaining.len());
    buf[..len].copy_from_slice(&remaining[..len]);
    Ok(len)
}

/// Handles of the registered service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NusHandles {
    pub service: u16,
    pub rx_value: u16,
    pub tx_value: u16,
    pub ccc: u16,
}

/// Nordic UART Service server state
pub struct NusServer<D> {
    table: AttributeTable,
    handles: NusHandles,
    rx_value: [u8; RX_VALUE_LEN],
    notify_enabled: bool,
    handler: D,
}

impl<D: DataHandler> NusServer<D> {
    /// Register the NUS table with `host`; a data handler is required
    pub fn init<H: PeripheralHost>(host: &mut H, handler: Option<D>) -> Result<Self, NusError> {
        let handler = handler.ok_or(NusError::MissingDataHandler)?;
        let table = AttributeTable::nus();
        let base = host.register_service(&table)?;

        let handle = |index| table.handle_of(base, index).ok_or(NusError::HandleRange);
        let handles = NusHandles {
            service: handle(table::SERVICE_INDEX)?,
            rx_value: handle(table::RX_VALUE_INDEX)?,
            tx_value: handle(table::TX_VALUE_INDEX)?,
            ccc: handle(table::CCC_INDEX)?,
        };
        log::debug!(
            "[nus] registered at {:#06x} (rx {:#06x}, tx {:#06x}, ccc {:#06x})",
            handles.service,
            handles.rx_value,
            handles.tx_value,
            handles.ccc
        );

        Ok(Self {
            table,
            handles,
            rx_value: [0; RX_VALUE_LEN],
            notify_enabled: false,
            handler,
        })
    }

    pub fn handles(&self) -> NusHandles {
        self.handles
    }

    pub fn table(&self) -> &AttributeTable {
        &self.table
    }

    /// Current RX backing value
    pub fn rx_value(&self) -> &[u8] {
        &self.rx_value
    }

    pub fn is_notify_enabled(&self) -> bool {
        self.notify_enabled
    }

    /// Write request on the RX value
    pub fn on_write_rx(&mut self, conn: ConnHandle, data: &[u8], offset: u16) -> Result<usize, AttError> {
        let start = usize::from(offset);
        let end = start + data.len();
        if end > RX_VALUE_LEN {
            return Err(AttError::InvalidOffset);
        }

        self.rx_value[start..end].copy_from_slice(data);
        self.handler.on_data(RxEvent {
            conn,
            data: &self.rx_value[start..end],
        });
        Ok(data.len())
    }

    /// Read request on the RX value
    pub fn on_read_rx(&self, buf: &mut [u8], offset: u16) -> Result<usize, AttError> {
        read_attribute(&self.rx_value, buf, offset)
    }

    /// Current CCC descriptor value
    pub fn ccc_value(&self) -> u16 {
        if self.notify_enabled {
            CccValue::Notify.as_u16()
        } else {
            CccValue::Disabled.as_u16()
        }
    }

    /// CCC descriptor changed; only plain notify enables TX
    pub fn on_ccc_changed(&mut self, value: u16) {
        self.notify_enabled = CccValue::from_u16(value) == CccValue::Notify;
        log::info!(
            "[nus] TX notifications {}",
            if self.notify_enabled { "enabled" } else { "disabled" }
        );
    }

    /// Notify one byte on the TX value
    pub fn notify<H: PeripheralHost>(&self, host: &mut H, conn: ConnHandle, byte: u8) -> Result<(), NusError> {
        if !self.notify_enabled {
            return Err(NusError::NotSubscribed);
        }
        host.notify(conn, self.handles.tx_value, &[byte])?;
        Ok(())
    }
}
