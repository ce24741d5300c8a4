//! Nordic UART Service as a TrouBLE GATT server
//!
//! - Service UUID: 6E400001-B5A3-F393-E0A9-E50E24DCCA9E
//! - RX Characteristic: 6E400002-... (write, write without response), one byte
//! - TX Characteristic: 6E400003-... (notify), one byte
//!
//! The macro lays the attributes out in the same order as
//! [`AttributeTable::nus`](crate::nus::table::AttributeTable::nus), so the
//! table's index arithmetic holds for the server's handles.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use trouble_host::prelude::*;

use crate::nus::table::RX_VALUE_INDEX;

#[gatt_service(uuid = "6e400001-b5a3-f393-e0a9-e50e24dcca9e")]
pub struct NordicUartService {
    /// Client writes here
    #[characteristic(uuid = "6e400002-b5a3-f393-e0a9-e50e24dcca9e", write, write_without_response, value = 0)]
    pub rx: u8,

    /// Server notifies here
    #[characteristic(uuid = "6e400003-b5a3-f393-e0a9-e50e24dcca9e", notify, value = 0)]
    pub tx: u8,
}

#[gatt_server(mutex_type = CriticalSectionRawMutex)]
pub struct Server {
    pub nus: NordicUartService,
}

impl Server<'_> {
    /// Handle of the NUS primary service declaration
    pub fn nus_base_handle(&self) -> u16 {
        self.nus.rx.handle.saturating_sub(RX_VALUE_INDEX as u16)
    }
}
