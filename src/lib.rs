#![cfg_attr(not(test), no_std)]

pub mod advertising;
pub mod central;
pub mod config;
pub mod gatt;
pub mod host;
pub mod nus;
pub mod peripheral;
pub mod security;
pub mod session;

// TrouBLE adapter, only available on target
#[cfg(feature = "embedded")]
pub mod ble;
