//! BLE client for the NUS peripheral firmware.

use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

/// Nordic UART Service UUIDs
pub const NUS_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);
const NUS_RX_UUID: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e); // Write to device
const NUS_TX_UUID: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e); // Notify from device

/// Connected NUS peripheral.
pub struct NusClient {
    peripheral: Peripheral,
    rx_char: Characteristic,
    tx_char: Characteristic,
    /// Service UUIDs seen in the advertisement
    advertised_services: Vec<Uuid>,
    notifications: Option<ReceiverStream<Vec<u8>>>,
}

impl NusClient {
    /// Scan for a device by name and connect.
    pub async fn connect_by_name(name: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        adapter.start_scan(ScanFilter::default()).await?;
        let (peripheral, advertised_services) = Self::find_device_by_name(&adapter, name, scan_timeout).await?;
        adapter.stop_scan().await?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let characteristics = peripheral.characteristics();
        let find = |uuid: Uuid, what: &str| {
            characteristics
                .iter()
                .find(|c| c.uuid == uuid)
                .cloned()
                .ok_or_else(|| anyhow!("NUS {} characteristic not found", what))
        };
        let rx_char = find(NUS_RX_UUID, "RX")?;
        let tx_char = find(NUS_TX_UUID, "TX")?;

        Ok(Self {
            peripheral,
            rx_char,
            tx_char,
            advertised_services,
            notifications: None,
        })
    }

    async fn find_device_by_name(
        adapter: &Adapter,
        name: &str,
        scan_timeout: Duration,
    ) -> Result<(Peripheral, Vec<Uuid>)> {
        let start = std::time::Instant::now();

        while start.elapsed() < scan_timeout {
            for peripheral in adapter.peripherals().await? {
                let Some(props) = peripheral.properties().await? else {
                    continue;
                };
                if props.local_name.as_deref() == Some(name) {
                    return Ok((peripheral, props.services));
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(anyhow!("Device '{}' not found within timeout", name))
    }

    pub fn advertised_services(&self) -> &[Uuid] {
        &self.advertised_services
    }

    /// Subscribe to TX notifications.
    pub async fn subscribe(&mut self) -> Result<()> {
        self.peripheral.subscribe(&self.tx_char).await?;

        let (sender, receiver) = mpsc::channel(64);
        let mut stream = self.peripheral.notifications().await?;
        tokio::spawn(async move {
            while let Some(data) = stream.next().await {
                if data.uuid == NUS_TX_UUID && sender.send(data.value).await.is_err() {
                    break;
                }
            }
        });
        self.notifications = Some(ReceiverStream::new(receiver));
        Ok(())
    }

    /// Collect `count` TX notifications.
    pub async fn collect_notifications(&mut self, count: usize, wait: Duration) -> Result<Vec<u8>> {
        let stream = self
            .notifications
            .as_mut()
            .ok_or_else(|| anyhow!("Not subscribed to TX"))?;

        let mut bytes = Vec::with_capacity(count);
        while bytes.len() < count {
            match timeout(wait, stream.next()).await {
                Ok(Some(value)) => bytes.extend_from_slice(&value),
                Ok(None) => return Err(anyhow!("Notification stream closed")),
                Err(_) => return Err(anyhow!("Timeout after {} of {} notifications", bytes.len(), count)),
            }
        }
        Ok(bytes)
    }

    /// Write to RX with response so ATT errors surface.
    pub async fn write_rx(&self, data: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.rx_char, data, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        if self.notifications.is_some() {
            self.peripheral.unsubscribe(&self.tx_char).await?;
        }
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
