//! BLE client for the bridge's HID-over-GATT service.
//!
//! On Linux, BlueZ's input plugin claims HID devices; disable it (or run
//! with `--noplugin=input`) so the input report is visible to this client.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

/// Expand a 16-bit SIG UUID to 128 bits
const fn sig_uuid(short: u16) -> Uuid {
    Uuid::from_u128(0x0000_0000_0000_1000_8000_0080_5f9b_34fb | ((short as u128) << 96))
}

/// HID Service and characteristic UUIDs
pub const HID_SERVICE_UUID: Uuid = sig_uuid(0x1812);
pub const HID_INFORMATION_UUID: Uuid = sig_uuid(0x2a4a);
pub const REPORT_MAP_UUID: Uuid = sig_uuid(0x2a4b);
pub const INPUT_REPORT_UUID: Uuid = sig_uuid(0x2a4d);
pub const BATTERY_LEVEL_UUID: Uuid = sig_uuid(0x2a19);

/// BLE client subscribed to the bridge's input report.
pub struct HidClient {
    peripheral: Peripheral,
    characteristics: Vec<Characteristic>,
    input_report: Characteristic,
    /// Notified input reports, oldest first
    reports: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl HidClient {
    /// Scan for a device by name, connect and subscribe to the input report.
    pub async fn connect_by_name(name: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        adapter.start_scan(ScanFilter::default()).await?;
        let peripheral = Self::find_device_by_name(&adapter, name, scan_timeout).await?;
        adapter.stop_scan().await?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let characteristics: Vec<Characteristic> =
            peripheral.characteristics().into_iter().collect();

        let input_report = characteristics
            .iter()
            .find(|c| c.uuid == INPUT_REPORT_UUID && c.service_uuid == HID_SERVICE_UUID)
            .cloned()
            .ok_or_else(|| anyhow!("Input report characteristic not found"))?;

        let reports = Arc::new(Mutex::new(Vec::new()));

        // Collect notifications before subscribing so none are missed
        let reports_clone = reports.clone();
        let peripheral_clone = peripheral.clone();
        let mut stream = peripheral_clone.notifications().await?;
        tokio::spawn(async move {
            while let Some(data) = stream.next().await {
                if data.uuid == INPUT_REPORT_UUID {
                    reports_clone.lock().await.push(data.value);
                }
            }
        });

        Ok(Self {
            peripheral,
            characteristics,
            input_report,
            reports,
        })
    }

    /// Find a device by name within the scan timeout.
    async fn find_device_by_name(
        adapter: &Adapter,
        name: &str,
        scan_timeout: Duration,
    ) -> Result<Peripheral> {
        let start = std::time::Instant::now();

        while start.elapsed() < scan_timeout {
            let peripherals = adapter.peripherals().await?;

            for peripheral in peripherals {
                if let Some(props) = peripheral.properties().await? {
                    if props.local_name.as_deref() == Some(name) {
                        return Ok(peripheral);
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(anyhow!("Device '{}' not found within timeout", name))
    }

    /// Enable input report notifications.
    pub async fn subscribe(&self) -> Result<()> {
        self.peripheral.subscribe(&self.input_report).await?;
        Ok(())
    }

    /// Disable input report notifications.
    pub async fn unsubscribe(&self) -> Result<()> {
        self.peripheral.unsubscribe(&self.input_report).await?;
        Ok(())
    }

    /// Read a characteristic by UUID.
    pub async fn read(&self, uuid: Uuid) -> Result<Vec<u8>> {
        let characteristic = self
            .characteristics
            .iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| anyhow!("Characteristic {} not found", uuid))?;
        Ok(self.peripheral.read(characteristic).await?)
    }

    /// Wait until a notified report equal to `expected` arrives.
    ///
    /// Reports received before it are discarded.
    pub async fn wait_for_report(&self, expected: &[u8], wait: Duration) -> Result<()> {
        let result = timeout(wait, async {
            loop {
                {
                    let mut reports = self.reports.lock().await;
                    if let Some(pos) = reports.iter().position(|r| r == expected) {
                        reports.drain(..=pos);
                        return;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        result.map_err(|_| anyhow!("Timeout waiting for report {:02x?}", expected))
    }

    /// Next notified report, waiting up to `wait`.
    pub async fn next_report(&self, wait: Duration) -> Result<Vec<u8>> {
        let result = timeout(wait, async {
            loop {
                {
                    let mut reports = self.reports.lock().await;
                    if !reports.is_empty() {
                        return reports.remove(0);
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        result.map_err(|_| anyhow!("Timeout waiting for a report"))
    }

    /// Number of reports received and not yet consumed.
    pub async fn pending_reports(&self) -> usize {
        self.reports.lock().await.len()
    }

    /// Drop all received reports.
    pub async fn clear_reports(&self) {
        self.reports.lock().await.clear();
    }

    /// Disconnect from the device.
    pub async fn disconnect(&self) -> Result<()> {
        let _ = self.peripheral.unsubscribe(&self.input_report).await;
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
