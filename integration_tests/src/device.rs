//! Device communication client.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use serialport::SerialPort;

use crate::protocol::{
    parse_connected_address, parse_device_name, CONNECTED_ADDRESS_QUERY, DEVICE_ID_QUERY,
};

/// Find available data ports by scanning ttyACM devices and testing with getDeviceId.
/// Returns a list of port names that answer with a device name.
pub fn find_data_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()?;
    let mut data_ports = Vec::new();

    for port_info in ports {
        // USB Serial JTAG enumerates as CDC-ACM
        if !port_info.port_name.contains("ttyACM") {
            continue;
        }

        if let Ok(mut client) = DeviceClient::new(&port_info.port_name, 115200) {
            client.set_timeout(Duration::from_millis(500));
            if client.device_name().is_ok() {
                data_ports.push(port_info.port_name.clone());
            }
        }
    }

    Ok(data_ports)
}

/// Find a single data port. Returns error if none found.
pub fn find_data_port() -> Result<String> {
    let ports = find_data_ports()?;
    match ports.into_iter().next() {
        Some(port) => Ok(port),
        None => anyhow::bail!("No data port found - ensure device is connected"),
    }
}

/// Resolve a port argument - returns the port path if not "auto", otherwise auto-detects.
pub fn resolve_port(port_arg: &str) -> Result<String> {
    if port_arg == "auto" {
        find_data_port()
    } else {
        Ok(port_arg.to_string())
    }
}

/// Client for the bridge's serial text protocol.
pub struct DeviceClient {
    port: Box<dyn SerialPort>,
    timeout: Duration,
    pending: Vec<u8>,
}

impl DeviceClient {
    /// Create a new device client.
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(50))
            .open()?;

        Ok(Self {
            port,
            timeout: Duration::from_secs(2),
            pending: Vec::new(),
        })
    }

    /// Set the reply timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Clear any pending data in the serial buffer.
    pub fn clear_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        self.pending.clear();
        Ok(())
    }

    /// Drain all pending data from the serial port.
    /// Reads until no more data is available.
    pub fn drain_buffer(&mut self) -> Result<()> {
        self.clear_buffer()?;

        let mut buf = [0u8; 256];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Send one command line, appending the newline terminator.
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()?;
        Ok(())
    }

    /// Send raw bytes without a terminator.
    pub fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read one reply line (without CRLF).
    pub fn read_line(&mut self) -> Result<String> {
        let start = Instant::now();
        let mut buf = [0u8; 64];

        while start.elapsed() < self.timeout {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line).trim_end().to_string();
                if text.is_empty() {
                    continue;
                }
                return Ok(text);
            }

            match self.port.read(&mut buf) {
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        anyhow::bail!(
            "Timeout waiting for reply, got {} bytes: {:?}",
            self.pending.len(),
            String::from_utf8_lossy(&self.pending)
        );
    }

    /// Check that nothing arrives within `window`.
    pub fn expect_silence(&mut self, window: Duration) -> Result<()> {
        let old_timeout = self.timeout;
        self.timeout = window;
        let result = self.read_line();
        self.timeout = old_timeout;

        match result {
            Ok(line) => anyhow::bail!("Unexpected output: {:?}", line),
            Err(_) => Ok(()),
        }
    }

    /// Query the advertised device name.
    pub fn device_name(&mut self) -> Result<String> {
        self.send_line(DEVICE_ID_QUERY)?;
        let line = self.read_line()?;
        parse_device_name(&line)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Unexpected reply to {}: {:?}", DEVICE_ID_QUERY, line))
    }

    /// Query the connected peer address, `None` if no peer is connected.
    pub fn connected_address(&mut self) -> Result<Option<String>> {
        self.send_line(CONNECTED_ADDRESS_QUERY)?;
        let line = self.read_line()?;
        parse_connected_address(&line)
            .map(|address| address.map(str::to_string))
            .ok_or_else(|| {
                anyhow::anyhow!("Unexpected reply to {}: {:?}", CONNECTED_ADDRESS_QUERY, line)
            })
    }

    /// Port path, for re-opening.
    pub fn port_name(&self) -> Result<String> {
        Ok(self.port.name().unwrap_or_default())
    }
}
