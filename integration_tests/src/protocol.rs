//! Serial text protocol matching the firmware.

#![allow(dead_code)]

/// Diagnostic query for the advertised device name
pub const DEVICE_ID_QUERY: &str = "getDeviceId";

/// Diagnostic query for the connected peer address
pub const CONNECTED_ADDRESS_QUERY: &str = "getConnectedAddress";

/// Prefix of every advertised device name
pub const DEVICE_NAME_PREFIX: &str = "HID-Bridge-";

const DEVICE_NAME_REPLY: &str = "Bluetooth Device Name: ";
const CONNECTED_ADDRESS_REPLY: &str = "Connected Device Address: ";
const NO_DEVICE_REPLY: &str = "No device connected";

/// Build a mouse report line.
pub fn mouse_line(buttons: u8, dx: i8, dy: i8) -> String {
    format!("{} {} {}", buttons, dx, dy)
}

/// Build a keyboard report line.
pub fn keyboard_line(modifiers: u8, keys: &[u8]) -> String {
    let mut line = modifiers.to_string();
    for key in keys.iter().take(6) {
        line.push(' ');
        line.push_str(&key.to_string());
    }
    line
}

/// Input report bytes the firmware sends for a mouse line.
pub fn mouse_report(buttons: u8, dx: i8, dy: i8) -> Vec<u8> {
    vec![buttons, dx as u8, dy as u8]
}

/// Input report bytes the firmware sends for a keyboard line.
pub fn keyboard_report(modifiers: u8, keys: &[u8]) -> Vec<u8> {
    let mut report = vec![modifiers, 0x00];
    report.extend(keys.iter().take(6));
    report.resize(8, 0x00);
    report
}

/// Extract the device name from a `getDeviceId` reply line.
pub fn parse_device_name(line: &str) -> Option<&str> {
    line.trim_end().strip_prefix(DEVICE_NAME_REPLY)
}

/// Parse a `getConnectedAddress` reply line.
///
/// Returns `Some(None)` when no peer is connected and `None` if the line is
/// not a connected address reply at all.
pub fn parse_connected_address(line: &str) -> Option<Option<&str>> {
    let line = line.trim_end();
    if line == NO_DEVICE_REPLY {
        return Some(None);
    }
    line.strip_prefix(CONNECTED_ADDRESS_REPLY).map(Some)
}

/// Check a device name is the prefix followed by six uppercase hex digits.
pub fn is_valid_device_name(name: &str) -> bool {
    match name.strip_prefix(DEVICE_NAME_PREFIX) {
        Some(suffix) => {
            suffix.len() == 6
                && suffix
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        }
        None => false,
    }
}

/// Check an address is six colon separated hex bytes.
pub fn is_valid_address(address: &str) -> bool {
    let parts: Vec<&str> = address.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}
