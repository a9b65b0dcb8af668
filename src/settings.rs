//! Serial transport settings.
//!
//! Plain configuration values handed to the factory. The factory keeps its
//! own copy, so mutating a settings value after `create` has no effect on an
//! already-constructed transport.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default port name used by [`SerialSettings::default`].
pub const DEFAULT_PORT_NAME: &str = "COM1";

/// Default baud rate (9600 bps).
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default number of data bits (8).
pub const DEFAULT_DATA_BITS: u8 = 8;

/// Settings for a serial transport.
///
/// Applied to the underlying port when the transport is opened; changing a
/// settings value has no effect on transports that were already created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Name of the serial port, e.g. "COM1" or "/dev/ttyUSB0".
    pub port_name: String,

    /// Baud rate in bits per second.
    #[serde(default = "default_baud")]
    pub baud_rate: u32,

    /// Number of data bits per character (5 to 8).
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,

    /// Parity checking mode.
    #[serde(default)]
    pub parity: Parity,

    /// Number of stop bits.
    #[serde(default)]
    pub stop_bits: StopBits,

    /// Handshake (flow control) mode.
    #[serde(default)]
    pub handshake: Handshake,
}

fn default_baud() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_data_bits() -> u8 {
    DEFAULT_DATA_BITS
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port_name: DEFAULT_PORT_NAME.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DEFAULT_DATA_BITS,
            parity: Parity::None,
            stop_bits: StopBits::One,
            handshake: Handshake::None,
        }
    }
}

/// Comma-joined descriptor used in logs and diagnostics, e.g.
/// `COM1,9600,8,None,One,None`. This exact format is part of the contract.
impl fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.port_name, self.baud_rate, self.data_bits, self.parity, self.stop_bits, self.handshake
        )
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Parity bit set so the count of set bits is even.
    Even,
    /// Parity bit set so the count of set bits is odd.
    Odd,
    /// Parity bit always 1.
    Mark,
    /// Parity bit always 0.
    Space,
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Even => "Even",
            Self::Odd => "Odd",
            Self::Mark => "Mark",
            Self::Space => "Space",
        };
        f.write_str(name)
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    /// One stop bit.
    #[default]
    One,
    /// 1.5 stop bits.
    OnePointFive,
    /// Two stop bits.
    Two,
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::One => "One",
            Self::OnePointFive => "OnePointFive",
            Self::Two => "Two",
        };
        f.write_str(name)
    }
}

/// Handshake (flow control) modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handshake {
    /// No flow control.
    #[default]
    None,
    /// Request-to-Send hardware flow control.
    RequestToSend,
    /// Both RTS hardware control and XON/XOFF software control.
    RequestToSendXOnXOff,
    /// XON/XOFF software flow control.
    XOnXOff,
}

impl fmt::Display for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::RequestToSend => "RequestToSend",
            Self::RequestToSendXOnXOff => "RequestToSendXOnXOff",
            Self::XOnXOff => "XOnXOff",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_values() {
        let settings = SerialSettings::default();
        assert_eq!(settings.port_name, "COM1");
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.data_bits, 8);
        assert_eq!(settings.parity, Parity::None);
        assert_eq!(settings.stop_bits, StopBits::One);
        assert_eq!(settings.handshake, Handshake::None);
    }

    #[test]
    fn test_display_format() {
        assert_eq!(SerialSettings::default().to_string(), "COM1,9600,8,None,One,None");

        let settings = SerialSettings {
            port_name: "/dev/ttyUSB0".to_string(),
            baud_rate: 115200,
            data_bits: 7,
            parity: Parity::Even,
            stop_bits: StopBits::Two,
            handshake: Handshake::XOnXOff,
        };
        assert_eq!(settings.to_string(), "/dev/ttyUSB0,115200,7,Even,Two,XOnXOff");
    }

    #[test]
    fn test_enum_display_names() {
        assert_eq!(Parity::Mark.to_string(), "Mark");
        assert_eq!(Parity::Space.to_string(), "Space");
        assert_eq!(StopBits::OnePointFive.to_string(), "OnePointFive");
        assert_eq!(Handshake::RequestToSendXOnXOff.to_string(), "RequestToSendXOnXOff");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{"port_name": "COM7"}"#;
        let settings: SerialSettings = serde_json::from_str(json).expect("deserialize");
        assert_eq!(settings.port_name, "COM7");
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.data_bits, 8);
        assert_eq!(settings.parity, Parity::None);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = SerialSettings::default();
        let mut copy = original.clone();
        copy.port_name = "COM9".to_string();
        copy.baud_rate = 19200;
        assert_eq!(original.port_name, "COM1");
        assert_eq!(original.baud_rate, 9600);
    }
}
