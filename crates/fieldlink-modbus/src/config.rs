// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Slave device configuration.
//!
//! A [`SlaveConfig`] describes one target device on a Modbus network and is
//! the single input to [`SlaveClient::new`](crate::client::SlaveClient::new).
//! It is typically deserialized by a higher-level configuration loader;
//! durations use humantime strings ("5s", "1m") and every field except
//! `mode` and `address` carries a default.
//!
//! The `mode` field is kept as a free-form string: an unknown mode must be
//! representable so that construction can reject it with
//! [`ClientError::UnsupportedMode`](crate::error::ClientError::UnsupportedMode)
//! instead of failing inside the deserializer.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use fieldlink_modbus::config::SlaveConfig;
//!
//! let config = SlaveConfig::tcp("tcp://192.168.1.100:502")
//!     .with_id(1)
//!     .with_timeout(Duration::from_secs(1));
//! assert!(config.validate().is_ok());
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Length of the scheme prefix stripped from TCP addresses (`tcp://`).
pub(crate) const TCP_SCHEME_PREFIX_LEN: usize = 6;

/// Highest slave/unit identifier addressable on a Modbus bus.
pub const MAX_UNIT_ID: u8 = 247;

// =============================================================================
// Mode
// =============================================================================

/// Transport mode of a slave connection, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Modbus TCP over an Ethernet connection.
    Tcp,
    /// Modbus RTU over a serial line.
    Rtu,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tcp => "tcp",
            Self::Rtu => "rtu",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Mode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Self::Tcp),
            "rtu" => Ok(Self::Rtu),
            other => Err(ClientError::unsupported_mode(other)),
        }
    }
}

// =============================================================================
// Serial Port Settings
// =============================================================================

/// Data bits per serial character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    /// 5 data bits.
    Five,
    /// 6 data bits.
    Six,
    /// 7 data bits.
    Seven,
    /// 8 data bits (default).
    #[default]
    Eight,
}

impl DataBits {
    /// Returns the number of data bits.
    pub const fn bits(&self) -> u8 {
        match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => Self::Five,
            DataBits::Six => Self::Six,
            DataBits::Seven => Self::Seven,
            DataBits::Eight => Self::Eight,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    /// No parity bit (default).
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

impl Parity {
    /// Returns the short letter used in serial shorthand (8N1, 8E1, ...).
    pub const fn letter(&self) -> char {
        match self {
            Self::None => 'N',
            Self::Odd => 'O',
            Self::Even => 'E',
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => Self::None,
            Parity::Odd => Self::Odd,
            Parity::Even => Self::Even,
        }
    }
}

/// Stop bits per serial character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    /// 1 stop bit (default).
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

impl StopBits {
    /// Returns the number of stop bits.
    pub const fn bits(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => Self::One,
            StopBits::Two => Self::Two,
        }
    }
}

// =============================================================================
// Rs485Config
// =============================================================================

/// RS-485 half-duplex line-timing configuration.
///
/// Carried verbatim on the RTU handler. Electrical line turnaround is owned
/// by the OS serial driver; these settings describe the RTS behavior the
/// transceiver expects around each transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Rs485Config {
    /// Enables RS-485 line control.
    pub enabled: bool,

    /// Delay between asserting RTS and starting to send.
    #[serde(with = "humantime_serde")]
    pub delay_rts_before_send: Duration,

    /// Delay between the end of a send and releasing RTS.
    #[serde(with = "humantime_serde")]
    pub delay_rts_after_send: Duration,

    /// Drives RTS high while sending.
    pub rts_high_during_send: bool,

    /// Leaves RTS high after the send completes.
    pub rts_high_after_send: bool,

    /// Keeps the receiver active during transmission.
    pub rx_during_tx: bool,
}

// =============================================================================
// SlaveConfig
// =============================================================================

/// Configuration for one target Modbus slave device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaveConfig {
    /// Transport mode: `"tcp"` or `"rtu"`.
    pub mode: String,

    /// Connection address. For TCP the first [`TCP_SCHEME_PREFIX_LEN`] bytes
    /// are a scheme prefix (`tcp://`) stripped before dialing; for RTU a
    /// serial device path such as `/dev/ttyUSB0`.
    pub address: String,

    /// Slave/unit identifier (0-247).
    #[serde(default = "default_unit_id")]
    pub id: u8,

    /// Per-request timeout, also bounding the TCP dial.
    #[serde(default = "default_timeout")]
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Idle age after which an open but unused connection is considered
    /// stale. Zero disables idle bookkeeping.
    #[serde(default = "default_idle_timeout")]
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// Baud rate (RTU only).
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Data bits (RTU only).
    #[serde(default)]
    pub data_bits: DataBits,

    /// Parity (RTU only).
    #[serde(default)]
    pub parity: Parity,

    /// Stop bits (RTU only).
    #[serde(default)]
    pub stop_bits: StopBits,

    /// RS-485 line-timing configuration (RTU only).
    #[serde(default)]
    pub rs485: Rs485Config,
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_baud_rate() -> u32 {
    9600
}

/// Baud rates accepted by [`SlaveConfig::validate`].
const VALID_BAUD_RATES: &[u32] = &[
    300, 600, 1200, 2400, 4800, 9600, 14400, 19200, 38400, 57600, 115200, 230400, 460800, 921600,
];

impl SlaveConfig {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a TCP configuration with defaults for everything but the
    /// address. The address is expected to carry its `tcp://` prefix.
    pub fn tcp(address: impl Into<String>) -> Self {
        Self {
            mode: Mode::Tcp.to_string(),
            address: address.into(),
            ..Self::base()
        }
    }

    /// Creates an RTU configuration with defaults for everything but the
    /// device path.
    pub fn rtu(address: impl Into<String>) -> Self {
        Self {
            mode: Mode::Rtu.to_string(),
            address: address.into(),
            ..Self::base()
        }
    }

    fn base() -> Self {
        Self {
            mode: String::new(),
            address: String::new(),
            id: default_unit_id(),
            timeout: default_timeout(),
            idle_timeout: default_idle_timeout(),
            baud_rate: default_baud_rate(),
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            rs485: Rs485Config::default(),
        }
    }

    /// Sets the slave/unit identifier.
    pub fn with_id(mut self, id: u8) -> Self {
        self.id = id;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the idle timeout.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Sets the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Sets the serial character framing.
    pub fn with_framing(mut self, data_bits: DataBits, parity: Parity, stop_bits: StopBits) -> Self {
        self.data_bits = data_bits;
        self.parity = parity;
        self.stop_bits = stop_bits;
        self
    }

    /// Sets the RS-485 line-timing configuration.
    pub fn with_rs485(mut self, rs485: Rs485Config) -> Self {
        self.rs485 = rs485;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the TCP dial target: the address with its fixed-length scheme
    /// prefix removed. Addresses shorter than the prefix yield an empty
    /// target, which fails at connect time.
    pub(crate) fn tcp_target(&self) -> String {
        self.address
            .get(TCP_SCHEME_PREFIX_LEN..)
            .unwrap_or_default()
            .to_string()
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validates field values for the configuration layer.
    ///
    /// Construction deliberately does not call this: beyond mode dispatch,
    /// malformed values are deferred to the transport and fail at connect.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.address.is_empty() {
            return Err(ClientError::invalid_config("address", "must not be empty"));
        }

        if self.id > MAX_UNIT_ID {
            return Err(ClientError::invalid_config(
                "id",
                format!("{} exceeds the Modbus unit id range 0-{}", self.id, MAX_UNIT_ID),
            ));
        }

        if self.timeout.is_zero() {
            return Err(ClientError::invalid_config(
                "timeout",
                "must be greater than zero",
            ));
        }

        if self.mode == Mode::Rtu.to_string() && !VALID_BAUD_RATES.contains(&self.baud_rate) {
            return Err(ClientError::invalid_config(
                "baud_rate",
                format!("{} is not a standard baud rate", self.baud_rate),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("tcp".parse::<Mode>().unwrap(), Mode::Tcp);
        assert_eq!("rtu".parse::<Mode>().unwrap(), Mode::Rtu);
        assert!(matches!(
            "ascii".parse::<Mode>(),
            Err(ClientError::UnsupportedMode { mode }) if mode == "ascii"
        ));
        // Matching is exact, as in the configuration format.
        assert!("TCP".parse::<Mode>().is_err());
    }

    #[test]
    fn test_tcp_target_strips_prefix() {
        let config = SlaveConfig::tcp("tcp://10.0.0.5:502");
        assert_eq!(config.tcp_target(), "10.0.0.5:502");
    }

    #[test]
    fn test_tcp_target_short_address() {
        let config = SlaveConfig::tcp("tcp:");
        assert_eq!(config.tcp_target(), "");
    }

    #[test]
    fn test_defaults() {
        let config = SlaveConfig::rtu("/dev/ttyUSB0");
        assert_eq!(config.id, 1);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert!(!config.rs485.enabled);
    }

    #[test]
    fn test_validate_rejects_out_of_range_unit_id() {
        let config = SlaveConfig::tcp("tcp://10.0.0.5:502").with_id(248);
        assert!(matches!(
            config.validate(),
            Err(ClientError::InvalidConfig { field: "id", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_nonstandard_baud_rate() {
        let config = SlaveConfig::rtu("/dev/ttyUSB0").with_baud_rate(12345);
        assert!(matches!(
            config.validate(),
            Err(ClientError::InvalidConfig { field: "baud_rate", .. })
        ));
        // Baud rate is not consulted for TCP configurations.
        let config = SlaveConfig::tcp("tcp://10.0.0.5:502").with_baud_rate(12345);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_with_humantime_durations() {
        let config: SlaveConfig = serde_json::from_str(
            r#"{
                "mode": "tcp",
                "address": "tcp://10.0.0.5:502",
                "id": 7,
                "timeout": "1s",
                "idle_timeout": "30s"
            }"#,
        )
        .unwrap();
        assert_eq!(config.id, 7);
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.baud_rate, 9600);
    }

    #[test]
    fn test_deserialize_rs485_block() {
        let config: SlaveConfig = serde_json::from_str(
            r#"{
                "mode": "rtu",
                "address": "/dev/ttyUSB0",
                "parity": "even",
                "stop_bits": "two",
                "rs485": {
                    "enabled": true,
                    "delay_rts_before_send": "2ms",
                    "rts_high_during_send": true
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.stop_bits, StopBits::Two);
        assert!(config.rs485.enabled);
        assert_eq!(config.rs485.delay_rts_before_send, Duration::from_millis(2));
        assert_eq!(config.rs485.delay_rts_after_send, Duration::ZERO);
        assert!(config.rs485.rts_high_during_send);
        assert!(!config.rs485.rx_during_tx);
    }

    #[test]
    fn test_serial_conversions() {
        assert!(matches!(
            tokio_serial::DataBits::from(DataBits::Seven),
            tokio_serial::DataBits::Seven
        ));
        assert!(matches!(
            tokio_serial::Parity::from(Parity::Even),
            tokio_serial::Parity::Even
        ));
        assert!(matches!(
            tokio_serial::StopBits::from(StopBits::Two),
            tokio_serial::StopBits::Two
        ));
    }

    #[test]
    fn test_serial_display() {
        assert_eq!(DataBits::Eight.to_string(), "8");
        assert_eq!(Parity::None.to_string(), "N");
        assert_eq!(StopBits::One.to_string(), "1");
    }
}
