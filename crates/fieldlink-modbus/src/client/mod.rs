// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Slave client factory and handle.
//!
//! [`SlaveClient::new`] translates a [`SlaveConfig`] into a concrete
//! transport handler and presents a mode-independent handle:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SlaveClient                              │
//! │          (mode-independent handle, connect/close/ops)           │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Handler (closed set)                        │
//! └─────────────────────────────────────────────────────────────────┘
//!            │                                     │
//!            ▼                                     ▼
//! ┌─────────────────────┐             ┌─────────────────────┐
//! │     TcpHandler      │             │     RtuHandler      │
//! │   (tokio-modbus)    │             │ (tokio-modbus +     │
//! │                     │             │  tokio-serial)      │
//! └─────────────────────┘             └─────────────────────┘
//! ```
//!
//! The transport kind is fixed at construction; the handle never mutates
//! its mode or address afterwards. Protocol operations are valid only
//! between a successful `connect` and the next `close`.
//!
//! # Examples
//!
//! ```rust,ignore
//! use fieldlink_modbus::{SlaveClient, SlaveConfig};
//!
//! let config = SlaveConfig::tcp("tcp://10.0.0.5:502").with_id(1);
//! let mut client = SlaveClient::new(config)?;
//!
//! client.connect().await?;
//! let registers = client.read_holding_registers(0, 10).await?;
//! client.close().await?;
//! ```

mod rtu;
mod tcp;
mod transport;

pub use rtu::RtuHandler;
pub use tcp::TcpHandler;
pub use transport::Transport;

use async_trait::async_trait;

use crate::config::{Mode, SlaveConfig};
use crate::error::ClientResult;

// =============================================================================
// Handler
// =============================================================================

/// Transport handler selected at construction time.
///
/// The set is closed: only TCP and RTU exist, so dispatch is a match over
/// this enum rather than a trait object.
#[derive(Debug)]
pub enum Handler {
    /// Modbus TCP handler.
    Tcp(TcpHandler),
    /// Modbus RTU handler.
    Rtu(RtuHandler),
}

macro_rules! delegate {
    ($self:ident, $handler:ident => $call:expr) => {
        match $self {
            Handler::Tcp($handler) => $call,
            Handler::Rtu($handler) => $call,
        }
    };
}

#[async_trait]
impl Transport for Handler {
    async fn connect(&mut self) -> ClientResult<()> {
        delegate!(self, h => h.connect().await)
    }

    async fn close(&mut self) -> ClientResult<()> {
        delegate!(self, h => h.close().await)
    }

    fn is_connected(&self) -> bool {
        delegate!(self, h => h.is_connected())
    }

    async fn read_coils(&mut self, address: u16, count: u16) -> ClientResult<Vec<bool>> {
        delegate!(self, h => h.read_coils(address, count).await)
    }

    async fn read_discrete_inputs(&mut self, address: u16, count: u16) -> ClientResult<Vec<bool>> {
        delegate!(self, h => h.read_discrete_inputs(address, count).await)
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ClientResult<Vec<u16>> {
        delegate!(self, h => h.read_holding_registers(address, count).await)
    }

    async fn read_input_registers(&mut self, address: u16, count: u16) -> ClientResult<Vec<u16>> {
        delegate!(self, h => h.read_input_registers(address, count).await)
    }

    async fn write_single_coil(&mut self, address: u16, value: bool) -> ClientResult<()> {
        delegate!(self, h => h.write_single_coil(address, value).await)
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> ClientResult<()> {
        delegate!(self, h => h.write_single_register(address, value).await)
    }

    async fn write_multiple_coils(&mut self, address: u16, values: &[bool]) -> ClientResult<()> {
        delegate!(self, h => h.write_multiple_coils(address, values).await)
    }

    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> ClientResult<()> {
        delegate!(self, h => h.write_multiple_registers(address, values).await)
    }

    async fn masked_write_register(
        &mut self,
        address: u16,
        and_mask: u16,
        or_mask: u16,
    ) -> ClientResult<()> {
        delegate!(self, h => h.masked_write_register(address, and_mask, or_mask).await)
    }

    async fn read_write_multiple_registers(
        &mut self,
        read_address: u16,
        read_count: u16,
        write_address: u16,
        write_values: &[u16],
    ) -> ClientResult<Vec<u16>> {
        delegate!(self, h => h
            .read_write_multiple_registers(read_address, read_count, write_address, write_values)
            .await)
    }

    fn unit_id(&self) -> u8 {
        delegate!(self, h => h.unit_id())
    }

    fn display_name(&self) -> String {
        delegate!(self, h => h.display_name())
    }
}

// =============================================================================
// SlaveClient
// =============================================================================

/// Mode-independent handle over one Modbus slave connection.
///
/// Constructed once from a [`SlaveConfig`] snapshot; the transport kind is
/// fixed for the handle's lifetime. The handle owns its transport
/// exclusively. Every lifecycle and protocol operation takes `&mut self`,
/// so concurrent use must be serialized by the caller.
#[derive(Debug)]
pub struct SlaveClient {
    mode: Mode,
    handler: Handler,
}

impl SlaveClient {
    /// Builds an unconnected client from a slave configuration.
    ///
    /// Performs no I/O and no field-level validation beyond mode dispatch;
    /// malformed addresses or parameters surface at [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// [`ClientError::UnsupportedMode`](crate::error::ClientError::UnsupportedMode)
    /// if the configured mode is neither `tcp` nor `rtu`.
    pub fn new(config: SlaveConfig) -> ClientResult<Self> {
        let mode: Mode = config.mode.parse()?;
        let handler = match mode {
            Mode::Tcp => Handler::Tcp(TcpHandler::from_config(&config)),
            Mode::Rtu => Handler::Rtu(RtuHandler::from_config(&config)),
        };
        Ok(Self { mode, handler })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Opens the underlying transport and binds a fresh protocol context,
    /// replacing any prior binding.
    pub async fn connect(&mut self) -> ClientResult<()> {
        self.handler.connect().await
    }

    /// Closes the underlying transport.
    ///
    /// Safe to call on a never-connected handle. Protocol operations fail
    /// with `NotConnected` afterwards until the next [`connect`](Self::connect).
    pub async fn close(&mut self) -> ClientResult<()> {
        self.handler.close().await
    }

    /// Returns `true` while a protocol context is bound.
    pub fn is_connected(&self) -> bool {
        self.handler.is_connected()
    }

    // =========================================================================
    // Protocol Operations
    // =========================================================================

    /// Reads coils (FC 01).
    pub async fn read_coils(&mut self, address: u16, count: u16) -> ClientResult<Vec<bool>> {
        self.handler.read_coils(address, count).await
    }

    /// Reads discrete inputs (FC 02).
    pub async fn read_discrete_inputs(
        &mut self,
        address: u16,
        count: u16,
    ) -> ClientResult<Vec<bool>> {
        self.handler.read_discrete_inputs(address, count).await
    }

    /// Reads holding registers (FC 03).
    pub async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> ClientResult<Vec<u16>> {
        self.handler.read_holding_registers(address, count).await
    }

    /// Reads input registers (FC 04).
    pub async fn read_input_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> ClientResult<Vec<u16>> {
        self.handler.read_input_registers(address, count).await
    }

    /// Writes a single coil (FC 05).
    pub async fn write_single_coil(&mut self, address: u16, value: bool) -> ClientResult<()> {
        self.handler.write_single_coil(address, value).await
    }

    /// Writes a single holding register (FC 06).
    pub async fn write_single_register(&mut self, address: u16, value: u16) -> ClientResult<()> {
        self.handler.write_single_register(address, value).await
    }

    /// Writes multiple coils (FC 15).
    pub async fn write_multiple_coils(
        &mut self,
        address: u16,
        values: &[bool],
    ) -> ClientResult<()> {
        self.handler.write_multiple_coils(address, values).await
    }

    /// Writes multiple holding registers (FC 16).
    pub async fn write_multiple_registers(
        &mut self,
        address: u16,
        values: &[u16],
    ) -> ClientResult<()> {
        self.handler.write_multiple_registers(address, values).await
    }

    /// Applies an AND/OR mask to a holding register (FC 22).
    pub async fn masked_write_register(
        &mut self,
        address: u16,
        and_mask: u16,
        or_mask: u16,
    ) -> ClientResult<()> {
        self.handler
            .masked_write_register(address, and_mask, or_mask)
            .await
    }

    /// Reads and writes multiple registers in one transaction (FC 23).
    pub async fn read_write_multiple_registers(
        &mut self,
        read_address: u16,
        read_count: u16,
        write_address: u16,
        write_values: &[u16],
    ) -> ClientResult<Vec<u16>> {
        self.handler
            .read_write_multiple_registers(read_address, read_count, write_address, write_values)
            .await
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Returns the transport mode, fixed at construction.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns the slave/unit identifier.
    pub fn unit_id(&self) -> u8 {
        self.handler.unit_id()
    }

    /// Returns a display name for this client.
    pub fn display_name(&self) -> String {
        self.handler.display_name()
    }

    /// Returns the underlying transport handler.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::{DataBits, Parity, Rs485Config, StopBits};
    use crate::error::ClientError;

    use super::*;

    #[test]
    fn test_tcp_construction_strips_scheme_prefix() {
        // Round-trip scenario: tcp://10.0.0.5:502 targets 10.0.0.5:502.
        let config = SlaveConfig::tcp("tcp://10.0.0.5:502")
            .with_id(1)
            .with_timeout(Duration::from_secs(1))
            .with_idle_timeout(Duration::from_secs(30));
        let client = SlaveClient::new(config).unwrap();

        assert_eq!(client.mode(), Mode::Tcp);
        assert_eq!(client.unit_id(), 1);
        assert!(!client.is_connected());
        match client.handler() {
            Handler::Tcp(h) => assert_eq!(h.target(), "10.0.0.5:502"),
            Handler::Rtu(_) => panic!("expected a TCP handler"),
        }
    }

    #[test]
    fn test_rtu_construction_mirrors_configuration() {
        let rs485 = Rs485Config {
            enabled: true,
            delay_rts_before_send: Duration::from_millis(4),
            delay_rts_after_send: Duration::from_millis(2),
            rts_high_during_send: true,
            rts_high_after_send: true,
            rx_during_tx: false,
        };
        let config = SlaveConfig::rtu("/dev/ttyS1")
            .with_id(17)
            .with_baud_rate(115200)
            .with_framing(DataBits::Eight, Parity::Odd, StopBits::One)
            .with_rs485(rs485);
        let client = SlaveClient::new(config).unwrap();

        assert_eq!(client.mode(), Mode::Rtu);
        assert_eq!(client.unit_id(), 17);
        match client.handler() {
            Handler::Rtu(h) => {
                assert_eq!(h.path(), "/dev/ttyS1");
                assert_eq!(h.baud_rate(), 115200);
                assert_eq!(h.data_bits(), DataBits::Eight);
                assert_eq!(h.parity(), Parity::Odd);
                assert_eq!(h.stop_bits(), StopBits::One);
                assert_eq!(h.rs485(), &rs485);
            }
            Handler::Tcp(_) => panic!("expected an RTU handler"),
        }
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let mut config = SlaveConfig::tcp("tcp://10.0.0.5:502");
        config.mode = "ascii".to_string();
        assert!(matches!(
            SlaveClient::new(config),
            Err(ClientError::UnsupportedMode { mode }) if mode == "ascii"
        ));
    }

    #[test]
    fn test_display_name() {
        let client = SlaveClient::new(SlaveConfig::tcp("tcp://plc.local:502").with_id(5)).unwrap();
        assert_eq!(client.display_name(), "Modbus TCP plc.local:502 (unit 5)");
    }
}
