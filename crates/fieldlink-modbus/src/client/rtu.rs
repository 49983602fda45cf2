// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus RTU transport handler.
//!
//! Wraps a `tokio-modbus` RTU context over a `tokio-serial` port. The
//! handler mirrors the configured serial parameters and RS-485 line-timing
//! settings field-for-field; [`Transport::connect`] opens the device and
//! binds a fresh context.
//!
//! RS-485 note: the async serial layer exposes no RS-485 ioctl surface, so
//! the line-timing settings are held on the handler and reported in the
//! connect-time diagnostics; electrical line turnaround stays with the OS
//! serial driver.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_modbus::client::{rtu, Client, Context, Reader, Writer};
use tokio_modbus::Slave;
use tokio_serial::SerialPortBuilderExt;

use crate::config::{DataBits, Parity, Rs485Config, SlaveConfig, StopBits};
use crate::error::{ClientError, ClientResult};

use super::transport::Transport;

// =============================================================================
// RtuHandler
// =============================================================================

/// Modbus RTU transport handler.
///
/// Holds the serial device path, character framing, RS-485 sub-configuration,
/// slave identifier and both timeouts. The protocol binding lives in an
/// `Option` that is `None` until a connect succeeds and is replaced on every
/// successful connect.
pub struct RtuHandler {
    /// Serial device path.
    path: String,
    /// Baud rate.
    baud_rate: u32,
    /// Data bits.
    data_bits: DataBits,
    /// Parity.
    parity: Parity,
    /// Stop bits.
    stop_bits: StopBits,
    /// RS-485 line-timing configuration.
    rs485: Rs485Config,
    /// Slave/unit identifier.
    unit_id: u8,
    /// Per-request timeout.
    timeout: Duration,
    /// Idle age after which the binding is considered stale.
    idle_timeout: Duration,
    /// Bound protocol context, absent until connect succeeds.
    context: Option<Context>,
    /// Instant of the last successful operation.
    last_activity: Option<Instant>,
}

impl RtuHandler {
    /// Creates an unconnected handler from an RTU slave configuration.
    pub(crate) fn from_config(config: &SlaveConfig) -> Self {
        Self {
            path: config.address.clone(),
            baud_rate: config.baud_rate,
            data_bits: config.data_bits,
            parity: config.parity,
            stop_bits: config.stop_bits,
            rs485: config.rs485,
            unit_id: config.id,
            timeout: config.timeout,
            idle_timeout: config.idle_timeout,
            context: None,
            last_activity: None,
        }
    }

    /// Returns the serial device path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Returns the data bits.
    pub fn data_bits(&self) -> DataBits {
        self.data_bits
    }

    /// Returns the parity.
    pub fn parity(&self) -> Parity {
        self.parity
    }

    /// Returns the stop bits.
    pub fn stop_bits(&self) -> StopBits {
        self.stop_bits
    }

    /// Returns the RS-485 line-timing configuration.
    pub fn rs485(&self) -> &Rs485Config {
        &self.rs485
    }

    /// Opens the serial device and attaches an engine context to it.
    fn open(&self) -> impl std::future::Future<Output = ClientResult<Context>> + Send {
        // Capture the open inputs by value so the returned future does not
        // borrow `&self`; the handler is not `Sync` (its bound context holds
        // a non-`Sync` `dyn Client`), so a future borrowing `&self` could not
        // be `Send`.
        let path = self.path.clone();
        let baud_rate = self.baud_rate;
        let data_bits = self.data_bits;
        let parity = self.parity;
        let stop_bits = self.stop_bits;
        let open_timeout = self.timeout;
        let unit_id = self.unit_id;
        async move {
            let builder = tokio_serial::new(&path, baud_rate)
                .data_bits(data_bits.into())
                .parity(parity.into())
                .stop_bits(stop_bits.into())
                .timeout(open_timeout);

            let port = builder
                .open_native_async()
                .map_err(|source| ClientError::connect_failed(&path, source))?;

            Ok(rtu::attach_slave(port, Slave(unit_id)))
        }
    }

    /// Returns the bound context, re-opening the device first if the binding
    /// has been idle past `idle_timeout`.
    async fn bound_context(&mut self) -> ClientResult<&mut Context> {
        if self.context.is_some() && self.is_stale() {
            tracing::debug!(
                path = %self.path,
                idle_timeout = ?self.idle_timeout,
                "serial binding idle past the configured limit, re-opening"
            );
            if let Some(mut stale) = self.context.take() {
                let _ = stale.disconnect().await;
            }
            let ctx = self.open().await?;
            self.context = Some(ctx);
            self.mark_activity();
        }
        self.context.as_mut().ok_or(ClientError::NotConnected)
    }

    fn is_stale(&self) -> bool {
        if self.idle_timeout.is_zero() {
            return false;
        }
        self.last_activity
            .is_some_and(|at| at.elapsed() >= self.idle_timeout)
    }

    fn mark_activity(&mut self) {
        self.last_activity = Some(Instant::now());
    }
}

#[async_trait]
impl Transport for RtuHandler {
    async fn connect(&mut self) -> ClientResult<()> {
        // Re-open semantics: an existing binding is dropped first.
        if let Some(mut previous) = self.context.take() {
            let _ = previous.disconnect().await;
        }

        let ctx = self.open().await?;
        self.context = Some(ctx);
        self.mark_activity();

        tracing::info!(
            path = %self.path,
            baud_rate = self.baud_rate,
            unit_id = self.unit_id,
            "connected to Modbus RTU slave"
        );

        if self.rs485.enabled {
            tracing::debug!(
                delay_rts_before_send = ?self.rs485.delay_rts_before_send,
                delay_rts_after_send = ?self.rs485.delay_rts_after_send,
                rts_high_during_send = self.rs485.rts_high_during_send,
                rts_high_after_send = self.rs485.rts_high_after_send,
                rx_during_tx = self.rs485.rx_during_tx,
                "RS-485 line control enabled"
            );
        }

        Ok(())
    }

    async fn close(&mut self) -> ClientResult<()> {
        let Some(mut ctx) = self.context.take() else {
            return Ok(());
        };
        self.last_activity = None;

        ctx.disconnect()
            .await
            .map_err(|source| ClientError::close_failed(&self.path, source))?;

        tracing::debug!(path = %self.path, "closed Modbus RTU connection");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.context.is_some()
    }

    async fn read_coils(&mut self, address: u16, count: u16) -> ClientResult<Vec<bool>> {
        let limit = self.timeout;
        let ctx = self.bound_context().await?;
        let values = timeout(limit, ctx.read_coils(address, count))
            .await
            .map_err(|_| ClientError::timeout("read_coils", limit))?
            .map_err(|e| ClientError::protocol("read_coils", e))?
            .map_err(|code| ClientError::exception("read_coils", code))?;
        self.mark_activity();
        Ok(values)
    }

    async fn read_discrete_inputs(&mut self, address: u16, count: u16) -> ClientResult<Vec<bool>> {
        let limit = self.timeout;
        let ctx = self.bound_context().await?;
        let values = timeout(limit, ctx.read_discrete_inputs(address, count))
            .await
            .map_err(|_| ClientError::timeout("read_discrete_inputs", limit))?
            .map_err(|e| ClientError::protocol("read_discrete_inputs", e))?
            .map_err(|code| ClientError::exception("read_discrete_inputs", code))?;
        self.mark_activity();
        Ok(values)
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ClientResult<Vec<u16>> {
        let limit = self.timeout;
        let ctx = self.bound_context().await?;
        let values = timeout(limit, ctx.read_holding_registers(address, count))
            .await
            .map_err(|_| ClientError::timeout("read_holding_registers", limit))?
            .map_err(|e| ClientError::protocol("read_holding_registers", e))?
            .map_err(|code| ClientError::exception("read_holding_registers", code))?;
        self.mark_activity();
        Ok(values)
    }

    async fn read_input_registers(&mut self, address: u16, count: u16) -> ClientResult<Vec<u16>> {
        let limit = self.timeout;
        let ctx = self.bound_context().await?;
        let values = timeout(limit, ctx.read_input_registers(address, count))
            .await
            .map_err(|_| ClientError::timeout("read_input_registers", limit))?
            .map_err(|e| ClientError::protocol("read_input_registers", e))?
            .map_err(|code| ClientError::exception("read_input_registers", code))?;
        self.mark_activity();
        Ok(values)
    }

    async fn write_single_coil(&mut self, address: u16, value: bool) -> ClientResult<()> {
        let limit = self.timeout;
        let ctx = self.bound_context().await?;
        timeout(limit, ctx.write_single_coil(address, value))
            .await
            .map_err(|_| ClientError::timeout("write_single_coil", limit))?
            .map_err(|e| ClientError::protocol("write_single_coil", e))?
            .map_err(|code| ClientError::exception("write_single_coil", code))?;
        self.mark_activity();
        Ok(())
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> ClientResult<()> {
        let limit = self.timeout;
        let ctx = self.bound_context().await?;
        timeout(limit, ctx.write_single_register(address, value))
            .await
            .map_err(|_| ClientError::timeout("write_single_register", limit))?
            .map_err(|e| ClientError::protocol("write_single_register", e))?
            .map_err(|code| ClientError::exception("write_single_register", code))?;
        self.mark_activity();
        Ok(())
    }

    async fn write_multiple_coils(&mut self, address: u16, values: &[bool]) -> ClientResult<()> {
        let limit = self.timeout;
        let ctx = self.bound_context().await?;
        timeout(limit, ctx.write_multiple_coils(address, values))
            .await
            .map_err(|_| ClientError::timeout("write_multiple_coils", limit))?
            .map_err(|e| ClientError::protocol("write_multiple_coils", e))?
            .map_err(|code| ClientError::exception("write_multiple_coils", code))?;
        self.mark_activity();
        Ok(())
    }

    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> ClientResult<()> {
        let limit = self.timeout;
        let ctx = self.bound_context().await?;
        timeout(limit, ctx.write_multiple_registers(address, values))
            .await
            .map_err(|_| ClientError::timeout("write_multiple_registers", limit))?
            .map_err(|e| ClientError::protocol("write_multiple_registers", e))?
            .map_err(|code| ClientError::exception("write_multiple_registers", code))?;
        self.mark_activity();
        Ok(())
    }

    async fn masked_write_register(
        &mut self,
        address: u16,
        and_mask: u16,
        or_mask: u16,
    ) -> ClientResult<()> {
        let limit = self.timeout;
        let ctx = self.bound_context().await?;
        timeout(limit, ctx.masked_write_register(address, and_mask, or_mask))
            .await
            .map_err(|_| ClientError::timeout("masked_write_register", limit))?
            .map_err(|e| ClientError::protocol("masked_write_register", e))?
            .map_err(|code| ClientError::exception("masked_write_register", code))?;
        self.mark_activity();
        Ok(())
    }

    async fn read_write_multiple_registers(
        &mut self,
        read_address: u16,
        read_count: u16,
        write_address: u16,
        write_values: &[u16],
    ) -> ClientResult<Vec<u16>> {
        let limit = self.timeout;
        let ctx = self.bound_context().await?;
        let values = timeout(
            limit,
            ctx.read_write_multiple_registers(read_address, read_count, write_address, write_values),
        )
        .await
        .map_err(|_| ClientError::timeout("read_write_multiple_registers", limit))?
        .map_err(|e| ClientError::protocol("read_write_multiple_registers", e))?
        .map_err(|code| ClientError::exception("read_write_multiple_registers", code))?;
        self.mark_activity();
        Ok(values)
    }

    fn unit_id(&self) -> u8 {
        self.unit_id
    }

    fn display_name(&self) -> String {
        format!(
            "Modbus RTU {} @{}bps {}{}{} (unit {})",
            self.path, self.baud_rate, self.data_bits, self.parity, self.stop_bits, self.unit_id
        )
    }
}

impl std::fmt::Debug for RtuHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtuHandler")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .field("unit_id", &self.unit_id)
            .field("connected", &self.context.is_some())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SlaveConfig {
        SlaveConfig::rtu("/dev/ttyUSB0")
            .with_id(3)
            .with_baud_rate(19200)
            .with_framing(DataBits::Seven, Parity::Even, StopBits::Two)
            .with_rs485(Rs485Config {
                enabled: true,
                delay_rts_before_send: Duration::from_millis(2),
                delay_rts_after_send: Duration::from_millis(1),
                rts_high_during_send: true,
                rts_high_after_send: false,
                rx_during_tx: true,
            })
    }

    #[test]
    fn test_from_config_mirrors_serial_parameters() {
        let h = RtuHandler::from_config(&config());
        assert_eq!(h.path(), "/dev/ttyUSB0");
        assert_eq!(h.baud_rate(), 19200);
        assert_eq!(h.data_bits(), DataBits::Seven);
        assert_eq!(h.parity(), Parity::Even);
        assert_eq!(h.stop_bits(), StopBits::Two);
        assert_eq!(h.unit_id(), 3);
        assert!(!h.is_connected());
    }

    #[test]
    fn test_from_config_mirrors_rs485_fields() {
        let cfg = config();
        let h = RtuHandler::from_config(&cfg);
        assert_eq!(h.rs485(), &cfg.rs485);
        assert!(h.rs485().enabled);
        assert_eq!(h.rs485().delay_rts_before_send, Duration::from_millis(2));
        assert_eq!(h.rs485().delay_rts_after_send, Duration::from_millis(1));
        assert!(h.rs485().rts_high_during_send);
        assert!(!h.rs485().rts_high_after_send);
        assert!(h.rs485().rx_during_tx);
    }

    #[test]
    fn test_display_name() {
        let h = RtuHandler::from_config(&config());
        assert_eq!(h.display_name(), "Modbus RTU /dev/ttyUSB0 @19200bps 7E2 (unit 3)");
    }

    #[test]
    fn test_debug_impl() {
        let debug = format!("{:?}", RtuHandler::from_config(&config()));
        assert!(debug.contains("/dev/ttyUSB0"));
        assert!(debug.contains("19200"));
    }
}
