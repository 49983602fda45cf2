// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus TCP transport handler.
//!
//! Wraps a `tokio-modbus` TCP context. The handler is constructed from a
//! [`SlaveConfig`] without performing any I/O; [`Transport::connect`] dials
//! the target (bounded by the configured timeout) and binds a fresh context,
//! which every protocol operation then delegates to.

use std::io;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_modbus::client::{tcp, Client, Context, Reader, Writer};
use tokio_modbus::Slave;

use crate::config::SlaveConfig;
use crate::error::{ClientError, ClientResult};

use super::transport::Transport;

// =============================================================================
// TcpHandler
// =============================================================================

/// Modbus TCP transport handler.
///
/// Holds the dial target (the configured address with its scheme prefix
/// stripped), the slave identifier and both timeouts. The protocol binding
/// lives in an `Option` that is `None` until a connect succeeds and is
/// replaced on every successful connect.
pub struct TcpHandler {
    /// Dial target, host:port.
    target: String,
    /// Slave/unit identifier.
    unit_id: u8,
    /// Per-request and dial timeout.
    timeout: Duration,
    /// Idle age after which the binding is considered stale.
    idle_timeout: Duration,
    /// Bound protocol context, absent until connect succeeds.
    context: Option<Context>,
    /// Instant of the last successful operation.
    last_activity: Option<Instant>,
}

impl TcpHandler {
    /// Creates an unconnected handler from a TCP slave configuration.
    pub(crate) fn from_config(config: &SlaveConfig) -> Self {
        Self {
            target: config.tcp_target(),
            unit_id: config.id,
            timeout: config.timeout,
            idle_timeout: config.idle_timeout,
            context: None,
            last_activity: None,
        }
    }

    /// Returns the dial target (address with the scheme prefix removed).
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Dials the target and attaches an engine context to the stream.
    fn dial(&self) -> impl std::future::Future<Output = ClientResult<Context>> + Send {
        // Capture the dial inputs by value so the returned future does not
        // borrow `&self`; the handler is not `Sync` (its bound context holds
        // a non-`Sync` `dyn Client`), so a future borrowing `&self` could not
        // be `Send`.
        let target = self.target.clone();
        let dial_timeout = self.timeout;
        let unit_id = self.unit_id;
        async move {
            let stream = match timeout(dial_timeout, TcpStream::connect(target.as_str())).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(source)) => return Err(ClientError::connect_failed(&target, source)),
                Err(_) => {
                    let cause = io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("dial timed out after {:?}", dial_timeout),
                    );
                    return Err(ClientError::connect_failed(&target, cause));
                }
            };
            Ok(tcp::attach_slave(stream, Slave(unit_id)))
        }
    }

    /// Returns the bound context, re-dialing first if the binding has been
    /// idle past `idle_timeout`.
    async fn bound_context(&mut self) -> ClientResult<&mut Context> {
        if self.context.is_some() && self.is_stale() {
            tracing::debug!(
                target = %self.target,
                idle_timeout = ?self.idle_timeout,
                "connection idle past the configured limit, re-dialing"
            );
            if let Some(mut stale) = self.context.take() {
                let _ = stale.disconnect().await;
            }
            let ctx = self.dial().await?;
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
impl Transport for TcpHandler {
    async fn connect(&mut self) -> ClientResult<()> {
        // Re-dial semantics: an existing binding is dropped first.
        if let Some(mut previous) = self.context.take() {
            let _ = previous.disconnect().await;
        }

        let ctx = self.dial().await?;
        self.context = Some(ctx);
        self.mark_activity();

        tracing::info!(
            target = %self.target,
            unit_id = self.unit_id,
            "connected to Modbus TCP slave"
        );

        Ok(())
    }

    async fn close(&mut self) -> ClientResult<()> {
        let Some(mut ctx) = self.context.take() else {
            return Ok(());
        };
        self.last_activity = None;

        ctx.disconnect()
            .await
            .map_err(|source| ClientError::close_failed(&self.target, source))?;

        tracing::debug!(target = %self.target, "closed Modbus TCP connection");
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
        format!("Modbus TCP {} (unit {})", self.target, self.unit_id)
    }
}

impl std::fmt::Debug for TcpHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpHandler")
            .field("target", &self.target)
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
    use std::time::Duration;

    use super::*;

    fn handler() -> TcpHandler {
        let config = SlaveConfig::tcp("tcp://192.168.1.100:502").with_id(5);
        TcpHandler::from_config(&config)
    }

    #[test]
    fn test_from_config_strips_scheme_prefix() {
        let h = handler();
        assert_eq!(h.target(), "192.168.1.100:502");
        assert_eq!(h.unit_id(), 5);
        assert!(!h.is_connected());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(handler().display_name(), "Modbus TCP 192.168.1.100:502 (unit 5)");
    }

    #[test]
    fn test_never_connected_is_not_stale() {
        let h = handler();
        assert!(!h.is_stale());
    }

    #[test]
    fn test_idle_binding_goes_stale() {
        let config =
            SlaveConfig::tcp("tcp://192.168.1.100:502").with_idle_timeout(Duration::from_millis(10));
        let mut h = TcpHandler::from_config(&config);
        h.last_activity = Some(Instant::now() - Duration::from_millis(20));
        assert!(h.is_stale());
        h.mark_activity();
        assert!(!h.is_stale());
    }

    #[test]
    fn test_zero_idle_timeout_disables_bookkeeping() {
        let config = SlaveConfig::tcp("tcp://192.168.1.100:502").with_idle_timeout(Duration::ZERO);
        let mut h = TcpHandler::from_config(&config);
        h.last_activity = Some(Instant::now() - Duration::from_secs(3600));
        assert!(!h.is_stale());
    }

    #[test]
    fn test_debug_impl() {
        let debug = format!("{:?}", handler());
        assert!(debug.contains("192.168.1.100:502"));
        assert!(debug.contains("connected: false"));
    }
}
