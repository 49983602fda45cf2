// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Common capability set for transport handlers.
//!
//! [`Transport`] is the uniform contract both handlers satisfy: lifecycle
//! ({connect, close}) plus the protocol operations delegated to the engine
//! context bound on connect. The set of implementors is closed (TCP and
//! RTU), so dispatch happens over the [`Handler`](super::Handler) enum
//! rather than trait objects.
//!
//! All methods take `&mut self`: a handler owns exactly one transport
//! connection and one outstanding request, and callers are serialized by
//! the borrow checker instead of an internal lock.

use async_trait::async_trait;

use crate::error::ClientResult;

/// Capability set of a transport handler.
///
/// # Implementors
///
/// - [`TcpHandler`](super::TcpHandler): Modbus TCP
/// - [`RtuHandler`](super::RtuHandler): Modbus RTU over a serial line
#[async_trait]
pub trait Transport: Send {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Opens the underlying transport and binds a fresh protocol context.
    ///
    /// Calling `connect` on an already-open handler drops the previous
    /// binding and re-dials.
    async fn connect(&mut self) -> ClientResult<()>;

    /// Closes the underlying transport and drops the protocol binding.
    ///
    /// Safe to call on a never-connected handler (a no-op).
    async fn close(&mut self) -> ClientResult<()>;

    /// Returns `true` while a protocol context is bound.
    fn is_connected(&self) -> bool;

    // =========================================================================
    // Read Operations (FC 01-04)
    // =========================================================================

    /// Reads coils (FC 01).
    async fn read_coils(&mut self, address: u16, count: u16) -> ClientResult<Vec<bool>>;

    /// Reads discrete inputs (FC 02).
    async fn read_discrete_inputs(&mut self, address: u16, count: u16) -> ClientResult<Vec<bool>>;

    /// Reads holding registers (FC 03).
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ClientResult<Vec<u16>>;

    /// Reads input registers (FC 04).
    async fn read_input_registers(&mut self, address: u16, count: u16) -> ClientResult<Vec<u16>>;

    // =========================================================================
    // Write Operations (FC 05, 06, 15, 16, 22, 23)
    // =========================================================================

    /// Writes a single coil (FC 05).
    async fn write_single_coil(&mut self, address: u16, value: bool) -> ClientResult<()>;

    /// Writes a single holding register (FC 06).
    async fn write_single_register(&mut self, address: u16, value: u16) -> ClientResult<()>;

    /// Writes multiple coils (FC 15).
    async fn write_multiple_coils(&mut self, address: u16, values: &[bool]) -> ClientResult<()>;

    /// Writes multiple holding registers (FC 16).
    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> ClientResult<()>;

    /// Applies an AND/OR mask to a holding register (FC 22).
    async fn masked_write_register(
        &mut self,
        address: u16,
        and_mask: u16,
        or_mask: u16,
    ) -> ClientResult<()>;

    /// Reads and writes multiple registers in one transaction (FC 23).
    async fn read_write_multiple_registers(
        &mut self,
        read_address: u16,
        read_count: u16,
        write_address: u16,
        write_values: &[u16],
    ) -> ClientResult<Vec<u16>>;

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Returns the slave/unit identifier.
    fn unit_id(&self) -> u8;

    /// Returns a display name for this transport.
    fn display_name(&self) -> String;
}
