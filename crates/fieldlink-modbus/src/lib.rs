// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldlink-modbus
//!
//! Unified Modbus TCP/RTU slave client for fieldlink gateways.
//!
//! The crate selects a transport from a [`SlaveConfig`], maps the
//! configuration onto transport-specific handler parameters and presents a
//! single mode-independent [`SlaveClient`] with `connect`/`close` and the
//! standard protocol operations. Frame encoding, checksums, serial line
//! timing and TCP transaction handling belong to the underlying
//! `tokio-modbus` engine (with `tokio-serial` for the RTU serial layer) and
//! are not implemented here.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SlaveClient                              │
//! │            (factory + mode-independent handle)                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Transport trait                             │
//! │          ({connect, close} + protocol operations)               │
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
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use fieldlink_modbus::{SlaveClient, SlaveConfig};
//!
//! let config = SlaveConfig::tcp("tcp://10.0.0.5:502")
//!     .with_id(1)
//!     .with_timeout(Duration::from_secs(1));
//!
//! let mut client = SlaveClient::new(config)?;
//! client.connect().await?;
//!
//! let registers = client.read_holding_registers(100, 2).await?;
//!
//! client.close().await?;
//! ```
//!
//! ## Lifecycle
//!
//! A client moves between exactly two states: unconnected and connected.
//! The protocol binding is absent until `connect` succeeds, is replaced on
//! every successful `connect`, and is dropped by `close`. Operations issued
//! while unconnected fail with [`ClientError::NotConnected`]. No retry,
//! pooling or automatic reconnection happens at this layer; that is the
//! caller's policy.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod client;
pub mod config;
pub mod error;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{Handler, RtuHandler, SlaveClient, TcpHandler, Transport};
pub use config::{DataBits, Mode, Parity, Rs485Config, SlaveConfig, StopBits};
pub use error::{ClientError, ClientResult};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
