// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the Modbus slave client.
//!
//! The taxonomy is deliberately small. This crate selects a transport and
//! manages its lifecycle; everything the protocol engine reports during an
//! operation is passed through with a short operation prefix and never
//! reinterpreted.
//!
//! ```text
//! ClientError
//! ├── UnsupportedMode - configuration named an unknown transport mode
//! ├── ConnectFailed   - the transport could not be opened
//! ├── CloseFailed     - the transport could not be cleanly closed
//! ├── NotConnected    - operation attempted with no binding
//! ├── Timeout         - the per-request bound elapsed
//! ├── Protocol        - engine transport/framing fault (pass-through)
//! ├── Exception       - slave exception response (pass-through)
//! └── InvalidConfig   - a configuration value failed validation
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use fieldlink_modbus::error::ClientError;
//!
//! fn handle(error: ClientError) {
//!     if error.is_retryable() {
//!         println!("transient: {error}");
//!     }
//! }
//! ```

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio_modbus::ExceptionCode;

/// Convenience alias for results produced by this crate.
pub type ClientResult<T> = Result<T, ClientError>;

/// Boxed source for errors whose underlying cause varies by transport.
type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

// =============================================================================
// ClientError
// =============================================================================

/// The error type for slave client construction, lifecycle and operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration named a transport mode other than `tcp`/`rtu`.
    ///
    /// Fatal to construction; no handler is produced.
    #[error("unsupported transport mode '{mode}'")]
    UnsupportedMode {
        /// The rejected mode string.
        mode: String,
    },

    /// The transport could not be opened.
    ///
    /// Recoverable: the caller may retry `connect`.
    #[error("failed to connect to {target}")]
    ConnectFailed {
        /// Dial target (host:port) or serial device path.
        target: String,
        /// Underlying dial/open failure.
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    /// The transport could not be cleanly closed.
    ///
    /// Non-fatal, but indicates a possible resource leak.
    #[error("failed to close connection to {target}")]
    CloseFailed {
        /// Dial target (host:port) or serial device path.
        target: String,
        /// Underlying disconnect failure.
        #[source]
        source: io::Error,
    },

    /// A protocol operation was attempted while no connection is bound.
    #[error("not connected")]
    NotConnected,

    /// A request did not complete within the configured timeout.
    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        /// Name of the operation that timed out.
        operation: &'static str,
        /// The configured per-request bound.
        limit: Duration,
    },

    /// The protocol engine reported a transport or framing fault.
    #[error("{operation} failed")]
    Protocol {
        /// Name of the failing operation.
        operation: &'static str,
        /// The engine error, untranslated.
        #[source]
        source: tokio_modbus::Error,
    },

    /// The slave answered with a Modbus exception response.
    #[error("{operation} rejected by slave: {code:?}")]
    Exception {
        /// Name of the rejected operation.
        operation: &'static str,
        /// The exception code reported by the slave, untranslated.
        code: ExceptionCode,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration: {field}: {reason}")]
    InvalidConfig {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ClientError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates an unsupported-mode error.
    pub fn unsupported_mode(mode: impl Into<String>) -> Self {
        Self::UnsupportedMode { mode: mode.into() }
    }

    /// Creates a connect-failed error wrapping the underlying cause.
    pub(crate) fn connect_failed(
        target: impl Into<String>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::ConnectFailed {
            target: target.into(),
            source: source.into(),
        }
    }

    /// Creates a close-failed error wrapping the underlying cause.
    pub(crate) fn close_failed(target: impl Into<String>, source: io::Error) -> Self {
        Self::CloseFailed {
            target: target.into(),
            source,
        }
    }

    /// Creates a per-request timeout error.
    pub(crate) fn timeout(operation: &'static str, limit: Duration) -> Self {
        Self::Timeout { operation, limit }
    }

    /// Wraps an engine fault with the failing operation's name.
    pub(crate) fn protocol(operation: &'static str, source: tokio_modbus::Error) -> Self {
        Self::Protocol { operation, source }
    }

    /// Wraps a slave exception response with the rejected operation's name.
    pub(crate) fn exception(operation: &'static str, code: ExceptionCode) -> Self {
        Self::Exception { operation, code }
    }

    /// Creates a configuration validation error.
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if a subsequent attempt may succeed without a
    /// configuration change.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectFailed { .. } | Self::NotConnected | Self::Timeout { .. } => true,
            Self::Protocol { source, .. } => matches!(source, tokio_modbus::Error::Transport(_)),
            Self::Exception { code, .. } => matches!(
                code,
                ExceptionCode::ServerDeviceBusy | ExceptionCode::Acknowledge
            ),
            Self::UnsupportedMode { .. }
            | Self::CloseFailed { .. }
            | Self::InvalidConfig { .. } => false,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnsupportedMode { .. } | Self::InvalidConfig { .. } => "configuration",
            Self::ConnectFailed { .. } | Self::CloseFailed { .. } | Self::NotConnected => {
                "connection"
            }
            Self::Timeout { .. } => "timeout",
            Self::Protocol { .. } | Self::Exception { .. } => "protocol",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_mode_display() {
        let error = ClientError::unsupported_mode("ascii");
        assert_eq!(error.to_string(), "unsupported transport mode 'ascii'");
        assert!(!error.is_retryable());
        assert_eq!(error.category(), "configuration");
    }

    #[test]
    fn test_connect_failed_carries_source() {
        let cause = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let error = ClientError::connect_failed("10.0.0.5:502", cause);
        assert_eq!(error.to_string(), "failed to connect to 10.0.0.5:502");
        assert!(error.source().is_some());
        assert!(error.is_retryable());
    }

    #[test]
    fn test_close_failed_is_not_retryable() {
        let cause = io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe");
        let error = ClientError::close_failed("/dev/ttyUSB0", cause);
        assert!(!error.is_retryable());
        assert_eq!(error.category(), "connection");
    }

    #[test]
    fn test_timeout_display() {
        let error = ClientError::timeout("read_coils", Duration::from_secs(1));
        assert_eq!(error.to_string(), "read_coils timed out after 1s");
        assert!(error.is_retryable());
        assert_eq!(error.category(), "timeout");
    }

    #[test]
    fn test_exception_passes_code_through() {
        let error = ClientError::exception("write_single_coil", ExceptionCode::IllegalDataAddress);
        assert!(!error.is_retryable());
        assert_eq!(error.category(), "protocol");

        let busy = ClientError::exception("read_coils", ExceptionCode::ServerDeviceBusy);
        assert!(busy.is_retryable());
    }

    #[test]
    fn test_not_connected() {
        let error = ClientError::NotConnected;
        assert_eq!(error.to_string(), "not connected");
        assert!(error.is_retryable());
    }
}
