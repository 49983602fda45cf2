// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Lifecycle integration tests against a local TCP listener.
//!
//! These tests exercise the connect/close cycle and the unbound-binding
//! guarantees without a Modbus server on the far end: opening the transport
//! only needs a socket that accepts.

use std::time::Duration;

use tokio::net::TcpListener;

use fieldlink_modbus::{ClientError, SlaveClient, SlaveConfig};

/// Binds a listener on an ephemeral port and keeps accepting connections so
/// that dials succeed for the duration of a test.
async fn spawn_listener() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("tcp://{}", addr)
}

/// Binds and immediately drops a listener, yielding an address that refuses
/// connections.
async fn refused_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("tcp://{}", addr)
}

fn config(address: String) -> SlaveConfig {
    SlaveConfig::tcp(address)
        .with_id(1)
        .with_timeout(Duration::from_secs(1))
}

#[tokio::test]
async fn connect_close_cycle_is_repeatable() {
    let address = spawn_listener().await;
    let mut client = SlaveClient::new(config(address)).unwrap();

    assert!(!client.is_connected());

    client.connect().await.unwrap();
    assert!(client.is_connected());

    client.close().await.unwrap();
    assert!(!client.is_connected());

    // A closed handle can be connected again.
    client.connect().await.unwrap();
    assert!(client.is_connected());

    client.close().await.unwrap();
}

#[tokio::test]
async fn repeated_connect_rebinds() {
    let address = spawn_listener().await;
    let mut client = SlaveClient::new(config(address)).unwrap();

    client.connect().await.unwrap();
    // Second connect on an open handle re-dials and rebinds.
    client.connect().await.unwrap();
    assert!(client.is_connected());

    client.close().await.unwrap();
}

#[tokio::test]
async fn connect_failure_leaves_binding_unbound() {
    let address = refused_address().await;
    let mut client = SlaveClient::new(config(address)).unwrap();

    let error = client.connect().await.unwrap_err();
    assert!(matches!(error, ClientError::ConnectFailed { .. }));
    assert!(error.is_retryable());
    assert!(!client.is_connected());

    // Protocol operations stay inert until a connect succeeds.
    let error = client.read_coils(0, 1).await.unwrap_err();
    assert!(matches!(error, ClientError::NotConnected));
}

#[tokio::test]
async fn operations_require_connect() {
    let address = refused_address().await;
    let mut client = SlaveClient::new(config(address)).unwrap();

    assert!(matches!(
        client.read_holding_registers(0, 10).await,
        Err(ClientError::NotConnected)
    ));
    assert!(matches!(
        client.write_single_register(0, 42).await,
        Err(ClientError::NotConnected)
    ));
}

#[tokio::test]
async fn close_before_connect_is_a_noop() {
    let address = refused_address().await;
    let mut client = SlaveClient::new(config(address)).unwrap();

    client.close().await.unwrap();
    assert!(!client.is_connected());
}

#[tokio::test]
async fn short_tcp_address_fails_at_connect_not_construction() {
    // Construction performs no validation; the malformed address surfaces
    // as a connect failure.
    let mut client = SlaveClient::new(config("tcp".to_string())).unwrap();

    let error = client.connect().await.unwrap_err();
    assert!(matches!(error, ClientError::ConnectFailed { .. }));
}
