use crate::common::EchoServerTrait;
use crate::http::{HttpConfig, HttpEchoServer};
use crate::{EchoError, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Starts an echo server on an ephemeral loopback port for integration tests
///
/// The listener is bound before the server task is spawned, so clients may
/// connect as soon as this returns. The configured `bind_addr` is ignored.
/// Send on the returned channel to stop the server.
pub async fn spawn_test_server(
    config: HttpConfig,
) -> Result<(JoinHandle<Result<()>>, SocketAddr, broadcast::Sender<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| EchoError::Config(format!("Failed to bind listener: {e}")))?;
    let addr = listener
        .local_addr()
        .map_err(|e| EchoError::Config(format!("Failed to get local address: {e}")))?;

    let server = HttpEchoServer::new(config);
    let shutdown = server.shutdown_signal();
    let server_handle = tokio::spawn(async move { server.serve(listener).await });

    Ok((server_handle, addr, shutdown))
}
