use crate::Result;
use async_trait::async_trait;

/// Common interface of long-running echo servers
///
/// Implementors bind their configured address in [`run`](Self::run) and stop
/// when a value is sent on the channel returned by
/// [`shutdown_signal`](Self::shutdown_signal).
#[async_trait]
pub trait EchoServerTrait {
    /// Starts the echo server and serves connections until shutdown
    async fn run(&self) -> Result<()>;

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()>;
}
