//! A running client wired to a mock transport.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use hubstatus_gateway::{CredentialProvider, GatewayClient, GatewayConfig, GatewayHandle};

use crate::fixtures::test_gateway_config;
use crate::mocks::{MockGateway, MockTransport};

/// A spawned [`GatewayClient`] plus the server side of its transport.
pub struct TestHarness {
    /// Handle to the running client.
    pub handle: GatewayHandle,
    /// Server side of the mock transport.
    pub gateway: MockGateway,
    task: JoinHandle<()>,
}

impl TestHarness {
    /// Spawn a client with [`test_gateway_config`].
    #[must_use]
    pub fn start(credentials: impl CredentialProvider) -> Self {
        Self::start_with(test_gateway_config(), credentials)
    }

    /// Spawn a client with an explicit config.
    #[must_use]
    pub fn start_with(config: GatewayConfig, credentials: impl CredentialProvider) -> Self {
        let (transport, gateway) = MockTransport::pair();
        let (handle, task) =
            GatewayClient::spawn(config, Arc::new(transport), Box::new(credentials));
        Self {
            handle,
            gateway,
            task,
        }
    }

    /// Request `status` by label.
    pub fn request(&self, status: Option<&str>) {
        self.handle.request_presence(status.map(str::to_owned));
    }

    /// Shut the client down and wait for its task to finish.
    ///
    /// # Panics
    ///
    /// Panics if the client task panicked.
    pub async fn stop(self) {
        let _ = self.handle.shutdown();
        if let Err(e) = self.task.await {
            panic!("gateway client task failed: {e}");
        }
    }
}

/// Let every spawned task run until idle.
///
/// Advances the clock by one millisecond, which under a paused clock
/// only fires timers due within that millisecond.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Install a test-writer tracing subscriber honouring `RUST_LOG`.
/// Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
