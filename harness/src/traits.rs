//! Capability traits for driving an instance of the webapp
//!
//! Test code depends only on these traits; the harness provides exactly two
//! implementers, one wrapping a locally spawned dev server and one
//! formatting URLs for a remotely hosted instance. The mockall annotations
//! let the wider suite substitute servers in unit tests.

use crate::error::HarnessResult;
use crate::services::remote_api::RemoteApiContext;

/// A running instance of the webapp that tests can navigate
#[mockall::automock]
#[async_trait::async_trait]
pub trait AppServer: Send + Sync {
    /// Returns the absolute URL for the given path on the running webapp.
    fn webapp_url(&self, path: &str) -> String;

    /// Releases the server and every resource owned by it.
    ///
    /// For a locally spawned instance this tears down the child process;
    /// for a remotely hosted instance it is a no-op.
    async fn close(&mut self) -> HarnessResult<()>;
}

/// A locally spawned dev server instance under the harness's control
#[async_trait::async_trait]
pub trait DevAppServer: AppServer {
    /// Blocks until the instance reports readiness or the startup deadline
    /// elapses.
    async fn await_ready(&mut self) -> HarnessResult<()>;

    /// Builds a request-scoped handle onto the instance's internal remote
    /// API, usable for privileged operations such as seeding state.
    fn remote_context(&self) -> HarnessResult<RemoteApiContext>;
}
