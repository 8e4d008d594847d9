//! Test harness for supervising an ephemeral dev server instance
//!
//! Integration tests drive the webapp through an [`AppServer`] handle. In
//! local mode the harness spawns the dev server as a child process, waits
//! for it to announce its endpoints and readiness on stderr, and tears it
//! down deterministically when the handle is closed. In remote mode the
//! handle only formats URLs for an already-deployed instance.

pub mod config;
pub mod error;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::{DevServerConfig, HarnessConfig};
pub use error::{HarnessError, HarnessResult};
pub use services::{DevServerInstance, RemoteApiContext, RemoteAppServer};
pub use traits::{AppServer, DevAppServer};

/// Creates an [`AppServer`] handle per the configured mode.
///
/// Remote mode returns immediately with a stateless URL formatter. Local
/// mode spawns a dev server instance and blocks until it is ready to serve
/// test traffic, so a returned handle is always usable.
pub async fn new_app_server(config: HarnessConfig) -> HarnessResult<Box<dyn AppServer>> {
    if config.use_remote {
        tracing::info!("🌐 Using remotely hosted webapp at {}", config.remote_host);
        return Ok(Box::new(RemoteAppServer::new(config.remote_host)));
    }

    let mut instance = DevServerInstance::new(config.dev_server)?;
    instance.await_ready().await?;
    Ok(Box::new(instance))
}
