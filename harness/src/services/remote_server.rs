//! Handle for a remotely hosted webapp instance
//!
//! A remote instance's lifecycle is not owned by the harness; this handle
//! only formats URLs and treats close as a no-op.

use crate::error::HarnessResult;
use crate::services::join_url;
use crate::traits::AppServer;

/// Stateless handle onto a deployed webapp instance
#[derive(Debug, Clone)]
pub struct RemoteAppServer {
    host: String,
}

impl RemoteAppServer {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

#[async_trait::async_trait]
impl AppServer for RemoteAppServer {
    fn webapp_url(&self, path: &str) -> String {
        // Deployed instances are always behind HTTPS.
        join_url(&format!("https://{}", self.host), path)
    }

    async fn close(&mut self) -> HarnessResult<()> {
        tracing::debug!("remote server handle closed; nothing to tear down");
        Ok(())
    }
}
