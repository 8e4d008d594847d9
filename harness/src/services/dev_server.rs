//! Dev server instance supervision
//!
//! Owns the child process lifecycle end to end: spawn the dev server with
//! freshly allocated ports, discover its endpoints from the diagnostic
//! stream, block callers until readiness or a deadline, and tear the
//! process down gracefully before escalating to a forced kill. Exactly one
//! child process per instance; no restart policy.

use std::process::Stdio;

use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use url::Url;

use crate::config::DevServerConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::services::join_url;
use crate::services::log_scanner::{ScanOutcome, StartupLogMatcher};
use crate::services::port_alloc;
use crate::services::remote_api::RemoteApiContext;
use crate::traits::{AppServer, DevAppServer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceState {
    Created,
    Starting,
    Ready,
    Failed,
    Closing,
    Closed,
}

/// One supervised dev server child process
pub struct DevServerInstance {
    config: DevServerConfig,
    port: u16,
    api_port: u16,
    state: InstanceState,
    child: Option<Child>,
    pid: Option<u32>,
    scan: Option<oneshot::Receiver<HarnessResult<ScanOutcome>>>,
    base_url: Option<Url>,
    admin_url: Option<Url>,
    http: reqwest::Client,
}

impl DevServerInstance {
    /// Allocates ports for a new instance without starting it yet
    pub fn new(config: DevServerConfig) -> HarnessResult<Self> {
        let port = port_alloc::allocate_port()?;
        let api_port = port_alloc::allocate_port()?;
        // Bounding the quit request by the grace period keeps close()
        // finite even when the admin server accepts but never answers.
        let http = reqwest::Client::builder()
            .timeout(config.shutdown_grace)
            .build()?;

        Ok(Self {
            config,
            port,
            api_port,
            state: InstanceState::Created,
            child: None,
            pid: None,
            scan: None,
            base_url: None,
            admin_url: None,
            http,
        })
    }

    /// Starts the dev server child process and the background scan of its
    /// diagnostic stream.
    pub fn spawn(&mut self) -> HarnessResult<()> {
        if self.state != InstanceState::Created {
            return Err(HarnessError::InvalidState { operation: "spawn" });
        }
        let (program, leading_args) =
            self.config
                .command
                .split_first()
                .ok_or_else(|| HarnessError::Configuration {
                    field: "dev server command must not be empty".to_string(),
                })?;

        let mut command = Command::new(program);
        command
            .args(leading_args)
            .arg(format!("--port={}", self.port))
            .arg(format!("--api-port={}", self.api_port))
            // The admin server picks its own port; its address is
            // discovered from the diagnostic stream instead.
            .arg("--admin-port=0")
            .arg("--automatic-restart=false")
            .arg("--skip-update-check=true")
            .arg("--clear-state=true")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|source| HarnessError::SpawnFailed { source })?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| HarnessError::Configuration {
                field: "dev server stderr was not piped".to_string(),
            })?;

        let (outcome_tx, outcome_rx) = oneshot::channel();
        tokio::spawn(async move {
            let matcher = StartupLogMatcher::new();
            let outcome = matcher.scan(BufReader::new(stderr)).await;
            let _ = outcome_tx.send(outcome);
        });

        self.pid = child.id();
        tracing::info!(
            "🚀 Spawned dev server (pid {:?}) with webapp port {} and API port {}",
            self.pid,
            self.port,
            self.api_port
        );
        self.child = Some(child);
        self.scan = Some(outcome_rx);
        self.state = InstanceState::Starting;
        Ok(())
    }

    /// Blocks until the diagnostic scan completes or the startup deadline
    /// elapses; on timeout the child is killed before returning.
    pub async fn await_ready(&mut self) -> HarnessResult<()> {
        if self.state == InstanceState::Created {
            self.spawn()?;
        }
        if self.state != InstanceState::Starting {
            return Err(HarnessError::InvalidState {
                operation: "await_ready",
            });
        }
        let scan = self.scan.take().ok_or(HarnessError::InvalidState {
            operation: "await_ready",
        })?;

        let timeout = self.config.startup_timeout;
        let outcome = match tokio::time::timeout(timeout, scan).await {
            Err(_elapsed) => {
                tracing::warn!("⏰ Dev server not ready within {:?}, force killing", timeout);
                self.force_kill().await;
                self.state = InstanceState::Failed;
                return Err(HarnessError::StartupTimeout { timeout });
            }
            // The scan task went away without reporting; treat it like a
            // closed stream with nothing captured.
            Ok(Err(_closed)) => {
                self.state = InstanceState::Failed;
                return Err(HarnessError::AddressDiscovery);
            }
            Ok(Ok(Err(scan_error))) => {
                self.state = InstanceState::Failed;
                return Err(scan_error);
            }
            Ok(Ok(Ok(outcome))) => outcome,
        };

        self.admin_url = outcome.admin_url;
        match outcome.base_url {
            Some(base_url) => {
                tracing::info!(
                    "✅ Dev server ready at {} (admin: {:?}, warmup seen: {})",
                    base_url,
                    self.admin_url.as_ref().map(Url::as_str),
                    outcome.saw_ready
                );
                self.base_url = Some(base_url);
                self.state = InstanceState::Ready;
                Ok(())
            }
            None => {
                self.state = InstanceState::Failed;
                Err(HarnessError::AddressDiscovery)
            }
        }
    }

    /// Tears the instance down: one quit request to the admin server, a
    /// bounded wait for natural exit, then a forced kill if needed.
    ///
    /// Whatever path is taken, no child process remains once this returns.
    pub async fn close(&mut self) -> HarnessResult<()> {
        let Some(mut child) = self.child.take() else {
            // Never spawned, or already torn down.
            return Ok(());
        };
        self.state = InstanceState::Closing;

        let quit_url = match self
            .admin_url
            .as_ref()
            .and_then(|admin| admin.join("quit").ok())
        {
            Some(url) => url,
            None => {
                reap(&mut child).await;
                self.state = InstanceState::Closed;
                return Err(HarnessError::QuitDelivery {
                    reason: "admin server address was never discovered".to_string(),
                });
            }
        };

        tracing::info!("🛑 Requesting graceful shutdown via {quit_url}");
        if let Err(delivery_error) = self.http.get(quit_url).send().await {
            tracing::warn!("🔨 Quit request failed, force killing dev server");
            reap(&mut child).await;
            self.state = InstanceState::Closed;
            return Err(HarnessError::QuitDelivery {
                reason: delivery_error.to_string(),
            });
        }

        let grace = self.config.shutdown_grace;
        let result = match tokio::time::timeout(grace, child.wait()).await {
            Err(_elapsed) => {
                tracing::warn!("🔨 Dev server still running after {:?}, force killing", grace);
                reap(&mut child).await;
                Err(HarnessError::ShutdownTimeout { grace })
            }
            Ok(Ok(status)) if status.success() => {
                tracing::info!("✅ Dev server exited cleanly");
                Ok(())
            }
            Ok(Ok(status)) => Err(HarnessError::ProcessExit { status }),
            Ok(Err(wait_error)) => Err(HarnessError::Io(wait_error)),
        };
        self.state = InstanceState::Closed;
        result
    }

    /// Builds a request-scoped handle onto the internal remote API.
    pub fn remote_context(&self) -> HarnessResult<RemoteApiContext> {
        if self.state != InstanceState::Ready {
            return Err(HarnessError::InvalidState {
                operation: "remote_context",
            });
        }
        RemoteApiContext::new(&self.config.host, self.api_port)
    }

    /// Process id of the spawned child, if it was ever started
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Port allocated for the webapp module
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Port allocated for the internal remote API server
    pub fn api_port(&self) -> u16 {
        self.api_port
    }

    /// Webapp URL discovered from the diagnostic stream
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Admin server URL discovered from the diagnostic stream
    pub fn admin_url(&self) -> Option<&Url> {
        self.admin_url.as_ref()
    }

    async fn force_kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            reap(&mut child).await;
        }
    }
}

/// Kill the child and wait for it to be reaped; races with a process that
/// already exited are fine.
async fn reap(child: &mut Child) {
    if let Err(kill_error) = child.start_kill() {
        tracing::debug!("kill on teardown path: {kill_error}");
    }
    let _ = child.wait().await;
}

#[async_trait::async_trait]
impl AppServer for DevServerInstance {
    fn webapp_url(&self, path: &str) -> String {
        // Local dev servers don't speak HTTPS.
        match &self.base_url {
            Some(base_url) => join_url(base_url.as_str(), path),
            None => join_url(&format!("http://{}:{}", self.config.host, self.port), path),
        }
    }

    async fn close(&mut self) -> HarnessResult<()> {
        DevServerInstance::close(self).await
    }
}

#[async_trait::async_trait]
impl DevAppServer for DevServerInstance {
    async fn await_ready(&mut self) -> HarnessResult<()> {
        DevServerInstance::await_ready(self).await
    }

    fn remote_context(&self) -> HarnessResult<RemoteApiContext> {
        DevServerInstance::remote_context(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_back_to_back_instances_get_distinct_port_pairs() {
        let first = DevServerInstance::new(DevServerConfig::default()).unwrap();
        let second = DevServerInstance::new(DevServerConfig::default()).unwrap();

        let ports: HashSet<u16> = [
            first.port(),
            first.api_port(),
            second.port(),
            second.api_port(),
        ]
        .into_iter()
        .collect();
        assert_eq!(ports.len(), 4, "port pairs must never overlap");
    }

    #[test]
    fn test_webapp_url_composes_without_double_slashes() {
        let mut instance = DevServerInstance::new(DevServerConfig::default()).unwrap();

        // Before discovery the URL falls back to the allocated port.
        let fallback = instance.webapp_url("/dashboard");
        assert_eq!(
            fallback,
            format!("http://localhost:{}/dashboard", instance.port())
        );

        instance.base_url = Some(Url::parse("http://localhost:8080").unwrap());
        assert_eq!(
            instance.webapp_url("/dashboard"),
            "http://localhost:8080/dashboard"
        );
        assert_eq!(
            instance.webapp_url("dashboard"),
            "http://localhost:8080/dashboard"
        );
    }

    #[tokio::test]
    async fn test_close_without_spawn_is_a_no_op() {
        let mut instance = DevServerInstance::new(DevServerConfig::default()).unwrap();
        assert!(instance.close().await.is_ok());
    }

    #[test]
    fn test_remote_context_requires_a_ready_instance() {
        let instance = DevServerInstance::new(DevServerConfig::default()).unwrap();
        let err = instance.remote_context().expect_err("instance is not ready");
        assert!(matches!(err, HarnessError::InvalidState { .. }));
    }
}
