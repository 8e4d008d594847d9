//! Configuration values for the harness
//!
//! Remote/local selection and the dev server invocation are explicit values
//! handed to the harness, never ambient process-wide state.

use std::time::Duration;

/// How long a freshly spawned dev server may take to report readiness.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(90);

/// How long a quit-signalled dev server may take to exit on its own before
/// the harness escalates to a forced kill.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

/// Top-level harness configuration: which class of server backs the tests.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Use a pre-existing remotely hosted webapp instead of spawning a
    /// local dev server.
    pub use_remote: bool,

    /// Host of the remotely hosted webapp (only read when `use_remote`).
    pub remote_host: String,

    /// Configuration for the locally spawned dev server.
    pub dev_server: DevServerConfig,
}

impl HarnessConfig {
    /// Configuration backed by a locally spawned dev server
    pub fn local(dev_server: DevServerConfig) -> Self {
        Self {
            use_remote: false,
            remote_host: String::new(),
            dev_server,
        }
    }

    /// Configuration backed by a remotely hosted webapp
    pub fn remote(host: impl Into<String>) -> Self {
        Self {
            use_remote: true,
            remote_host: host.into(),
            dev_server: DevServerConfig::default(),
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::local(DevServerConfig::default())
    }
}

/// Configuration for one supervised dev server instance
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Host name the dev server binds its listeners on
    pub host: String,

    /// Program and leading arguments used to launch the dev server; the
    /// harness appends the port and state flags itself.
    pub command: Vec<String>,

    /// Deadline for `await_ready`
    pub startup_timeout: Duration,

    /// Grace period between a delivered quit request and a forced kill
    pub shutdown_grace: Duration,
}

impl DevServerConfig {
    /// Configure the launch command (fluent API)
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    /// Configure the bind host (fluent API)
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Configure the startup deadline (fluent API)
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Configure the shutdown grace period (fluent API)
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            // Launch the workspace devserver binary through cargo so tests
            // always run the current tree; production callers point this at
            // the installed dev server executable instead.
            command: vec![
                "cargo".to_string(),
                "run".to_string(),
                "-p".to_string(),
                "devserver".to_string(),
                "--".to_string(),
            ],
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}
