//! Harness-specific error types

use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("failed to spawn dev server process: {source}")]
    SpawnFailed { source: std::io::Error },

    #[error("dev server did not become ready within {timeout:?}")]
    StartupTimeout { timeout: Duration },

    #[error("unable to discover the webapp URL from dev server output")]
    AddressDiscovery,

    #[error("failed to parse URL {url:?} from dev server output: {source}")]
    UrlParse {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unable to deliver quit request to the admin server: {reason}")]
    QuitDelivery { reason: String },

    #[error("dev server did not exit within {grace:?} after the quit request")]
    ShutdownTimeout { grace: Duration },

    #[error("dev server exited with {status}")]
    ProcessExit { status: ExitStatus },

    #[error("failed to allocate a local port: {source}")]
    PortAllocation { source: std::io::Error },

    #[error("remote API request failed with status {status}")]
    RemoteApiStatus { status: reqwest::StatusCode },

    #[error("configuration error: {field}")]
    Configuration { field: String },

    #[error("operation not valid in the current instance state: {operation}")]
    InvalidState { operation: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
