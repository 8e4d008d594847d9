//! Concrete service implementations backing the harness

pub mod dev_server;
pub mod log_scanner;
pub mod port_alloc;
pub mod remote_api;
pub mod remote_server;

pub use dev_server::DevServerInstance;
pub use remote_api::RemoteApiContext;
pub use remote_server::RemoteAppServer;

/// Joins a base URL and a path with exactly one separating slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
