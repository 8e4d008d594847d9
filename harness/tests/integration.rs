//! End-to-end tests for the dev server harness
//!
//! These spawn real child processes: the workspace devserver binary for the
//! happy paths, and shell one-liners standing in for servers that crash,
//! hang, or refuse to die.

use std::time::Duration;

use harness::{
    new_app_server, AppServer, DevServerConfig, DevServerInstance, HarnessConfig, HarnessError,
};

mod common;
use common::devserver_config;

/// Full local lifecycle: spawn, discover, serve, seed, graceful close
#[tokio::test]
async fn test_full_local_lifecycle() {
    // Arrange
    let mut instance =
        DevServerInstance::new(devserver_config(&[])).expect("instance construction");

    // Act
    instance
        .await_ready()
        .await
        .expect("dev server should become ready");

    // Assert: both endpoints were discovered and are well-formed
    let base_url = instance.base_url().expect("base url discovered").clone();
    assert_eq!(base_url.scheme(), "http");
    assert_eq!(base_url.port(), Some(instance.port()));
    let admin_url = instance.admin_url().expect("admin url discovered").clone();
    assert_eq!(admin_url.scheme(), "http");

    // The webapp answers through the composed URL.
    let body = reqwest::get(instance.webapp_url("/"))
        .await
        .expect("webapp request")
        .text()
        .await
        .expect("webapp body");
    assert!(body.contains("dev server"), "unexpected body: {body}");

    // The remote context reaches the internal API.
    let context = instance.remote_context().expect("remote context");
    let probe = context
        .get("/_ah/remote_api")
        .await
        .expect("remote api probe")
        .text()
        .await
        .expect("probe body");
    assert!(probe.contains("remote_api"), "unexpected probe: {probe}");

    // Seed state through the privileged bridge, observe it on the webapp.
    context
        .post_json(
            "/_ah/remote_api",
            &serde_json::json!({ "key": "run", "value": "r1" }),
        )
        .await
        .expect("seeding through the remote api");
    let body = reqwest::get(instance.webapp_url("/"))
        .await
        .expect("webapp request after seeding")
        .text()
        .await
        .expect("webapp body after seeding");
    assert!(body.contains("1 seeded"), "unexpected body: {body}");

    // Graceful close reaps the child.
    let pid = instance.pid().expect("child pid");
    instance.close().await.expect("graceful close");
    #[cfg(unix)]
    assert!(
        !common::process_alive(pid),
        "child must be gone after close"
    );
}

/// The selection layer hands back a ready-to-use local server
#[tokio::test]
async fn test_selection_layer_returns_running_local_server() {
    let config = HarnessConfig::local(devserver_config(&[]));

    let mut server = new_app_server(config).await.expect("local app server");

    let url = server.webapp_url("/");
    assert!(url.starts_with("http://localhost:"), "unexpected url: {url}");
    let body = reqwest::get(url)
        .await
        .expect("webapp request")
        .text()
        .await
        .expect("webapp body");
    assert!(body.contains("dev server"), "unexpected body: {body}");

    server.close().await.expect("close through the handle");
}

/// The selection layer hands back a secure URL formatter for remote mode
#[tokio::test]
async fn test_selection_layer_returns_remote_formatter() {
    let mut server = new_app_server(HarnessConfig::remote("staging.example.com"))
        .await
        .expect("remote app server");

    assert_eq!(
        server.webapp_url("/results"),
        "https://staging.example.com/results"
    );
    server.close().await.expect("remote close is a no-op");
}

/// A server that exits before announcing the module URL is a discovery
/// failure, not a timeout
#[cfg(unix)]
#[tokio::test]
async fn test_discovery_failure_when_stream_closes_early() {
    let script = "echo 'Starting admin server at: http://localhost:9999' >&2; exit 0";
    let mut instance =
        DevServerInstance::new(common::script_config(script)).expect("instance construction");

    let err = instance
        .await_ready()
        .await
        .expect_err("readiness must fail");

    assert!(
        matches!(err, HarnessError::AddressDiscovery),
        "expected discovery failure, got: {err:?}"
    );
}

/// A server that never becomes ready is killed when the deadline elapses
#[cfg(unix)]
#[tokio::test]
async fn test_startup_timeout_kills_the_child() {
    let config =
        common::script_config("sleep 300").with_startup_timeout(Duration::from_secs(2));
    let mut instance = DevServerInstance::new(config).expect("instance construction");

    let err = instance
        .await_ready()
        .await
        .expect_err("readiness must time out");

    assert!(
        matches!(err, HarnessError::StartupTimeout { .. }),
        "expected startup timeout, got: {err:?}"
    );
    let pid = instance.pid().expect("child pid");
    assert!(
        !common::process_alive(pid),
        "child must be killed on timeout"
    );
}

/// An undeliverable quit request escalates straight to a forced kill
#[cfg(unix)]
#[tokio::test]
async fn test_close_kills_the_child_when_quit_cannot_be_delivered() {
    // Announces an admin server where nothing listens, then hangs.
    let script = r#"printf 'Starting admin server at: http://localhost:9/\nStarting module "default" running at: http://localhost:8099/\ndefault: "GET /_ah/warmup HTTP/1.1" 200\n' >&2; sleep 300"#;
    let mut instance =
        DevServerInstance::new(common::script_config(script)).expect("instance construction");
    instance
        .await_ready()
        .await
        .expect("fake server reports ready");
    let pid = instance.pid().expect("child pid");

    let err = instance
        .close()
        .await
        .expect_err("quit delivery must fail");

    assert!(
        matches!(err, HarnessError::QuitDelivery { .. }),
        "expected delivery failure, got: {err:?}"
    );
    assert!(
        !common::process_alive(pid),
        "child must be killed when quit cannot be delivered"
    );
}

/// A server that acknowledges quit but never exits is killed once the
/// grace period expires
#[tokio::test]
async fn test_close_escalates_when_grace_period_expires() {
    let config = devserver_config(&["--ignore-quit", "--max-lifetime-secs", "60"])
        .with_shutdown_grace(Duration::from_secs(2));
    let mut instance = DevServerInstance::new(config).expect("instance construction");
    instance.await_ready().await.expect("dev server ready");
    let pid = instance.pid().expect("child pid");

    let err = instance
        .close()
        .await
        .expect_err("close must hit the grace period");

    assert!(
        matches!(err, HarnessError::ShutdownTimeout { .. }),
        "expected shutdown timeout, got: {err:?}"
    );
    #[cfg(unix)]
    assert!(
        !common::process_alive(pid),
        "child must be killed after the grace period"
    );
}

/// Back-to-back instances never share a port pair
#[tokio::test]
async fn test_instances_never_share_ports() {
    let first = DevServerInstance::new(DevServerConfig::default()).expect("first instance");
    let second = DevServerInstance::new(DevServerConfig::default()).expect("second instance");

    let ports = [
        first.port(),
        first.api_port(),
        second.port(),
        second.api_port(),
    ];
    let unique: std::collections::HashSet<_> = ports.iter().collect();
    assert_eq!(unique.len(), ports.len(), "ports must be distinct: {ports:?}");
}
