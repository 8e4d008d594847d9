//! Shared fixtures for harness integration tests

use std::time::Duration;

use harness::DevServerConfig;

/// Generous deadline covering a cold `cargo run` build of the devserver.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(120);

pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

/// Argv launching the workspace devserver binary through cargo, the same
/// way the production config points at the installed dev server.
pub fn devserver_command(extra_args: &[&str]) -> Vec<String> {
    let mut command: Vec<String> = ["cargo", "run", "-p", "devserver", "--"]
        .iter()
        .map(|part| part.to_string())
        .collect();
    command.extend(extra_args.iter().map(|arg| arg.to_string()));
    command
}

pub fn devserver_config(extra_args: &[&str]) -> DevServerConfig {
    DevServerConfig::default()
        .with_command(devserver_command(extra_args))
        .with_startup_timeout(STARTUP_TIMEOUT)
        .with_shutdown_grace(SHUTDOWN_GRACE)
}

/// A stand-in dev server made from a shell one-liner. The port and state
/// flags the harness appends land in the script's positional parameters
/// and are ignored.
#[cfg(unix)]
pub fn script_config(script: &str) -> DevServerConfig {
    DevServerConfig::default().with_command(vec![
        "sh".to_string(),
        "-c".to_string(),
        script.to_string(),
    ])
}

#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    use nix::sys::signal;
    use nix::unistd::Pid;

    signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}
