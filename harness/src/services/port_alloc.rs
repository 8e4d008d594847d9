//! Free-port allocation for dev server instances
//!
//! Ports are obtained by binding an OS-assigned ephemeral port and
//! releasing it immediately; the actual bind is deferred to the child
//! process, so an allocation is only a best-effort reservation. A
//! process-wide registry of claimed ports keeps concurrently constructed
//! instances from receiving the same value.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::net::TcpListener;
use std::sync::{Mutex, OnceLock};

use crate::error::{HarnessError, HarnessResult};

const MAX_ALLOCATION_ATTEMPTS: usize = 16;

static CLAIMED_PORTS: OnceLock<Mutex<HashSet<u16>>> = OnceLock::new();

/// Returns a port that is currently unbound on the local host and has not
/// been handed out by this process before.
pub fn allocate_port() -> HarnessResult<u16> {
    let claimed = CLAIMED_PORTS.get_or_init(|| Mutex::new(HashSet::new()));

    for _ in 0..MAX_ALLOCATION_ATTEMPTS {
        let listener = TcpListener::bind("127.0.0.1:0")
            .map_err(|source| HarnessError::PortAllocation { source })?;
        let port = listener
            .local_addr()
            .map_err(|source| HarnessError::PortAllocation { source })?
            .port();
        drop(listener);

        let mut claimed = claimed.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if claimed.insert(port) {
            return Ok(port);
        }
        // The OS handed back a port we already gave out; try again.
    }

    Err(HarnessError::PortAllocation {
        source: std::io::Error::new(
            ErrorKind::AddrInUse,
            "no unclaimed ephemeral port after repeated attempts",
        ),
    })
}
