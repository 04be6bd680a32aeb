//! Session endpoints: adapter port allocation, control socket paths and
//! temp directories.

use crate::error::Error;
use std::net::TcpListener;
use std::path::PathBuf;

pub const ADAPTER_HOST: &str = "127.0.0.1";

/// Bounded scan range for the adapter's listen port.
pub const PORT_RANGE: (u16, u16) = (5678, 5900);

/// First free TCP port on loopback within [`PORT_RANGE`]. Exhaustion is
/// fatal to session start; there is no fallback range.
pub fn find_free_port() -> Result<u16, Error> {
    let (start, end) = PORT_RANGE;
    for port in start..end {
        if TcpListener::bind((ADAPTER_HOST, port)).is_ok() {
            return Ok(port);
        }
    }
    Err(Error::PortExhausted(start, end))
}

/// Per-process directory receiving adapter log files. Deterministic name,
/// idempotent creation: session restarts within one process reuse it.
pub fn debug_log_directory() -> PathBuf {
    std::env::temp_dir().join(format!("dapbridge_debug_logs_{}", std::process::id()))
}

/// Local control socket endpoints supervising the adapter worker, derived
/// from the session identity.
#[derive(Debug, Clone)]
pub struct ControlEndpoints {
    pub header: PathBuf,
    pub request: PathBuf,
}

impl ControlEndpoints {
    pub fn for_session(session_id: &str) -> Self {
        let dir = std::env::temp_dir();
        Self {
            header: dir.join(format!("dapbridge_{session_id}_header.sock")),
            request: dir.join(format!("dapbridge_{session_id}_request.sock")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_free_port_is_in_range() {
        let port = find_free_port().unwrap();
        assert!(port >= PORT_RANGE.0 && port < PORT_RANGE.1);
        // the listener used for probing is dropped, the port is bindable
        TcpListener::bind((ADAPTER_HOST, port)).unwrap();
    }

    #[test]
    fn test_endpoints_are_per_session() {
        let a = ControlEndpoints::for_session("a");
        let b = ControlEndpoints::for_session("b");
        assert_ne!(a.header, b.header);
        assert_ne!(a.request, b.request);
        assert_ne!(a.header, a.request);
    }
}
