//! Supervised adapter-session worker.
//!
//! One background thread per session performs the blocking socket I/O
//! against the adapter process. Unlike a detached thread, the worker's
//! lifetime is tied to session stop through a cooperative shutdown signal.

use crate::session::endpoint::ControlEndpoints;
use anyhow::{bail, Context};
use log::warn;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Handshake probe sent by the lifecycle manager on the request channel.
pub const HANDSHAKE_PROBE: &[u8; 3] = b"REQ";
/// Acknowledgment sent back by the worker once it is ready.
pub const HANDSHAKE_ACK: &[u8; 3] = b"ACK";

pub(crate) const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives the wire-level adapter session. Opaque to the bridge: it owns the
/// DAP socket protocol to the adapter process and whatever it multiplexes
/// over the control channels.
///
/// The lifecycle manager keeps its ends of both control channels open for
/// the whole session but sends nothing on them after the startup
/// handshake; `header` and `request` are the driver's to use (or ignore)
/// until shutdown.
///
/// Implementations must poll `shutdown` and return promptly once it is
/// raised; `stop` joins the worker thread.
pub trait SessionDriver: Send + 'static {
    fn run(
        &mut self,
        adapter: SocketAddr,
        header: UnixStream,
        request: UnixStream,
        shutdown: &ShutdownSignal,
    ) -> anyhow::Result<()>;
}

/// Cooperative shutdown flag shared with the worker thread.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Background worker owning the adapter session for the lifetime of one
/// debug session.
pub struct AdapterWorker {
    handle: JoinHandle<()>,
    shutdown: ShutdownSignal,
}

impl AdapterWorker {
    /// Spawn the worker. It connects both control channels, acknowledges
    /// the lifecycle handshake on the request channel, then hands the
    /// session to the driver.
    pub fn spawn(
        mut driver: Box<dyn SessionDriver>,
        adapter: SocketAddr,
        endpoints: ControlEndpoints,
    ) -> std::io::Result<Self> {
        let shutdown = ShutdownSignal::default();
        let thread_shutdown = shutdown.clone();
        let handle = std::thread::Builder::new()
            .name("dapbridge-adapter-worker".to_string())
            .spawn(move || {
                if let Err(err) =
                    worker_main(driver.as_mut(), adapter, &endpoints, &thread_shutdown)
                {
                    warn!(target: "dapbridge", "adapter worker exited with error: {err:#}");
                }
            })?;
        Ok(Self { handle, shutdown })
    }

    /// Signal shutdown and join the worker thread.
    pub fn stop(self) {
        self.shutdown.raise();
        if self.handle.join().is_err() {
            warn!(target: "dapbridge", "adapter worker panicked");
        }
    }
}

fn worker_main(
    driver: &mut dyn SessionDriver,
    adapter: SocketAddr,
    endpoints: &ControlEndpoints,
    shutdown: &ShutdownSignal,
) -> anyhow::Result<()> {
    let mut request = UnixStream::connect(&endpoints.request)
        .with_context(|| format!("connect request channel {}", endpoints.request.display()))?;
    let header = UnixStream::connect(&endpoints.header)
        .with_context(|| format!("connect header channel {}", endpoints.header.display()))?;
    request.set_read_timeout(Some(CONTROL_TIMEOUT))?;
    request.set_write_timeout(Some(CONTROL_TIMEOUT))?;

    let mut probe = [0u8; HANDSHAKE_PROBE.len()];
    request.read_exact(&mut probe)?;
    if &probe != HANDSHAKE_PROBE {
        bail!("unexpected handshake probe: {probe:?}");
    }
    request.write_all(HANDSHAKE_ACK)?;

    driver.run(adapter, header, request, shutdown)
}
