//! Debug session lifecycle.
//!
//! Start sequencing: provision the per-process log directory, bootstrap the
//! adapter inside the interpreter (once per process), bind the two control
//! sockets, spawn the supervised worker, then block on the one-time
//! handshake barrier before declaring the session running. Stop signals
//! the worker and unbinds both control endpoints so a later start can
//! rebind them; the adapter process itself is left running.

pub mod endpoint;
pub mod registry;
pub mod trace;
pub mod worker;

use crate::error::Error;
use crate::interpreter::{ExecuteReply, ShellChannel};
use crate::session::endpoint::ControlEndpoints;
use crate::session::registry::BootstrapRegistry;
use crate::session::trace::StartupTrace;
use crate::session::worker::{AdapterWorker, SessionDriver, CONTROL_TIMEOUT};
use log::{error, info};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "Uninitialized",
            SessionState::Starting => "Starting",
            SessionState::Running => "Running",
            SessionState::Stopping => "Stopping",
            SessionState::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

pub struct SessionLifecycle {
    state: SessionState,
    adapter_addr: SocketAddr,
    config: Value,
    registry: Arc<BootstrapRegistry>,
    endpoints: ControlEndpoints,
    header_listener: Option<UnixListener>,
    request_listener: Option<UnixListener>,
    // manager-side ends of the control channels; no traffic after the
    // handshake, held so the worker side stays connected until stop
    header_stream: Option<UnixStream>,
    request_stream: Option<UnixStream>,
    worker: Option<AdapterWorker>,
}

impl SessionLifecycle {
    pub fn new(
        session_id: &str,
        adapter_port: u16,
        config: Value,
        registry: Arc<BootstrapRegistry>,
    ) -> Self {
        let adapter_addr: SocketAddr = format!("{}:{adapter_port}", endpoint::ADAPTER_HOST)
            .parse()
            .unwrap_or_else(|_| unreachable!("loopback address is always parsable"));
        Self {
            state: SessionState::Uninitialized,
            adapter_addr,
            config,
            registry,
            endpoints: ControlEndpoints::for_session(session_id),
            header_listener: None,
            request_listener: None,
            header_stream: None,
            request_stream: None,
            worker: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn adapter_addr(&self) -> SocketAddr {
        self.adapter_addr
    }

    /// Stand the session up. Blocking; returns once the worker acknowledged
    /// the handshake. Bootstrap failures are logged with the adapter's
    /// reported traceback and fail the start without panicking.
    pub fn start(
        &mut self,
        shell: &mut dyn ShellChannel,
        driver: Box<dyn SessionDriver>,
    ) -> Result<(), Error> {
        match self.state {
            SessionState::Uninitialized | SessionState::Stopped => {}
            actual => {
                return Err(Error::SessionState {
                    expected: "Uninitialized or Stopped",
                    actual,
                })
            }
        }
        self.state = SessionState::Starting;
        match self.try_start(shell, driver) {
            Ok(()) => {
                self.state = SessionState::Running;
                info!(target: "dapbridge", "debug session running, adapter at {}", self.adapter_addr);
                Ok(())
            }
            Err(err) => {
                self.release_endpoints();
                self.state = SessionState::Stopped;
                Err(err)
            }
        }
    }

    fn try_start(
        &mut self,
        shell: &mut dyn ShellChannel,
        driver: Box<dyn SessionDriver>,
    ) -> Result<(), Error> {
        let trace = StartupTrace::from_env();
        fs::create_dir_all(endpoint::debug_log_directory())?;

        // once per process; restarts reuse the first outcome
        let bootstrapped = self
            .registry
            .ensure(|| self.bootstrap_adapter(shell, trace.as_ref()));
        if !bootstrapped {
            return Err(Error::AdapterBootstrap {
                ename: "bootstrap".to_string(),
                evalue: "adapter refused to start, see kernel log".to_string(),
            });
        }

        let header_listener = bind_control(&self.endpoints.header)?;
        let request_listener = bind_control(&self.endpoints.request)?;

        let worker = AdapterWorker::spawn(driver, self.adapter_addr, self.endpoints.clone())?;

        // One-time synchronization barrier: probe the worker over the
        // request channel and wait for its acknowledgment.
        let mut request_stream = accept_control(&request_listener)?;
        request_stream.write_all(worker::HANDSHAKE_PROBE)?;
        let mut ack = [0u8; worker::HANDSHAKE_ACK.len()];
        request_stream.read_exact(&mut ack)?;
        if &ack != worker::HANDSHAKE_ACK {
            worker.stop();
            return Err(Error::Handshake(format!(
                "unexpected acknowledgment: {ack:?}"
            )));
        }

        // the worker connected the header channel before acknowledging,
        // the connection is already in the backlog
        let header_stream = accept_control(&header_listener)?;

        fs::create_dir_all(crate::info::cell_tmp_directory())?;

        if let Some(trace) = &trace {
            trace.line(&format!("session running, adapter at {}", self.adapter_addr));
        }
        self.header_listener = Some(header_listener);
        self.request_listener = Some(request_listener);
        self.header_stream = Some(header_stream);
        self.request_stream = Some(request_stream);
        self.worker = Some(worker);
        Ok(())
    }

    fn bootstrap_adapter(&self, shell: &mut dyn ShellChannel, trace: Option<&StartupTrace>) -> bool {
        if let Some(trace) = trace {
            trace.line("===== DEBUGGER CONFIG =====");
            trace.line(&self.config.to_string());
        }

        let mut code = String::from("import debugpy;");
        if let Some(python) = self.config.get("python").and_then(Value::as_str) {
            code.push_str(&format!("debugpy.configure({{'python': r'{python}'}});"));
        }
        code.push_str(&format!(
            "debugpy.listen(('{}',{}))",
            self.adapter_addr.ip(),
            self.adapter_addr.port()
        ));

        match shell.execute(&code) {
            ExecuteReply::Ok => true,
            ExecuteReply::Error(err) => {
                error!(target: "dapbridge", "exception raised when trying to import debugpy");
                for line in &err.traceback {
                    error!(target: "dapbridge", "{line}");
                }
                error!(target: "dapbridge", "{} - {}", err.ename, err.evalue);
                false
            }
        }
    }

    /// Tear the session down: stop the worker, unbind both control
    /// endpoints. The adapter process keeps running; its lifetime is tied
    /// to the kernel process.
    pub fn stop(&mut self) -> Result<(), Error> {
        if self.state != SessionState::Running {
            return Err(Error::SessionState {
                expected: "Running",
                actual: self.state,
            });
        }
        self.state = SessionState::Stopping;
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
        self.release_endpoints();
        self.state = SessionState::Stopped;
        Ok(())
    }

    fn release_endpoints(&mut self) {
        self.header_stream = None;
        self.request_stream = None;
        self.header_listener = None;
        self.request_listener = None;
        let _ = fs::remove_file(&self.endpoints.header);
        let _ = fs::remove_file(&self.endpoints.request);
    }
}

fn bind_control(path: &Path) -> Result<UnixListener, Error> {
    // a stale socket file from a crashed session would fail the bind
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(UnixListener::bind(path)?)
}

/// `UnixListener` has no accept timeout; poll with a bounded deadline so a
/// dead worker cannot hang the start forever.
fn accept_control(listener: &UnixListener) -> Result<UnixStream, Error> {
    listener.set_nonblocking(true)?;
    let deadline = Instant::now() + CONTROL_TIMEOUT;
    let stream = loop {
        match listener.accept() {
            Ok((stream, _)) => break stream,
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(Error::Handshake("worker did not connect".to_string()));
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(err) => return Err(err.into()),
        }
    };
    listener.set_nonblocking(false)?;
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(CONTROL_TIMEOUT))?;
    stream.set_write_timeout(Some(CONTROL_TIMEOUT))?;
    Ok(stream)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::interpreter::ExecuteError;
    use crate::session::worker::ShutdownSignal;
    use serde_json::json;
    use serial_test::serial;

    struct FakeShell {
        reply: ExecuteReply,
        executed: Vec<String>,
    }

    impl FakeShell {
        fn ok() -> Self {
            Self {
                reply: ExecuteReply::Ok,
                executed: vec![],
            }
        }

        fn failing() -> Self {
            Self {
                reply: ExecuteReply::Error(ExecuteError {
                    ename: "ModuleNotFoundError".to_string(),
                    evalue: "No module named 'debugpy'".to_string(),
                    traceback: vec!["Traceback (most recent call last):".to_string()],
                }),
                executed: vec![],
            }
        }
    }

    impl ShellChannel for FakeShell {
        fn execute(&mut self, code: &str) -> ExecuteReply {
            self.executed.push(code.to_string());
            self.reply.clone()
        }
    }

    /// Waits on the shutdown signal; never touches the adapter endpoint.
    struct IdleDriver;

    impl SessionDriver for IdleDriver {
        fn run(
            &mut self,
            _adapter: SocketAddr,
            _header: UnixStream,
            _request: UnixStream,
            shutdown: &ShutdownSignal,
        ) -> anyhow::Result<()> {
            while !shutdown.is_raised() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        }
    }

    fn lifecycle(session_id: &str, config: Value) -> (SessionLifecycle, Arc<BootstrapRegistry>) {
        let registry = Arc::new(BootstrapRegistry::new());
        let port = endpoint::find_free_port().unwrap();
        (
            SessionLifecycle::new(session_id, port, config, registry.clone()),
            registry,
        )
    }

    #[test]
    #[serial]
    fn test_start_stop_and_restart() {
        let (mut lifecycle, _) = lifecycle("lifecycle-restart", json!({}));
        let mut shell = FakeShell::ok();
        assert_eq!(lifecycle.state(), SessionState::Uninitialized);

        lifecycle.start(&mut shell, Box::new(IdleDriver)).unwrap();
        assert_eq!(lifecycle.state(), SessionState::Running);
        assert_eq!(shell.executed.len(), 1);

        lifecycle.stop().unwrap();
        assert_eq!(lifecycle.state(), SessionState::Stopped);
        assert!(!lifecycle.endpoints.request.exists());
        assert!(!lifecycle.endpoints.header.exists());

        // control endpoints rebind, the adapter bootstrap is not re-issued
        lifecycle.start(&mut shell, Box::new(IdleDriver)).unwrap();
        assert_eq!(lifecycle.state(), SessionState::Running);
        assert_eq!(shell.executed.len(), 1);
        lifecycle.stop().unwrap();
    }

    #[test]
    #[serial]
    fn test_control_streams_stay_open_until_stop() {
        let (mut lifecycle, _) = lifecycle("lifecycle-control-streams", json!({}));
        let mut shell = FakeShell::ok();

        lifecycle.start(&mut shell, Box::new(IdleDriver)).unwrap();
        assert!(lifecycle.header_stream.is_some());
        assert!(lifecycle.request_stream.is_some());

        lifecycle.stop().unwrap();
        assert!(lifecycle.header_stream.is_none());
        assert!(lifecycle.request_stream.is_none());
    }

    #[test]
    #[serial]
    fn test_start_twice_without_stop_is_rejected() {
        let (mut lifecycle, _) = lifecycle("lifecycle-double-start", json!({}));
        let mut shell = FakeShell::ok();
        lifecycle.start(&mut shell, Box::new(IdleDriver)).unwrap();

        let err = lifecycle
            .start(&mut shell, Box::new(IdleDriver))
            .unwrap_err();
        assert!(matches!(err, Error::SessionState { .. }));
        lifecycle.stop().unwrap();
    }

    #[test]
    #[serial]
    fn test_bootstrap_failure_aborts_start() {
        let (mut lifecycle, _) = lifecycle("lifecycle-bootstrap-fail", json!({}));
        let mut shell = FakeShell::failing();

        let err = lifecycle
            .start(&mut shell, Box::new(IdleDriver))
            .unwrap_err();
        assert!(matches!(err, Error::AdapterBootstrap { .. }));
        assert_eq!(lifecycle.state(), SessionState::Stopped);
        // failed outcome is recorded, no retry on the next start
        let err = lifecycle
            .start(&mut shell, Box::new(IdleDriver))
            .unwrap_err();
        assert!(matches!(err, Error::AdapterBootstrap { .. }));
        assert_eq!(shell.executed.len(), 1);
    }

    #[test]
    #[serial]
    fn test_bootstrap_code_honors_interpreter_override() {
        let (mut lifecycle, _) = lifecycle(
            "lifecycle-python-override",
            json!({"python": "/usr/bin/python3"}),
        );
        let mut shell = FakeShell::ok();
        lifecycle.start(&mut shell, Box::new(IdleDriver)).unwrap();

        let code = &shell.executed[0];
        assert!(code.starts_with("import debugpy;"));
        assert!(code.contains("debugpy.configure({'python': r'/usr/bin/python3'});"));
        assert!(code.contains(&format!(
            "debugpy.listen(('127.0.0.1',{}))",
            lifecycle.adapter_addr().port()
        )));
        lifecycle.stop().unwrap();
    }
}
