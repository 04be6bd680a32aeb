//! Session orchestrator.
//!
//! One [`DebugBridge`] per kernel instance. The generic DAP dispatch layer
//! (outside this crate) owns the client socket and the request registry; it
//! registers the commands in [`HANDLED_COMMANDS`] against
//! [`DebugBridge::handle_request`] and serializes handler invocation, so no
//! locking is needed here beyond the interpreter lock.

pub mod filter;
pub mod inspect;

use crate::bridge::filter::VariableFilter;
use crate::bridge::inspect::{RichInspector, VariableInspector};
use crate::error::Error;
use crate::info::DebuggerInfo;
use crate::interpreter::{InterpreterHandle, ShellChannel};
use crate::protocol::{Request, Response};
use crate::session::registry::BootstrapRegistry;
use crate::session::worker::SessionDriver;
use crate::session::{endpoint, SessionLifecycle, SessionState};
use crate::transport::AdapterTransport;
use anyhow::bail;
use serde_json::{json, Value};
use std::sync::Arc;

/// Commands the bridge answers itself; everything else goes straight to the
/// adapter. The dispatch layer registers exactly these against the bridge.
pub const HANDLED_COMMANDS: &[&str] = &[
    "inspectVariables",
    "richInspectVariables",
    "attach",
    "configurationDone",
];

pub struct DebugBridge {
    port: u16,
    session_id: String,
    user_name: String,
    variable_inspector: VariableInspector,
    rich_inspector: RichInspector,
    lifecycle: SessionLifecycle,
}

impl DebugBridge {
    /// Build the bridge for one kernel instance. Allocates the adapter port
    /// once; it is never renegotiated for the lifetime of the session.
    ///
    /// `registry` guards the one-time adapter bootstrap; kernels pass
    /// [`BootstrapRegistry::global`] so restarts within one process reuse
    /// the first outcome.
    pub fn new(
        interpreter: InterpreterHandle,
        user_name: impl Into<String>,
        session_id: impl Into<String>,
        config: Value,
        registry: Arc<BootstrapRegistry>,
    ) -> Result<Self, Error> {
        let port = endpoint::find_free_port()?;
        let session_id = session_id.into();
        let lifecycle = SessionLifecycle::new(&session_id, port, config, registry);
        Ok(Self {
            port,
            session_id,
            user_name: user_name.into(),
            variable_inspector: VariableInspector::new(
                interpreter.clone(),
                VariableFilter::default(),
            ),
            rich_inspector: RichInspector::new(interpreter),
            lifecycle,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    pub fn debugger_info(&self) -> DebuggerInfo {
        DebuggerInfo::collect()
    }

    /// Stand the session up: adapter bootstrap, control channels, worker.
    /// Blocking; returns once the worker acknowledged the handshake.
    pub fn start(
        &mut self,
        shell: &mut dyn ShellChannel,
        driver: Box<dyn SessionDriver>,
    ) -> Result<(), Error> {
        self.lifecycle.start(shell, driver)
    }

    /// Tear the session down. The adapter process itself is left running;
    /// its lifetime is tied to the kernel process.
    pub fn stop(&mut self) -> Result<(), Error> {
        self.lifecycle.stop()
    }

    /// Dispatch one DAP request envelope to its kernel-side handler.
    /// Blocking: the reply envelope is complete when this returns.
    pub fn handle_request(
        &mut self,
        message: Value,
        transport: &mut dyn AdapterTransport,
    ) -> anyhow::Result<Value> {
        let request = Request::from_value(message.clone())?;
        match request.command.as_str() {
            "inspectVariables" => Ok(serde_json::to_value(
                self.variable_inspector.inspect(&request),
            )?),
            "richInspectVariables" => Ok(serde_json::to_value(
                self.rich_inspector.rich_inspect(&request, transport),
            )?),
            "attach" => self.attach(message, transport),
            "configurationDone" => Ok(serde_json::to_value(Response::ack(&request))?),
            _ => transport.forward(&message),
        }
    }

    /// `attach`: the front end does not know where the adapter listens; the
    /// bridge injects the endpoint and requests adapter-side file logging
    /// before forwarding the envelope verbatim.
    fn attach(
        &self,
        mut message: Value,
        transport: &mut dyn AdapterTransport,
    ) -> anyhow::Result<Value> {
        // indexing into a string/number/array arguments would panic
        match message.get("arguments") {
            None | Some(Value::Null) | Some(Value::Object(_)) => {}
            Some(other) => bail!("attach arguments must be an object, got: {other}"),
        }
        message["arguments"]["connect"] = json!({
            "host": endpoint::ADAPTER_HOST,
            "port": self.port,
        });
        message["arguments"]["logToFile"] = Value::Bool(true);
        transport.forward(&message)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::interpreter::{ExecuteError, GlobalValue, Interpreter};

    struct EmptyInterpreter;

    impl Interpreter for EmptyInterpreter {
        fn execute(&mut self, _code: &str) -> Result<(), ExecuteError> {
            Ok(())
        }

        fn global_names(&self) -> Vec<String> {
            vec![]
        }

        fn global(&self, _name: &str) -> Option<GlobalValue> {
            None
        }
    }

    /// Echoes every forwarded message back as its own reply and keeps a
    /// copy for assertions.
    struct EchoTransport {
        forwarded: Vec<Value>,
    }

    impl AdapterTransport for EchoTransport {
        fn forward(&mut self, message: &Value) -> anyhow::Result<Value> {
            self.forwarded.push(message.clone());
            Ok(message.clone())
        }

        fn stopped_threads(&self) -> Vec<i64> {
            vec![]
        }
    }

    fn bridge() -> DebugBridge {
        DebugBridge::new(
            InterpreterHandle::new(EmptyInterpreter),
            "tester",
            "attach-test-session",
            json!({}),
            Arc::new(BootstrapRegistry::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_attach_injects_endpoint_and_leaves_the_rest_unchanged() {
        let mut bridge = bridge();
        let mut transport = EchoTransport { forwarded: vec![] };

        let reply = bridge
            .handle_request(
                json!({
                    "seq": 4,
                    "type": "request",
                    "command": "attach",
                    "arguments": {},
                }),
                &mut transport,
            )
            .unwrap();

        assert_eq!(reply["seq"], json!(4));
        assert_eq!(reply["type"], json!("request"));
        assert_eq!(reply["command"], json!("attach"));
        assert_eq!(
            reply["arguments"],
            json!({
                "connect": {"host": "127.0.0.1", "port": bridge.port()},
                "logToFile": true,
            })
        );
    }

    #[test]
    fn test_attach_with_missing_arguments() {
        let mut bridge = bridge();
        let mut transport = EchoTransport { forwarded: vec![] };

        let reply = bridge
            .handle_request(
                json!({"seq": 1, "type": "request", "command": "attach"}),
                &mut transport,
            )
            .unwrap();
        assert_eq!(
            reply["arguments"]["connect"]["port"],
            json!(bridge.port())
        );
        assert_eq!(reply["arguments"]["logToFile"], json!(true));
    }

    #[test]
    fn test_attach_with_non_object_arguments_is_rejected() {
        let mut bridge = bridge();
        let mut transport = EchoTransport { forwarded: vec![] };

        for arguments in [json!("oops"), json!(7), json!([1, 2])] {
            let err = bridge
                .handle_request(
                    json!({
                        "seq": 1,
                        "type": "request",
                        "command": "attach",
                        "arguments": arguments,
                    }),
                    &mut transport,
                )
                .unwrap_err();
            assert!(err.to_string().contains("must be an object"));
        }
        // nothing malformed reaches the adapter
        assert!(transport.forwarded.is_empty());
    }

    #[test]
    fn test_configuration_done_acks_without_body() {
        let mut bridge = bridge();
        let mut transport = EchoTransport { forwarded: vec![] };

        let reply = bridge
            .handle_request(
                json!({"seq": 9, "type": "request", "command": "configurationDone"}),
                &mut transport,
            )
            .unwrap();

        assert_eq!(
            reply,
            json!({
                "seq": 9,
                "type": "response",
                "request_seq": 9,
                "success": true,
                "command": "configurationDone",
            })
        );
        // handled locally, nothing reaches the adapter
        assert!(transport.forwarded.is_empty());
    }

    #[test]
    fn test_unknown_commands_are_forwarded_verbatim() {
        let mut bridge = bridge();
        let mut transport = EchoTransport { forwarded: vec![] };

        let message = json!({
            "seq": 2,
            "type": "request",
            "command": "setBreakpoints",
            "arguments": {"source": {"path": "cell1.py"}},
        });
        bridge
            .handle_request(message.clone(), &mut transport)
            .unwrap();
        assert_eq!(transport.forwarded, vec![message]);
    }
}
