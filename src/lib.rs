//! dapbridge - a Debug Adapter Protocol (DAP) bridge for interactive
//! code-execution kernels.
//!
//! The bridge exposes the kernel-specific subset of DAP (variable
//! inspection, rich-representation inspection, attach bootstrapping,
//! configuration completion) while an external debugpy-compatible adapter
//! process owns breakpoints and stepping. [`bridge::DebugBridge`] is the
//! per-kernel orchestrator; [`session::SessionLifecycle`] stands the
//! adapter process and its control channel up and tears them down.
//!
//! The kernel integrates through three seams: [`interpreter::Interpreter`]
//! (execute code, read globals), [`interpreter::ShellChannel`] (one-shot
//! adapter bootstrap) and [`transport::AdapterTransport`] (the DAP wire to
//! the adapter process).
//!
//! Logging goes through the `log` facade with the `dapbridge` target;
//! embedders pick the backend (`env_logger` in this crate's tests).

pub mod bridge;
pub mod error;
pub mod info;
pub mod interpreter;
pub mod protocol;
pub mod session;
pub mod transport;

pub use bridge::DebugBridge;
pub use error::Error;
