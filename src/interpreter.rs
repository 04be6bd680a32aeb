//! Interpreter embedding seam.
//!
//! The bridge never touches interpreter internals directly; the kernel
//! hands it an [`Interpreter`] for global access and code execution and a
//! [`ShellChannel`] for the one-shot adapter bootstrap. Both are specified
//! here at their interface only.

use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Structured execution error: name, value and traceback of the underlying
/// interpreter exception.
#[derive(Debug, Clone)]
pub struct ExecuteError {
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

/// Reply of the kernel shell channel to an execute request.
#[derive(Debug, Clone)]
pub enum ExecuteReply {
    Ok,
    Error(ExecuteError),
}

/// Kernel shell channel. Used once per process, at session start, to boot
/// the adapter inside the interpreter.
pub trait ShellChannel: Send {
    /// Execute `code` on the shell and report the outcome. Blocking.
    fn execute(&mut self, code: &str) -> ExecuteReply;
}

/// One interpreter global as the embedding layer exposes it.
///
/// `json` is `None` when the value has no structured serialization; `repr`
/// is always available as a textual fallback. `type_name` is the canonical
/// runtime type name, already unwrapped by the embedding layer (e.g. `int`,
/// never a `"<class 'int'>"`-style wrapper string).
#[derive(Debug, Clone)]
pub struct GlobalValue {
    pub json: Option<Value>,
    pub repr: String,
    pub type_name: String,
}

impl GlobalValue {
    pub fn serializable(json: Value, type_name: impl Into<String>) -> Self {
        Self {
            repr: json.to_string(),
            json: Some(json),
            type_name: type_name.into(),
        }
    }

    /// A value the embedding layer cannot serialize; only its repr survives.
    pub fn opaque(repr: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            json: None,
            repr: repr.into(),
            type_name: type_name.into(),
        }
    }
}

/// Live interpreter surface needed by the bridge: execute a code fragment,
/// enumerate globals, read one back. Callers must hold the interpreter lock
/// (see [`InterpreterHandle`]) around every call.
pub trait Interpreter: Send {
    fn execute(&mut self, code: &str) -> Result<(), ExecuteError>;
    fn global_names(&self) -> Vec<String>;
    fn global(&self, name: &str) -> Option<GlobalValue>;
}

/// Interpreter-wide exclusive-access lock.
///
/// Interpreter state is shared with the kernel's normal execution path;
/// every touch-point acquires this scoped guard and releases it on all exit
/// paths, including panics of the caller.
#[derive(Clone)]
pub struct InterpreterHandle {
    inner: Arc<Mutex<Box<dyn Interpreter>>>,
}

impl InterpreterHandle {
    pub fn new(interpreter: impl Interpreter + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(interpreter))),
        }
    }

    /// Blocks until exclusive access is granted. A poisoned lock is taken
    /// over as-is: interpreter state stays usable for read access even if a
    /// previous holder panicked.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn Interpreter>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
