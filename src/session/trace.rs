//! Env-gated startup trace file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Environment flag enabling verbose session-start tracing to a local file.
pub const TRACE_ENV: &str = "DAPBRIDGE_LOG";
const TRACE_FILE: &str = "dapbridge.log";

/// Append-only trace file for session-start diagnostics.
#[derive(Clone)]
pub struct StartupTrace {
    file: Arc<Mutex<File>>,
}

impl StartupTrace {
    /// Enabled only when `DAPBRIDGE_LOG` is set in the environment.
    pub fn from_env() -> Option<Self> {
        std::env::var_os(TRACE_ENV)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(TRACE_FILE)
            .ok()?;
        Some(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn line(&self, text: &str) {
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{text}");
        }
    }
}
