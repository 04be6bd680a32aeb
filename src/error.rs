use crate::session::SessionState;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- generic errors --------------------------------------------
    #[error(transparent)]
    IO(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    // --------------------------------- session lifecycle errors ----------------------------------
    #[error("no free adapter port on loopback in range {0}..{1}")]
    PortExhausted(u16, u16),
    #[error("adapter bootstrap failed: {ename}: {evalue}")]
    AdapterBootstrap { ename: String, evalue: String },
    #[error("control channel handshake failed: {0}")]
    Handshake(String),
    #[error("invalid session state: expected {expected}, got {actual}")]
    SessionState {
        expected: &'static str,
        actual: SessionState,
    },
}
