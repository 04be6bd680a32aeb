//! Debugger visibility policy for interpreter globals.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Globals that are never debugger-visible: interpreter bootstrap symbols,
/// display/IO helpers, history buffers.
static BUILTIN_EXCLUSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "__name__",
        "__doc__",
        "__package__",
        "__loader__",
        "__spec__",
        "__annotations__",
        "__builtins__",
        "__builtin__",
        "display",
        "get_ipython",
        "debugpy",
        "exit",
        "quit",
        "In",
        "Out",
        "_oh",
        "_dh",
        "_",
        "__",
        "___",
    ])
});

/// Pure name-based predicate deciding which globals the debugger shows.
/// Never inspects the value.
#[derive(Debug, Clone)]
pub struct VariableFilter {
    excluded: HashSet<&'static str>,
}

impl Default for VariableFilter {
    fn default() -> Self {
        Self::new(BUILTIN_EXCLUSIONS.clone())
    }
}

impl VariableFilter {
    pub fn new(excluded: HashSet<&'static str>) -> Self {
        Self { excluded }
    }

    pub fn keep(&self, name: &str) -> bool {
        let bytes = name.as_bytes();
        // `_iN`/`_iiN`... input history and `_N` numbered output cells
        if name.starts_with("_i") {
            return false;
        }
        if bytes.len() >= 2 && bytes[0] == b'_' && bytes[1].is_ascii_digit() {
            return false;
        }
        !self.excluded.contains(name)
    }
}
