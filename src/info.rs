//! Static debugger metadata and per-cell temporary source naming.
//!
//! Cells have no file behind them; the front end and the adapter agree on
//! synthetic source paths derived from the cell code. The naming scheme is
//! exposed once through [`DebuggerInfo`] so the client layer can map
//! adapter stack frames back to cells.

use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// Fixed seed mixed into per-cell path hashes. Cross-process distinctness
/// comes from the pid in [`cell_tmp_directory`], not from the seed.
pub const TMP_HASH_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

pub const TMP_FILE_SUFFIX: &str = ".py";

/// Directory receiving per-cell temporary source files for this process.
pub fn cell_tmp_directory() -> PathBuf {
    std::env::temp_dir().join(format!("dapbridge_{}", std::process::id()))
}

pub fn tmp_prefix() -> String {
    format!("{}/", cell_tmp_directory().display())
}

/// Path of the temporary source file backing one cell. Deterministic in the
/// cell code: re-running the same cell maps to the same file.
pub fn cell_temporary_file(code: &str) -> String {
    let mut hasher = DefaultHasher::new();
    TMP_HASH_SEED.hash(&mut hasher);
    code.hash(&mut hasher);
    format!("{}{}{}", tmp_prefix(), hasher.finish(), TMP_FILE_SUFFIX)
}

/// Debugger capabilities and naming scheme, reported once to the client
/// layer.
#[derive(Debug, Clone, Serialize)]
pub struct DebuggerInfo {
    pub hash_seed: u64,
    pub tmp_file_prefix: String,
    pub tmp_file_suffix: String,
    pub rich_rendering: bool,
    pub exception_paths: Vec<String>,
}

impl DebuggerInfo {
    pub fn collect() -> Self {
        Self {
            hash_seed: TMP_HASH_SEED,
            tmp_file_prefix: tmp_prefix(),
            tmp_file_suffix: TMP_FILE_SUFFIX.to_string(),
            rich_rendering: true,
            exception_paths: vec!["Python Exceptions".to_string()],
        }
    }
}
