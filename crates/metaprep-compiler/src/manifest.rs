//! The run manifest: what each directive produced.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::MetaprepError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub source: PathBuf,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub exports: Vec<String>,
    pub elapsed_ms: f64,
    /// SHA-256 of the generated text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Entries in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub generated_at: DateTime<Local>,
    pub directives: Vec<ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            generated_at: Local::now(),
            directives: Vec::new(),
        }
    }
}

impl Manifest {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write(&self, path: &Path) -> Result<(), MetaprepError> {
        let json = self.to_json().map_err(|e| MetaprepError::Write {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        std::fs::write(path, json).map_err(|source| MetaprepError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Total time spent in directives.
    pub fn elapsed_ms(&self) -> f64 {
        self.directives.iter().map(|entry| entry.elapsed_ms).sum()
    }
}

/// Lowercase hex SHA-256 of `text`.
pub fn digest(text: &str) -> String {
    let hash = Sha256::digest(text.as_bytes());
    let mut hex = String::with_capacity(hash.len() * 2);
    for byte in hash {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
