//! Run options, loadable from a JSON file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::MetaprepError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Include paths are resolved under this directory.
    pub output_dir: PathBuf,
    /// Source files, scanned in this order.
    pub sources: Vec<PathBuf>,
    /// Where to write every compiled unit as one script, for inspection.
    pub dump_path: Option<PathBuf>,
    /// Prefix generated files with a receipt comment.
    pub receipt: bool,
    /// Color rendered diagnostics.
    pub color: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            sources: Vec::new(),
            dump_path: None,
            receipt: true,
            color: false,
        }
    }
}

impl Options {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, MetaprepError> {
        let text = std::fs::read_to_string(path).map_err(|source| MetaprepError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| MetaprepError::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let options = Options::from_json(r#"{ "sources": ["a.c", "b.mps"] }"#).unwrap();
        assert_eq!(options.sources, vec![PathBuf::from("a.c"), PathBuf::from("b.mps")]);
        assert_eq!(options.output_dir, PathBuf::from("."));
        assert!(options.receipt);
        assert!(!options.color);
        assert_eq!(options.dump_path, None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Options::from_json(r#"{ "output": "gen" }"#).is_err());
    }

    #[test]
    fn test_full_config() {
        let options = Options::from_json(
            r#"{ "output_dir": "gen", "dump_path": "dump.mps", "receipt": false, "color": true }"#,
        )
        .unwrap();
        assert_eq!(options.output_dir, PathBuf::from("gen"));
        assert_eq!(options.dump_path, Some(PathBuf::from("dump.mps")));
        assert!(!options.receipt);
        assert!(options.color);
    }
}
