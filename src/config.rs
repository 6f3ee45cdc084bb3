//! Detection settings.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data_path::DEFAULT_SEPARATOR;
use crate::error::{DetectError, Result};

/// Tunables for a detection walk. Every field has a default, so a partial JSON
/// document (or `{}`) is a valid configuration.
///
/// ```
/// use chipscan::DetectConfig;
///
/// let config = DetectConfig::from_json_str(r#"{ "max_depth": 4, "scan_raw": false }"#).unwrap();
/// assert_eq!(config.max_depth, 4);
/// assert!(!config.scan_raw);
/// assert_eq!(config.path_separator, '/');
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectConfig {
    /// Deepest container nesting that is still opened.
    pub max_depth: usize,
    /// Largest payload an archive plugin may unpack.
    pub max_decoded_size: usize,
    /// Look for modules at every offset instead of only at the start of each container.
    pub scan_raw: bool,
    /// Separator between path components.
    pub path_separator: char,
    /// Plugin ids tried first, in this order. Remaining plugins keep their built-in order.
    pub plugin_order: Vec<String>,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            max_depth: 16,
            max_decoded_size: 16 * 1024 * 1024,
            scan_raw: true,
            path_separator: DEFAULT_SEPARATOR,
            plugin_order: Vec::new(),
        }
    }
}

impl DetectConfig {
    /// Parse a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: DetectConfig =
            serde_json::from_str(text).map_err(|e| DetectError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(DetectError::Config("max_depth must be at least 1".into()));
        }
        if self.path_separator == crate::identifier::SUBPATH_DELIMITER {
            return Err(DetectError::Config(format!(
                "path_separator cannot be '{}'",
                self.path_separator
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(DetectConfig::from_json_str("{}").unwrap(), DetectConfig::default());
    }

    #[test]
    fn rejects_unknown_fields_and_bad_values() {
        assert!(matches!(
            DetectConfig::from_json_str(r#"{ "depth": 3 }"#),
            Err(DetectError::Config(_))
        ));
        assert!(matches!(
            DetectConfig::from_json_str(r#"{ "max_depth": 0 }"#),
            Err(DetectError::Config(_))
        ));
        assert!(matches!(
            DetectConfig::from_json_str(r#"{ "path_separator": "?" }"#),
            Err(DetectError::Config(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "plugin_order": ["SNDH", "AY"], "path_separator": "|" }}"#).unwrap();
        let config = DetectConfig::load(file.path()).unwrap();
        assert_eq!(config.plugin_order, vec!["SNDH".to_string(), "AY".to_string()]);
        assert_eq!(config.path_separator, '|');
        assert_eq!(config.max_depth, 16);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DetectConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, DetectError::Io(_)));
    }
}
