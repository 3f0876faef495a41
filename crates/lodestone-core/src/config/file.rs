// crates/lodestone-core/src/config/file.rs
// Global defaults from ~/.lodestone/config.toml

use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Path of the global config file (~/.lodestone/config.toml).
pub fn config_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".lodestone/config.toml")
}

/// Load the global defaults layer as a JSON value for layered merging.
/// A missing or unparseable file yields an empty layer.
pub fn load_global() -> Value {
    load_from(&config_path())
}

/// Load a config file from an explicit path as a JSON merge layer.
pub fn load_from(path: &std::path::Path) -> Value {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<toml::Value>(&contents) {
            Ok(parsed) => match serde_json::to_value(parsed) {
                Ok(value) => {
                    debug!(path = %path.display(), "Loaded search config from file");
                    value
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to convert config file");
                    Value::Object(serde_json::Map::new())
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse config file");
                Value::Object(serde_json::Map::new())
            }
        },
        Err(_) => {
            debug!(path = %path.display(), "Config file not found, using defaults");
            Value::Object(serde_json::Map::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use std::io::Write;

    #[test]
    fn test_load_from_missing_file_is_empty_layer() {
        let value = load_from(std::path::Path::new("/nonexistent/lodestone.toml"));
        assert_eq!(value, serde_json::json!({}));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[web]\nprovider = \"serper\"\n\n[weights]\nhook = 0.9\n\n[uses]\nweb = \"mcp:srv.tool\""
        )
        .unwrap();

        let layer = load_from(file.path());
        let config = SearchConfig::layered(&[layer]);
        assert_eq!(config.web.provider, "serper");
        assert!((config.weights.hook - 0.9).abs() < 1e-9);
        assert_eq!(config.uses.web, "mcp:srv.tool");
    }

    #[test]
    fn test_load_from_invalid_toml_is_empty_layer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not [valid toml").unwrap();
        let value = load_from(file.path());
        assert_eq!(value, serde_json::json!({}));
    }
}
