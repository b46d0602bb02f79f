//! Extraction configuration read from `resources/config.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

/// Location of the config file relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "resources/config.json";

/// Input PDF and output directory.
///
/// Both fields default to empty strings, so a config file that omits one of
/// them still loads. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: String,
    pub output: String,
}

impl Config {
    /// Parse a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ExtractError::Config(e.to_string()))
    }

    /// Read and parse the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ExtractError::io(path, e))?;
        let config = Self::from_json(&contents)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// `<dir>/resources/config.json`
    pub fn default_path(dir: &Path) -> PathBuf {
        dir.join(DEFAULT_CONFIG_PATH)
    }

    pub fn input_path(&self) -> &Path {
        Path::new(&self.input)
    }

    pub fn output_dir(&self) -> &Path {
        Path::new(&self.output)
    }
}
