use std::path::Path;

use anyhow::anyhow;
use serde::Deserialize;

/// Settings read from an optional TOML file; every field falls back to its default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// File extensions (without the dot) picked up when scanning a directory.
    pub extensions: Vec<String>,
    /// Depth limit for lineage traversal queries.
    pub max_depth: usize,
    /// Process files in parallel.
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: vec!["sas".to_owned()],
            max_depth: 32,
            parallel: true,
        }
    }
}

impl Config {
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str).map_err(|err| anyhow!("Failed to parse config due to error: {}", err))
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let toml_str = std::fs::read_to_string(path)
            .map_err(|_| anyhow!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&toml_str).map_err(|err| anyhow!("{} ({})", err, path.display()))
    }

    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| {
            self.extensions
                .iter()
                .any(|wanted| ext.eq_ignore_ascii_case(wanted.as_str()))
        })
    }
}
