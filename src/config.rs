//! Versioned configuration for column mappings and matching thresholds.
//!
//! Configuration is read from TOML. Every table is optional; omitted tables
//! fall back to the built-in defaults. A `[scopus]` or `[wos]` table replaces
//! the built-in mapping for that source as a whole.
//!
//! ```
//! use bibharmony::config::Config;
//!
//! let config = Config::from_toml_str(
//!     r#"
//!     version = 1
//!
//!     [matcher]
//!     same_threshold = 0.95
//!
//!     [countries]
//!     "Peoples R China" = "PR China"
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.matcher.same_threshold, 0.95);
//! ```

use crate::matcher::MatcherConfig;
use crate::schema::SourceMapping;
use crate::Source;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Configuration version this build understands.
pub const CONFIG_VERSION: u32 = 1;

/// Error types for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported config version {found} (expected {})", CONFIG_VERSION)]
    UnsupportedVersion { found: u32 },
}

/// All tunable behavior of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub scopus: SourceMapping,
    pub wos: SourceMapping,
    /// Extra or replacement country aliases, alias → canonical name
    pub countries: BTreeMap<String, String>,
    pub matcher: MatcherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            scopus: SourceMapping::for_source(Source::Scopus),
            wos: SourceMapping::for_source(Source::Wos),
            countries: BTreeMap::new(),
            matcher: MatcherConfig::default(),
        }
    }
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(input)?;
        if config.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: config.version,
            });
        }
        Ok(config)
    }

    /// Loads a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), version = config.version, "Loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_is_default() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_source_table_replaces_builtin() {
        let config = Config::from_toml_str(
            r#"
            [wos]
            author_delimiter = "|"

            [wos.columns]
            title = ["TI", "Article Title"]
            "#,
        )
        .unwrap();
        assert_eq!(config.wos.columns.title, vec!["TI", "Article Title"]);
        assert_eq!(config.wos.author_delimiter, "|");
        assert!(config.wos.columns.doi.is_empty());
        assert_eq!(config.scopus, SourceMapping::scopus());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let result = Config::from_toml_str("version = 7");
        assert!(matches!(
            result,
            Err(ConfigError::UnsupportedVersion { found: 7 })
        ));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(
            Config::from_toml_str("version = "),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
