//! Configuration management.
//!
//! Configuration is read from TOML and then overlaid with `MNEMO_*`
//! environment variables:
//!
//! ```toml
//! [storage]
//! graph_path = "/var/lib/mnemo/graph.db"
//! max_retry_time_ms = 30000
//! retry_interval_ms = 1000
//!
//! [consolidation]
//! interval_secs = 300
//! importance_threshold = 0.8
//! candidate_threshold = 10
//!
//! [chunking]
//! chunk_size = 2000
//! overlap = 200
//! min_chunk_size = 50
//!
//! [observability.logging]
//! format = "json"
//! level = "info"
//!
//! [observability.metrics]
//! enabled = true
//! port = 9090
//! ```

use crate::services::{ConsolidationConfig, TextChunker};
use crate::storage::RetryConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "mnemo";
const CONFIG_FILE: &str = "config.toml";
const GRAPH_FILE: &str = "graph.db";

/// Main configuration for mnemo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MnemoConfig {
    /// Graph store location and retry policy.
    pub storage: StorageSettings,
    /// Consolidation triggers.
    pub consolidation: ConsolidationConfig,
    /// Chunker parameters used by extraction.
    pub chunking: TextChunker,
    /// Logging and metrics.
    pub observability: ObservabilitySettings,
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// `SQLite` graph database; defaults to the platform data directory.
    pub graph_path: Option<PathBuf>,
    /// Retry budget and interval.
    #[serde(flatten)]
    pub retry: RetryConfig,
}

impl StorageSettings {
    /// Returns the configured graph path or the platform default.
    #[must_use]
    pub fn resolved_graph_path(&self) -> PathBuf {
        self.graph_path.clone().unwrap_or_else(default_graph_path)
    }
}

/// `[observability]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// `[observability.logging]`.
    pub logging: Option<LoggingSettings>,
    /// `[observability.metrics]`.
    pub metrics: Option<MetricsSettings>,
}

/// `[observability.logging]` section. Unset fields fall back to environment
/// variables and then to built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Default level when no filter is given.
    pub level: Option<String>,
    /// Full `EnvFilter` directive, e.g. `mnemo=debug,warn`.
    pub filter: Option<String>,
    /// Log to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// `[observability.metrics]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Install the Prometheus recorder.
    pub enabled: Option<bool>,
    /// Port of the Prometheus HTTP listener.
    pub port: Option<u16>,
}

impl MnemoConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be read and
    /// [`Error::InvalidInput`] if it is not valid configuration TOML.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| Error::operation("read_config_file", e))?;
        Self::parse(&contents)
            .map_err(|e| Error::InvalidInput(format!("{}: {e}", path.display())))
    }

    /// Parses configuration TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] on malformed TOML or mistyped fields.
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::InvalidInput(e.to_string()))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/mnemo/` on macOS)
    /// 2. XDG config dir (`~/.config/mnemo/`)
    ///
    /// Returns default configuration if no readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        for path in default_config_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                },
            }
        }
        Self::default()
    }

    /// Loads `path` if given, otherwise the default location, then applies
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file cannot be loaded.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Applies `MNEMO_*` environment variable overrides.
    ///
    /// Logging and metrics variables are read when observability starts.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("MNEMO_GRAPH_PATH") {
            if !path.trim().is_empty() {
                self.storage.graph_path = Some(PathBuf::from(path));
            }
        }
        self.storage.retry = self.storage.retry.with_env_overrides();
        self.consolidation = self.consolidation.with_env_overrides();

        if let Some(size) = env_usize("MNEMO_CHUNK_SIZE") {
            self.chunking.chunk_size = size;
        }
        if let Some(overlap) = env_usize("MNEMO_CHUNK_OVERLAP") {
            self.chunking.overlap = overlap;
        }
        if let Some(min) = env_usize("MNEMO_MIN_CHUNK_SIZE") {
            self.chunking.min_chunk_size = min;
        }
        self
    }

    /// Sets the graph database path.
    #[must_use]
    pub fn with_graph_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage.graph_path = Some(path.into());
        self
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::operation("serialize_config", e))
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn default_config_paths() -> Vec<PathBuf> {
    let Some(base_dirs) = directories::BaseDirs::new() else {
        return Vec::new();
    };
    vec![
        base_dirs.config_dir().join(APP_DIR).join(CONFIG_FILE),
        base_dirs
            .home_dir()
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILE),
    ]
}

/// Default graph database location: `<data_dir>/mnemo/graph.db`, or
/// `./.mnemo/graph.db` when no home directory is known.
#[must_use]
pub fn default_graph_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".mnemo").join(GRAPH_FILE),
        |dirs| dirs.data_dir().join(APP_DIR).join(GRAPH_FILE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = MnemoConfig::default();
        assert_eq!(config.storage.retry.max_retry_time_ms, 30_000);
        assert_eq!(config.storage.retry.retry_interval_ms, 1_000);
        assert_eq!(config.consolidation.interval_secs, 300);
        assert_eq!(config.consolidation.candidate_threshold, 10);
        assert_eq!(config.chunking.chunk_size, 2000);
        assert!(config.observability.metrics.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = MnemoConfig::parse(
            r#"
            [storage]
            graph_path = "/tmp/graph.db"
            retry_interval_ms = 250

            [consolidation]
            candidate_threshold = 3

            [observability.metrics]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(
            config.storage.graph_path.as_deref(),
            Some(Path::new("/tmp/graph.db"))
        );
        assert_eq!(config.storage.retry.retry_interval_ms, 250);
        assert_eq!(config.storage.retry.max_retry_time_ms, 30_000);
        assert_eq!(config.consolidation.candidate_threshold, 3);
        assert!((config.consolidation.importance_threshold - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(
            config.observability.metrics.and_then(|m| m.enabled),
            Some(true)
        );
    }

    #[test]
    fn test_malformed_file_is_invalid_input() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[consolidation]\ninterval_secs = \"soon\"").unwrap();

        let result = MnemoConfig::load_from_file(file.path());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_missing_file_is_operation_failure() {
        let result = MnemoConfig::load_from_file(Path::new("/nonexistent/mnemo.toml"));
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = MnemoConfig::default().with_graph_path("/data/graph.db");
        let rendered = config.to_toml().unwrap();
        assert_eq!(MnemoConfig::parse(&rendered).unwrap(), config);
    }

    #[test]
    fn test_resolved_graph_path_prefers_configured() {
        let storage = StorageSettings {
            graph_path: Some(PathBuf::from("/x/graph.db")),
            ..StorageSettings::default()
        };
        assert_eq!(storage.resolved_graph_path(), PathBuf::from("/x/graph.db"));
        assert!(
            StorageSettings::default()
                .resolved_graph_path()
                .ends_with(GRAPH_FILE)
        );
    }
}
