//! Backend selection.
//!
//! [`GraphConfig`] chooses a backend at construction time and hands back a
//! boxed [`GraphStore`], so callers never name a backend type.
//!
//! Environment variables read by [`GraphConfig::from_env`]:
//! - `LINKGRAPH_DB_PATH`: SQLite database file path (in-memory store when unset)
//! - `LINKGRAPH_BUSY_TIMEOUT_MS`: SQLite busy timeout (default: 5000)
//! - `LINKGRAPH_CURSOR_BATCH`: rows per cursor round trip (default: 256)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StorageError;
use crate::memory::InMemoryGraph;
use crate::sqlite::{SqliteGraph, SqliteOptions};
use crate::traits::GraphStore;

/// Which backend to open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backend {
    /// Process-local store; contents are lost on exit.
    #[default]
    Memory,
    /// SQLite database file.
    Sqlite { path: PathBuf },
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub backend: Backend,
    pub busy_timeout_ms: u64,
    pub cursor_batch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        let sqlite = SqliteOptions::default();
        GraphConfig {
            backend: Backend::Memory,
            busy_timeout_ms: sqlite.busy_timeout.as_millis() as u64,
            cursor_batch_size: sqlite.cursor_batch_size,
        }
    }
}

impl GraphConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        GraphConfig::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Unparseable numeric values fall back to their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = GraphConfig::default();

        let backend = match lookup("LINKGRAPH_DB_PATH") {
            Some(path) if !path.is_empty() => Backend::Sqlite { path: path.into() },
            _ => Backend::Memory,
        };

        GraphConfig {
            backend,
            busy_timeout_ms: parse_or(
                &lookup,
                "LINKGRAPH_BUSY_TIMEOUT_MS",
                defaults.busy_timeout_ms,
            ),
            cursor_batch_size: parse_or(
                &lookup,
                "LINKGRAPH_CURSOR_BATCH",
                defaults.cursor_batch_size,
            ),
        }
    }

    /// SQLite tuning derived from this configuration.
    pub fn sqlite_options(&self) -> SqliteOptions {
        SqliteOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            cursor_batch_size: self.cursor_batch_size.max(1),
        }
    }

    /// Opens the configured backend.
    pub fn open(&self) -> Result<Box<dyn GraphStore>, StorageError> {
        match &self.backend {
            Backend::Memory => {
                info!("using in-memory link graph");
                Ok(Box::new(InMemoryGraph::new()))
            }
            Backend::Sqlite { path } => {
                info!(path = %path.display(), "using sqlite link graph");
                Ok(Box::new(SqliteGraph::open_with(path, self.sqlite_options())?))
            }
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparseable setting");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_selects_memory() {
        let config = GraphConfig::from_lookup(|_| None);
        assert_eq!(config, GraphConfig::default());
        assert_eq!(config.backend, Backend::Memory);
    }

    #[test]
    fn db_path_selects_sqlite() {
        let config = GraphConfig::from_lookup(lookup_from(&[
            ("LINKGRAPH_DB_PATH", "/tmp/graph.db"),
            ("LINKGRAPH_CURSOR_BATCH", "32"),
        ]));
        assert_eq!(
            config.backend,
            Backend::Sqlite {
                path: "/tmp/graph.db".into()
            }
        );
        assert_eq!(config.cursor_batch_size, 32);
    }

    #[test]
    fn bad_numbers_fall_back_to_defaults() {
        let config =
            GraphConfig::from_lookup(lookup_from(&[("LINKGRAPH_BUSY_TIMEOUT_MS", "soon")]));
        assert_eq!(config.busy_timeout_ms, GraphConfig::default().busy_timeout_ms);
    }

    #[test]
    fn deserializes_from_json() {
        let config: GraphConfig = serde_json::from_str(
            r#"{"backend": {"kind": "sqlite", "path": "graph.db"}, "cursor_batch_size": 8}"#,
        )
        .unwrap();
        assert_eq!(
            config.backend,
            Backend::Sqlite {
                path: "graph.db".into()
            }
        );
        assert_eq!(config.cursor_batch_size, 8);
        assert_eq!(config.busy_timeout_ms, 5000);
    }

    #[test]
    fn zero_batch_is_clamped() {
        let config = GraphConfig {
            cursor_batch_size: 0,
            ..GraphConfig::default()
        };
        assert_eq!(config.sqlite_options().cursor_batch_size, 1);
    }

    #[test]
    fn opens_sqlite_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = GraphConfig {
            backend: Backend::Sqlite {
                path: dir.path().join("graph.db"),
            },
            ..GraphConfig::default()
        };
        assert!(config.open().is_ok());
        assert!(dir.path().join("graph.db").exists());
    }

    #[test]
    fn sqlite_backend_rejects_in_memory_path() {
        let config = GraphConfig {
            backend: Backend::Sqlite {
                path: ":memory:".into(),
            },
            ..GraphConfig::default()
        };
        let err = config.open().err().map(|e| e.kind());
        assert_eq!(err, Some(crate::error::ErrorKind::Io));
    }
}
