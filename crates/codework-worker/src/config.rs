//! Worker configuration, loaded once at startup from a TOML file.
//!
//! Configuration errors are fatal: a worker that cannot tell which
//! language it serves must refuse to start rather than judge with the
//! wrong toolchain.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use cw_core::types::{GlobalLimits, Language};

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    pub orchestrator: OrchestratorConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Which language adapter this worker instance runs. Required.
    pub language: Language,
    #[serde(default = "default_working_directory")]
    pub working_directory: PathBuf,
}

fn default_working_directory() -> PathBuf {
    PathBuf::from("/sandbox")
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_time_sec")]
    pub max_time_sec: u64,
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: u64,
}

fn default_max_time_sec() -> u64 {
    GlobalLimits::default().max_time_sec
}

fn default_max_memory_mb() -> u64 {
    GlobalLimits::default().max_memory_mb
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_time_sec: default_max_time_sec(),
            max_memory_mb: default_max_memory_mb(),
        }
    }
}

impl LimitsConfig {
    pub fn as_global_limits(&self) -> GlobalLimits {
        GlobalLimits {
            max_time_sec: self.max_time_sec,
            max_memory_mb: self.max_memory_mb,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Base address of the orchestrator, e.g. `http://orchestrator:8080`.
    pub address: String,
    #[serde(default = "default_api_header_name")]
    pub api_header_name: String,
    /// Shared key: required on inbound requests, attached to the callback.
    pub api_key: String,
}

fn default_api_header_name() -> String {
    "X-Api-Key".to_string()
}

/// Where submission/test-case blobs live.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Plain HTTP blob endpoint: `GET {address}/{container}/{key}`.
    Http { address: String, container: String },
    /// Local directory: key resolves to a file under `root`.
    Fs { root: PathBuf },
}

impl WorkerConfig {
    /// Load and validate the config file. Any failure here must abort
    /// startup.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: WorkerConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.orchestrator.address.trim().is_empty() {
            bail!("orchestrator.address must not be empty");
        }
        if self.orchestrator.api_key.trim().is_empty() {
            bail!("orchestrator.api_key must not be empty");
        }
        if self.limits.max_time_sec == 0 {
            bail!("limits.max_time_sec must be positive");
        }
        if self.limits.max_memory_mb == 0 {
            bail!("limits.max_memory_mb must be positive");
        }
        match &self.storage {
            StorageConfig::Http { address, container } => {
                if address.trim().is_empty() || container.trim().is_empty() {
                    bail!("storage.address and storage.container must not be empty");
                }
            }
            StorageConfig::Fs { root } => {
                if root.as_os_str().is_empty() {
                    bail!("storage.root must not be empty");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    const FULL: &str = r#"
[execution]
language = "python"
working_directory = "/tmp/cw-sandbox"

[limits]
max_time_sec = 15
max_memory_mb = 256

[orchestrator]
address = "http://orchestrator:8080"
api_header_name = "X-Api-Key"
api_key = "secret"

[storage]
kind = "http"
address = "http://blobs:10000"
container = "submissions"
"#;

    #[test]
    fn test_load_full_config() {
        let (_dir, path) = write_config(FULL);
        let config = WorkerConfig::load(&path).unwrap();
        assert_eq!(config.execution.language, Language::Python);
        assert_eq!(
            config.execution.working_directory,
            PathBuf::from("/tmp/cw-sandbox")
        );
        assert_eq!(config.limits.max_time_sec, 15);
        assert_eq!(config.orchestrator.api_key, "secret");
        match &config.storage {
            StorageConfig::Http { address, container } => {
                assert_eq!(address, "http://blobs:10000");
                assert_eq!(container, "submissions");
            }
            other => panic!("unexpected storage config: {other:?}"),
        }
    }

    #[test]
    fn test_defaults_apply() {
        let (_dir, path) = write_config(
            r#"
[execution]
language = "c"

[orchestrator]
address = "http://o"
api_key = "k"

[storage]
kind = "fs"
root = "/var/blobs"
"#,
        );
        let config = WorkerConfig::load(&path).unwrap();
        assert_eq!(config.execution.working_directory, PathBuf::from("/sandbox"));
        assert_eq!(config.orchestrator.api_header_name, "X-Api-Key");
        let limits = config.limits.as_global_limits();
        assert_eq!(limits.max_time_sec, GlobalLimits::default().max_time_sec);
        assert_eq!(limits.max_memory_mb, GlobalLimits::default().max_memory_mb);
    }

    #[test]
    fn test_unknown_language_is_fatal() {
        let (_dir, path) = write_config(
            r#"
[execution]
language = "csharp"

[orchestrator]
address = "http://o"
api_key = "k"

[storage]
kind = "fs"
root = "/var/blobs"
"#,
        );
        assert!(WorkerConfig::load(&path).is_err());
    }

    #[test]
    fn test_missing_language_is_fatal() {
        let (_dir, path) = write_config(
            r#"
[execution]

[orchestrator]
address = "http://o"
api_key = "k"

[storage]
kind = "fs"
root = "/var/blobs"
"#,
        );
        assert!(WorkerConfig::load(&path).is_err());
    }

    #[test]
    fn test_empty_api_key_is_fatal() {
        let (_dir, path) = write_config(
            r#"
[execution]
language = "go"

[orchestrator]
address = "http://o"
api_key = "  "

[storage]
kind = "fs"
root = "/var/blobs"
"#,
        );
        assert!(WorkerConfig::load(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        assert!(WorkerConfig::load(Path::new("/no/such/worker.toml")).is_err());
    }
}
