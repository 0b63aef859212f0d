//! Configuration file support.
//!
//! All binaries accept `--config <file.toml>`; command-line flags override
//! the file, and missing sections fall back to defaults.

use crate::registry::DEFAULT_ROOT_HISTORY_SIZE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_MAX_GROUP_FILE_SIZE: u64 = 100 * 1024 * 1024;
const DEFAULT_MAX_PROOF_FILE_SIZE: u64 = 1024 * 1024;
const DEFAULT_MAX_ZK_PROOF_SIZE: usize = 512 * 1024;
const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub group: GroupConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub proof: ProofConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// JSON array of member commitments.
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default = "default_max_group_file_size")]
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Scope used by the prover when `--scope` is not given.
    #[serde(default)]
    pub scope: Option<String>,
    /// Scopes the server accepts. Empty means any valid scope.
    #[serde(default)]
    pub allowed_scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Nullifier file. The server keeps nullifiers in memory when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_root_history_size")]
    pub root_history_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofConfig {
    #[serde(default = "default_max_proof_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_max_zk_proof_size")]
    pub max_zk_proof_size: usize,
    #[serde(default = "default_proof_output_file")]
    pub output_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            file: None,
            max_file_size: DEFAULT_MAX_GROUP_FILE_SIZE,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: None,
            root_history_size: DEFAULT_ROOT_HISTORY_SIZE,
        }
    }
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_PROOF_FILE_SIZE,
            max_zk_proof_size: DEFAULT_MAX_ZK_PROOF_SIZE,
            output_file: default_proof_output_file(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_max_group_file_size() -> u64 {
    DEFAULT_MAX_GROUP_FILE_SIZE
}

fn default_root_history_size() -> usize {
    DEFAULT_ROOT_HISTORY_SIZE
}

fn default_max_proof_file_size() -> u64 {
    DEFAULT_MAX_PROOF_FILE_SIZE
}

fn default_max_zk_proof_size() -> usize {
    DEFAULT_MAX_ZK_PROOF_SIZE
}

fn default_proof_output_file() -> PathBuf {
    PathBuf::from("signal.json")
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

impl Config {
    /// # Errors
    /// Fails if the file cannot be read or is not valid TOML.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    #[must_use]
    pub fn load_from_file_or_default(path: &Path) -> Self {
        Self::load_from_file(path).unwrap_or_default()
    }

    /// Loads `path` when given, defaults otherwise.
    ///
    /// # Errors
    /// Same as [`Config::load_from_file`].
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load_from_file)
    }

    /// # Errors
    /// Fails if serialization or the write fails.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.group.max_file_size, DEFAULT_MAX_GROUP_FILE_SIZE);
        assert_eq!(config.proof.max_file_size, DEFAULT_MAX_PROOF_FILE_SIZE);
        assert_eq!(config.registry.root_history_size, DEFAULT_ROOT_HISTORY_SIZE);
        assert_eq!(config.server.bind, DEFAULT_BIND);
        assert!(config.signal.allowed_scopes.is_empty());
    }

    #[test]
    fn test_serialize_deserialize_config() {
        let mut config = Config::default();
        config.signal.scope = Some("greeting-2024".into());
        config.registry.path = Some(PathBuf::from("nullifiers.txt"));

        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_custom_config() {
        let config_toml = r#"
            [group]
            file = "group.json"

            [signal]
            scope = "greeting-2024"
            allowed_scopes = ["greeting-2024", "greeting-2025"]

            [registry]
            root_history_size = 8

            [server]
            bind = "0.0.0.0:9000"
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert_eq!(config.group.file, Some(PathBuf::from("group.json")));
        assert_eq!(config.signal.allowed_scopes.len(), 2);
        assert_eq!(config.registry.root_history_size, 8);
        assert_eq!(config.registry.path, None);
        assert_eq!(config.proof.output_file, PathBuf::from("signal.json"));
        assert_eq!(config.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.server.bind = "127.0.0.1:1".into();

        config.save_to_file(&path).unwrap();
        assert_eq!(Config::load_from_file(&path).unwrap(), config);
        assert_eq!(
            Config::load_from_file_or_default(&dir.path().join("missing.toml")),
            Config::default()
        );
    }
}
