//! Configuration loading and typed settings for khata components.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Top-level settings for the khata tools.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct KhataConfig {
    #[serde(default)]
    pub owner: OwnerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Which owner's ledger the tools operate on.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OwnerConfig {
    #[serde(default = "default_owner_id")]
    pub id: String,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self {
            id: default_owner_id(),
        }
    }
}

/// Where the account store lives on disk.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Attempt budget for version-checked writes that hit a conflict.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_owner_id() -> String {
    "local".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("khata.db")
}

fn default_max_attempts() -> u32 {
    3
}

/// Load settings from a TOML file plus `KHATA_*` environment overrides
/// (`KHATA_STORE__PATH`, `KHATA_RETRY__MAX_ATTEMPTS`, ...). With no explicit
/// path, `khata.toml` in the working directory is used when present.
pub fn load(path: Option<&Path>) -> Result<KhataConfig> {
    let mut builder = Config::builder();
    builder = match path {
        Some(path) => builder.add_source(File::from(path)),
        None => builder.add_source(File::with_name("khata").required(false)),
    };
    builder = builder.add_source(Environment::with_prefix("KHATA").separator("__"));
    let settings = builder.build().context("failed to read configuration")?;
    settings
        .try_deserialize()
        .context("configuration is invalid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_cover_a_missing_file() {
        let cfg = KhataConfig::default();
        assert_eq!(cfg.owner.id, "local");
        assert_eq!(cfg.store.path, PathBuf::from("khata.db"));
        assert_eq!(cfg.retry.max_attempts, 3);
    }

    #[test]
    fn partial_toml_documents_fill_in_defaults() {
        let cfg: KhataConfig = toml::from_str(
            r#"
            [store]
            path = "/var/lib/khata/accounts.db"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.store.path, PathBuf::from("/var/lib/khata/accounts.db"));
        assert_eq!(cfg.retry.max_attempts, 3);
    }

    #[test]
    fn explicit_file_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("khata.toml");
        fs::write(
            &path,
            "[owner]\nid = \"user-42\"\n\n[retry]\nmax_attempts = 5\n",
        )
        .unwrap();

        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.owner.id, "user-42");
        assert_eq!(cfg.retry.max_attempts, 5);
    }
}
