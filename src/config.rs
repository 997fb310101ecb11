use crate::scope::Backing;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = ".varstore";
pub const DEFAULT_GLOBAL_DATABASE: &str = "global.sqlite3";
pub const DEFAULT_PRINCIPAL_DIR: &str = "principals";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VarStoreConfig {
    pub data_dir: Option<String>,
    pub global_database: Option<String>,
    pub principal_dir: Option<String>,
}

impl VarStoreConfig {
    pub fn data_dir_in(&self, base: &Path) -> PathBuf {
        base.join(self.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR))
    }

    /// The global scope's database file
    pub fn global_database_in(&self, base: &Path) -> PathBuf {
        self.data_dir_in(base)
            .join(self.global_database.as_deref().unwrap_or(DEFAULT_GLOBAL_DATABASE))
    }

    /// Directory holding one database per principal
    pub fn principal_dir_in(&self, base: &Path) -> PathBuf {
        self.data_dir_in(base)
            .join(self.principal_dir.as_deref().unwrap_or(DEFAULT_PRINCIPAL_DIR))
    }

    pub fn backing(&self, base: &Path) -> Backing {
        Backing::Files {
            global: self.global_database_in(base),
            principals: self.principal_dir_in(base),
        }
    }

    /// Every field filled with its default
    pub fn with_defaults() -> Self {
        Self {
            data_dir: Some(DEFAULT_DATA_DIR.to_string()),
            global_database: Some(DEFAULT_GLOBAL_DATABASE.to_string()),
            principal_dir: Some(DEFAULT_PRINCIPAL_DIR.to_string()),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("varstore.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<VarStoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: VarStoreConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &VarStoreConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Create the parent directory of a database file if it is missing
pub fn ensure_db_dir(db_path: &Path) -> crate::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
