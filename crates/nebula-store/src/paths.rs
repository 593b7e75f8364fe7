use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::error::{Result, StoreError};
use crate::store::Store;

pub const DATABASE_FILE: &str = "nebula.db";
pub const CONFIG_FILE: &str = "config.toml";

/// Default base directory for all nebula storage.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".idea-nebula")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Files under one base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub base: PathBuf,
    pub database: PathBuf,
    pub config: PathBuf,
}

impl DataPaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            database: base.join(DATABASE_FILE),
            config: base.join(CONFIG_FILE),
            base,
        }
    }

    /// `base` when given, otherwise the default under the home directory.
    pub fn resolve(base: Option<&Path>) -> Self {
        Self::new(base.map(PathBuf::from).unwrap_or_else(default_base_dir))
    }

    /// Create the base directory and open the database in it.
    pub fn open_store(&self) -> Result<Store> {
        fs::create_dir_all(&self.base).map_err(|e| {
            StoreError::InvalidData(format!("failed to create {}: {e}", self.base.display()))
        })?;
        Store::open(&self.database)
    }
}
