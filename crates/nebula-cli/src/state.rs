use std::sync::Arc;

use anyhow::{Context, Result};
use nebula_store::{DataPaths, PersistentFavorites, Store};
use tokio::sync::Mutex;

/// The local database together with the favorites loaded from it.
pub struct Vault {
    pub store: Store,
    pub favorites: PersistentFavorites,
}

pub type SharedVault = Arc<Mutex<Vault>>;

impl Vault {
    pub fn open(paths: &DataPaths) -> Result<Self> {
        let store = paths
            .open_store()
            .with_context(|| format!("failed to open store in {}", paths.base.display()))?;
        Self::from_store(store)
    }

    pub fn from_store(store: Store) -> Result<Self> {
        let favorites = PersistentFavorites::load(&store).context("failed to load favorites")?;
        Ok(Self { store, favorites })
    }

    pub fn shared(self) -> SharedVault {
        Arc::new(Mutex::new(self))
    }
}
