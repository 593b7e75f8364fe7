pub mod config;
pub mod error;
pub mod favorites;
pub mod json_bridge;
pub mod paths;
pub mod schema;
pub mod store;

pub use config::Config;
pub use error::{Result, StoreError};
pub use favorites::PersistentFavorites;
pub use paths::{DataPaths, default_base_dir};
pub use store::Store;
