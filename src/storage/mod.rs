mod file;
mod memory;
pub mod favorites;

use std::path::Path;
use std::sync::Arc;
use log::info;

use crate::error::Result;

pub use self::favorites::{ Favorites, FAVORITES_KEY, EXPORT_FILE_NAME };
pub use self::file::FileStore;
pub use self::memory::MemoryStore;

/// Durable string key-value storage, the persistence seam for favorites.
/// Writes are synchronous and last-writer-wins.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

pub fn create_store(path: Option<&Path>) -> Result<Arc<dyn KeyValueStore>> {
    match path {
        Some(path) => {
            info!("Favorites will be stored in: {}", path.display());
            Ok(Arc::new(FileStore::open(path)?))
        }
        None => {
            info!("Favorites will be kept in memory only");
            Ok(Arc::new(MemoryStore::default()))
        }
    }
}
