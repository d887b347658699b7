//! Storage trait definitions.

use crate::StorageResult;

/// Trait for durable key/value storage backends.
pub trait TokenStorage: Send + Sync {
    /// Store a value under the given key.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value by key. Returns None if the key doesn't exist.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value by key. Returns true if a value was deleted.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists.
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
